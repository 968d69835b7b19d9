//! Server-side sessions keyed by a signed cookie.
//!
//! The cookie carries only `<uuid>.<signature>`; the signature is an
//! HMAC-SHA256 of the uuid under `SECRET_KEY`. Session contents (the
//! signed-in user and any in-progress sign-in) stay in process memory.
//! Signed-in sessions expire after the configured TTL; anonymous ones
//! expire after [`PENDING_TTL_SECS`] and are capped at
//! [`MAX_PENDING_SESSIONS`], oldest evicted first.

use std::collections::HashMap;

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{AuthCodeFlow, UserSession};

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie.
pub const COOKIE_NAME: &str = "session";

/// Lifetime of a session that has not signed in yet.
pub const PENDING_TTL_SECS: u64 = 600;

/// Most anonymous sessions held at once.
pub const MAX_PENDING_SESSIONS: usize = 1000;

/// Errors from cookie verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Cookie value is not `<uuid>.<signature>`.
    #[error("malformed session cookie")]
    Malformed,
    /// Signature does not match.
    #[error("invalid session signature")]
    BadSignature,
    /// Signing key rejected by the MAC.
    #[error("invalid session signing key")]
    Key,
}

/// Everything stored for one browser.
#[derive(Debug, Clone)]
pub struct SessionData {
    /// Signed-in user, once authenticated.
    pub user: Option<UserSession>,
    /// In-progress sign-in between `/login` and the callback.
    pub flow: Option<AuthCodeFlow>,
    /// Creation time; expiry is measured from here.
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    fn new() -> Self {
        Self {
            user: None,
            flow: None,
            created_at: Utc::now(),
        }
    }

    /// Names of the populated keys (diagnostics only).
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.flow.is_some() {
            keys.push("flow");
        }
        if self.user.is_some() {
            keys.push("user");
        }
        keys
    }
}

/// In-memory session store.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionData>>,
    mac: HmacSha256,
    ttl: Duration,
    pending_ttl: Duration,
    max_pending: usize,
    secure: bool,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("key", &"__REDACTED__")
            .field("ttl", &self.ttl)
            .field("pending_ttl", &self.pending_ttl)
            .field("max_pending", &self.max_pending)
            .field("secure", &self.secure)
            .finish()
    }
}

impl SessionStore {
    /// Create a store signing cookies with `secret`.
    ///
    /// `secure` adds the `Secure` cookie attribute (HTTPS deployments).
    ///
    /// # Errors
    ///
    /// [`SessionError::Key`] if the MAC rejects `secret`.
    pub fn new(secret: &str, ttl_secs: u64, secure: bool) -> Result<Self, SessionError> {
        let mac =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SessionError::Key)?;
        Ok(Self {
            sessions: RwLock::new(HashMap::new()),
            mac,
            ttl: seconds(ttl_secs),
            pending_ttl: seconds(PENDING_TTL_SECS),
            max_pending: MAX_PENDING_SESSIONS,
            secure,
        })
    }

    /// Override the anonymous-session lifetime and cap.
    #[must_use]
    pub fn with_pending_limits(mut self, ttl_secs: u64, max: usize) -> Self {
        self.pending_ttl = seconds(ttl_secs);
        self.max_pending = max;
        self
    }

    fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }

    /// Cookie value for a session id.
    pub fn sign(&self, id: Uuid) -> String {
        let mut mac = self.mac();
        mac.update(id.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{id}.{signature}")
    }

    /// Verify a cookie value and return its session id.
    ///
    /// # Errors
    ///
    /// [`SessionError::Malformed`] or [`SessionError::BadSignature`].
    pub fn verify(&self, value: &str) -> Result<Uuid, SessionError> {
        let (id, signature) = value.split_once('.').ok_or(SessionError::Malformed)?;
        let id = Uuid::parse_str(id).map_err(|_| SessionError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SessionError::Malformed)?;
        let mut mac = self.mac();
        mac.update(id.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::BadSignature)?;
        Ok(id)
    }

    /// Session id from the request's `Cookie` header, if validly signed.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<Uuid> {
        let value = cookie_value(headers, COOKIE_NAME)?;
        match self.verify(&value) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring session cookie");
                None
            }
        }
    }

    fn is_expired_at(&self, data: &SessionData, now: DateTime<Utc>) -> bool {
        let ttl = if data.user.is_some() {
            self.ttl
        } else {
            self.pending_ttl
        };
        now.signed_duration_since(data.created_at) > ttl
    }

    fn is_expired(&self, data: &SessionData) -> bool {
        self.is_expired_at(data, Utc::now())
    }

    /// Snapshot of a live session. Expired sessions are dropped.
    pub async fn get(&self, id: Uuid) -> Option<SessionData> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(&id) {
                Some(data) if !self.is_expired(data) => return Some(data.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.sessions.write().await.remove(&id);
        None
    }

    /// Signed-in user for a request, if any.
    pub async fn user(&self, headers: &HeaderMap) -> Option<UserSession> {
        let id = self.session_id(headers)?;
        self.get(id).await.and_then(|data| data.user)
    }

    /// Reuse the request's live session or create a new one.
    ///
    /// Returns the id and whether it was newly created (needs a cookie).
    pub async fn get_or_create(&self, headers: &HeaderMap) -> (Uuid, bool) {
        if let Some(id) = self.session_id(headers) {
            if self.get(id).await.is_some() {
                return (id, false);
            }
        }
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        self.make_room_for_pending(&mut sessions);
        sessions.insert(id, SessionData::new());
        (id, true)
    }

    /// Keep anonymous sessions below the cap: drop expired ones first,
    /// then the oldest.
    fn make_room_for_pending(&self, sessions: &mut HashMap<Uuid, SessionData>) {
        let pending = sessions.values().filter(|d| d.user.is_none()).count();
        if pending < self.max_pending {
            return;
        }
        let now = Utc::now();
        sessions.retain(|_, data| data.user.is_some() || !self.is_expired_at(data, now));

        let mut pending: Vec<(Uuid, DateTime<Utc>)> = sessions
            .iter()
            .filter(|(_, d)| d.user.is_none())
            .map(|(id, d)| (*id, d.created_at))
            .collect();
        if pending.len() < self.max_pending {
            return;
        }
        pending.sort_by_key(|(_, created_at)| *created_at);
        let excess = pending
            .len()
            .saturating_sub(self.max_pending)
            .saturating_add(1);
        for (id, _) in pending.iter().take(excess) {
            sessions.remove(id);
        }
        tracing::debug!(evicted = excess, "anonymous session cap reached");
    }

    /// Store an in-progress sign-in.
    pub async fn set_flow(&self, id: Uuid, flow: AuthCodeFlow) {
        if let Some(data) = self.sessions.write().await.get_mut(&id) {
            data.flow = Some(flow);
        }
    }

    /// Remove and return the in-progress sign-in. A flow is single-use.
    pub async fn take_flow(&self, id: Uuid) -> Option<AuthCodeFlow> {
        let mut sessions = self.sessions.write().await;
        let data = sessions.get_mut(&id)?;
        if self.is_expired(data) {
            sessions.remove(&id);
            return None;
        }
        data.flow.take()
    }

    /// Replace the session `previous` with a fresh signed-in one.
    ///
    /// The pre-sign-in id stops working; returns the new id.
    pub async fn promote(&self, previous: Uuid, user: UserSession) -> Uuid {
        let id = Uuid::new_v4();
        let mut data = SessionData::new();
        data.user = Some(user);
        let mut sessions = self.sessions.write().await;
        sessions.remove(&previous);
        sessions.insert(id, data);
        id
    }

    /// Create a signed-in session directly; returns the cookie value.
    pub async fn insert_user(&self, user: UserSession) -> String {
        let id = Uuid::new_v4();
        let mut data = SessionData::new();
        data.user = Some(user);
        self.sessions.write().await.insert(id, data);
        self.sign(id)
    }

    /// Number of sessions held, expired or not.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Destroy a session.
    pub async fn remove(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }

    /// Drop every expired session; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let now = Utc::now();
        sessions.retain(|_, data| !self.is_expired_at(data, now));
        before.saturating_sub(sessions.len())
    }

    /// `Set-Cookie` value establishing a session.
    pub fn set_cookie(&self, id: Uuid) -> HeaderValue {
        let secure = if self.secure { "; Secure" } else { "" };
        header_value(&format!(
            "{COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax{secure}",
            self.sign(id)
        ))
    }

    /// `Set-Cookie` value clearing the session cookie.
    pub fn clear_cookie(&self) -> HeaderValue {
        header_value(&format!(
            "{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        ))
    }
}

fn seconds(secs: u64) -> Duration {
    let secs = i64::try_from(secs).unwrap_or(i64::MAX);
    Duration::try_seconds(secs).unwrap_or(Duration::MAX)
}

fn header_value(value: &str) -> HeaderValue {
    // Signed ids are base64url and uuid characters only.
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Value of one cookie from the `Cookie` header(s).
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_owned())
}

/// Append a `Set-Cookie` header.
pub fn append_set_cookie(headers: &mut HeaderMap, value: HeaderValue) {
    headers.append(SET_COOKIE, value);
}
