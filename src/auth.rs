//! OIDC authorization-code sign-in against Microsoft Entra ID.
//!
//! [`IdentityClient::build_auth_code_flow`] creates the per-login state
//! (CSRF `state`, `nonce`, PKCE S256 pair) and the provider URL.
//! [`IdentityClient::complete_auth_code_flow`] validates the callback,
//! exchanges the code as a confidential client, reads the ID token claims
//! and enriches the identity from Microsoft Graph. Tokens never leave this
//! module; only the resulting [`UserSession`] is stored.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::IdentityConfig;
use crate::providers::sanitize_http_error_body;

/// Scopes requested at sign-in.
pub const SCOPES: [&str; 4] = ["openid", "profile", "offline_access", "User.Read"];

/// Path the provider redirects back to.
pub const REDIRECT_PATH: &str = "/getAToken";

/// Microsoft Graph profile endpoint.
pub const GRAPH_ME_URL: &str = "https://graph.microsoft.com/v1.0/me";

// ── Types ───────────────────────────────────────────────────────

/// Signed-in user as stored in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    /// Display name from the ID token (`Unknown User` when absent).
    pub name: String,
    /// UPN / sign-in name.
    pub preferred_username: String,
    /// Mail address; Graph `mail` when available, else the UPN.
    pub email: String,
    /// Directory object id.
    pub oid: String,
    /// Graph `jobTitle`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    /// Graph `displayName`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl UserSession {
    /// Build the user record from ID token claims.
    pub fn from_claims(claims: &IdTokenClaims) -> Self {
        let preferred_username = claims.preferred_username.clone().unwrap_or_default();
        Self {
            name: claims
                .name
                .clone()
                .unwrap_or_else(|| "Unknown User".to_owned()),
            email: preferred_username.clone(),
            preferred_username,
            oid: claims.oid.clone().unwrap_or_default(),
            job_title: None,
            display_name: None,
        }
    }

    /// Apply non-empty Graph profile fields.
    pub fn enrich(&mut self, profile: &GraphProfile) {
        if let Some(mail) = profile.mail.as_deref().filter(|m| !m.is_empty()) {
            self.email = mail.to_owned();
        }
        if let Some(title) = profile.job_title.as_deref().filter(|t| !t.is_empty()) {
            self.job_title = Some(title.to_owned());
        }
        if let Some(name) = profile.display_name.as_deref().filter(|n| !n.is_empty()) {
            self.display_name = Some(name.to_owned());
        }
    }
}

/// Claims read from the ID token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdTokenClaims {
    /// Display name.
    pub name: Option<String>,
    /// Sign-in name.
    pub preferred_username: Option<String>,
    /// Directory object id.
    pub oid: Option<String>,
    /// Echo of the nonce sent at authorization.
    pub nonce: Option<String>,
}

/// Subset of the Graph `/me` profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphProfile {
    /// Primary mail address.
    pub mail: Option<String>,
    /// Job title.
    pub job_title: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
}

/// PKCE verifier and S256 challenge.
#[derive(Clone)]
pub struct PkcePair {
    /// Secret verifier (sent at code exchange).
    pub verifier: String,
    /// Base64url SHA-256 of the verifier (sent at authorization).
    pub challenge: String,
}

/// An in-progress sign-in, stored in the session between `/login` and the
/// callback.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthCodeFlow {
    /// CSRF token echoed by the provider.
    pub state: String,
    /// Replay guard echoed in the ID token.
    pub nonce: String,
    /// PKCE verifier.
    pub code_verifier: String,
    /// Redirect URI registered with the provider.
    pub redirect_uri: String,
    /// Provider URL the browser is sent to.
    pub auth_uri: String,
}

impl std::fmt::Debug for AuthCodeFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCodeFlow")
            .field("state", &self.state)
            .field("nonce", &self.nonce)
            .field("code_verifier", &"__REDACTED__")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Query parameters of the provider callback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code.
    pub code: Option<String>,
    /// Echoed CSRF token.
    pub state: Option<String>,
    /// Provider error code.
    pub error: Option<String>,
    /// Provider error description.
    pub error_description: Option<String>,
}

/// Tokens returned by the token endpoint.
#[derive(Clone, Default)]
pub struct TokenSet {
    /// Access token for Graph.
    pub access_token: Option<String>,
    /// Signed ID token.
    pub id_token: Option<String>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &self.access_token.as_ref().map(|_| "__REDACTED__"))
            .field("id_token", &self.id_token.as_ref().map(|_| "__REDACTED__"))
            .finish()
    }
}

// ── Errors ──────────────────────────────────────────────────────

/// Sign-in failures. All of them render the auth error page.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Client id or tenant missing.
    #[error("identity provider is not configured")]
    NotConfigured,
    /// Authority URL could not be parsed.
    #[error("invalid authority URL: {0}")]
    InvalidUrl(String),
    /// Callback arrived without a flow in the session.
    #[error("no sign-in in progress for this session")]
    NoFlow,
    /// Callback `state` does not match the flow.
    #[error("state mismatch in authorization response")]
    StateMismatch,
    /// Provider reported an error on the callback or token endpoint.
    #[error("{error}: {description}")]
    Provider {
        /// Provider error code.
        error: String,
        /// Provider description.
        description: String,
    },
    /// Callback carried no code.
    #[error("authorization response did not include a code")]
    MissingCode,
    /// Transport failure talking to the provider.
    #[error("identity provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Token endpoint returned something unreadable.
    #[error("token response parse error: {0}")]
    Parse(String),
    /// No ID token, so no user claims.
    #[error("Failed to get user information from token")]
    MissingClaims,
    /// ID token nonce does not match the flow.
    #[error("nonce mismatch in ID token")]
    NonceMismatch,
}

impl AuthError {
    /// Short error title for the error page.
    pub fn title(&self) -> String {
        match self {
            Self::Provider { error, .. } => error.clone(),
            Self::MissingClaims => "No user claims".to_owned(),
            Self::NoFlow | Self::StateMismatch | Self::NonceMismatch | Self::MissingCode => {
                "ValueError".to_owned()
            }
            Self::NotConfigured | Self::InvalidUrl(_) => "Configuration error".to_owned(),
            Self::Request(_) | Self::Parse(_) => "Unexpected error".to_owned(),
        }
    }

    /// Longer description for the error page.
    pub fn description(&self) -> String {
        match self {
            Self::Provider { description, .. } => description.clone(),
            other => other.to_string(),
        }
    }
}

// ── PKCE / random values ────────────────────────────────────────

/// Generate a PKCE code verifier and S256 challenge.
///
/// The verifier is a random 43-character string using unreserved URI characters.
pub fn generate_pkce_pair() -> PkcePair {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
    let mut rng = rand::thread_rng();
    let verifier: String = (0..43)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            char::from(CHARSET.get(idx).copied().unwrap_or(b'A'))
        })
        .collect();

    PkcePair {
        challenge: code_challenge(&verifier),
        verifier,
    }
}

/// S256 challenge for a verifier.
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Random URL-safe token (state, nonce).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

// ── Token parsing ───────────────────────────────────────────────

/// Parse a token endpoint response.
///
/// # Errors
///
/// [`AuthError::Provider`] when the body carries an OAuth `error`,
/// [`AuthError::Parse`] on malformed JSON.
pub fn parse_token_response(body: &str) -> Result<TokenSet, AuthError> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| AuthError::Parse(format!("invalid JSON in token response: {e}")))?;

    if let Some(error) = json["error"].as_str() {
        return Err(AuthError::Provider {
            error: error.to_owned(),
            description: json["error_description"]
                .as_str()
                .unwrap_or_default()
                .to_owned(),
        });
    }

    Ok(TokenSet {
        access_token: json["access_token"].as_str().map(str::to_owned),
        id_token: json["id_token"].as_str().map(str::to_owned),
    })
}

/// Decode the payload segment of an ID token.
///
/// The token comes straight from the token endpoint over TLS, so the
/// signature is not re-verified here.
///
/// # Errors
///
/// [`AuthError::Parse`] when the token is not a three-part JWT with a JSON
/// payload.
pub fn decode_id_token_claims(id_token: &str) -> Result<IdTokenClaims, AuthError> {
    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::Parse("ID token is not a JWT".to_owned()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::Parse(format!("ID token payload is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::Parse(format!("ID token payload is not JSON: {e}")))
}

// ── Client ──────────────────────────────────────────────────────

/// Identity provider endpoints and app registration.
#[derive(Clone)]
pub struct IdentityClient {
    client_id: String,
    client_secret: String,
    configured: bool,
    authorize_url: String,
    token_url: String,
    graph_url: String,
    redirect_uri: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for IdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"__REDACTED__")
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

impl IdentityClient {
    /// Client for the tenant's v2.0 endpoints.
    ///
    /// `public_base_url` is where the browser reaches this app; the
    /// redirect URI is `{public_base_url}/getAToken`.
    pub fn new(config: &IdentityConfig, public_base_url: &str) -> Self {
        let authority = config.authority();
        Self::with_endpoints(
            config,
            public_base_url,
            &format!("{authority}/oauth2/v2.0/authorize"),
            &format!("{authority}/oauth2/v2.0/token"),
            GRAPH_ME_URL,
        )
    }

    /// Client with explicit endpoints (used against local stubs in tests).
    pub fn with_endpoints(
        config: &IdentityConfig,
        public_base_url: &str,
        authorize_url: &str,
        token_url: &str,
        graph_url: &str,
    ) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            configured: config.is_configured(),
            authorize_url: authorize_url.to_owned(),
            token_url: token_url.to_owned(),
            graph_url: graph_url.to_owned(),
            redirect_uri: format!(
                "{}{REDIRECT_PATH}",
                public_base_url.trim_end_matches('/')
            ),
            http: reqwest::Client::new(),
        }
    }

    /// Redirect URI sent to the provider.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Start a sign-in: fresh state, nonce and PKCE pair plus the provider URL.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotConfigured`] without a client id or tenant,
    /// [`AuthError::InvalidUrl`] if the authority is malformed.
    pub fn build_auth_code_flow(&self) -> Result<AuthCodeFlow, AuthError> {
        if !self.configured {
            return Err(AuthError::NotConfigured);
        }

        let pkce = generate_pkce_pair();
        let state = generate_token();
        let nonce = generate_token();

        let mut url = url::Url::parse(&self.authorize_url)
            .map_err(|e| AuthError::InvalidUrl(format!("{}: {e}", self.authorize_url)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("state", &state)
            .append_pair("nonce", &nonce)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("response_mode", "query");

        debug!(redirect_uri = %self.redirect_uri, "built authorization code flow");

        Ok(AuthCodeFlow {
            state,
            nonce,
            code_verifier: pkce.verifier,
            redirect_uri: self.redirect_uri.clone(),
            auth_uri: url.into(),
        })
    }

    /// Validate the callback and turn it into a signed-in user.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`]; the caller renders the error page and leaves the
    /// session unauthenticated.
    pub async fn complete_auth_code_flow(
        &self,
        flow: &AuthCodeFlow,
        params: &CallbackParams,
    ) -> Result<UserSession, AuthError> {
        if params.state.as_deref() != Some(flow.state.as_str()) {
            return Err(AuthError::StateMismatch);
        }
        if let Some(error) = &params.error {
            return Err(AuthError::Provider {
                error: error.clone(),
                description: params.error_description.clone().unwrap_or_default(),
            });
        }
        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCode)?;

        let tokens = self.exchange_code(flow, code).await?;
        let id_token = tokens.id_token.as_deref().ok_or(AuthError::MissingClaims)?;
        let claims = decode_id_token_claims(id_token)?;
        if claims.nonce.as_deref() != Some(flow.nonce.as_str()) {
            return Err(AuthError::NonceMismatch);
        }

        let mut user = UserSession::from_claims(&claims);
        if let Some(access_token) = tokens.access_token.as_deref() {
            match self.fetch_profile(access_token).await {
                Ok(profile) => user.enrich(&profile),
                Err(e) => warn!(error = %e, "could not fetch Graph profile"),
            }
        }

        debug!(oid = %user.oid, "sign-in completed");
        Ok(user)
    }

    async fn exchange_code(&self, flow: &AuthCodeFlow, code: &str) -> Result<TokenSet, AuthError> {
        let scope = SCOPES.join(" ");
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "authorization_code")
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", &self.client_secret)
            .append_pair("code", code)
            .append_pair("redirect_uri", &flow.redirect_uri)
            .append_pair("code_verifier", &flow.code_verifier)
            .append_pair("scope", &scope)
            .finish();

        debug!("exchanging authorization code for tokens");

        let response = self
            .http
            .post(&self.token_url)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        match parse_token_response(&text) {
            Err(AuthError::Parse(_)) if !status.is_success() => Err(AuthError::Provider {
                error: format!("HTTP {}", status.as_u16()),
                description: sanitize_http_error_body(&text),
            }),
            other => other,
        }
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<GraphProfile, AuthError> {
        let response = self
            .http
            .get(&self.graph_url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Provider {
                error: format!("Graph HTTP {}", status.as_u16()),
                description: sanitize_http_error_body(&text),
            });
        }
        serde_json::from_str(&text).map_err(|e| AuthError::Parse(e.to_string()))
    }
}
