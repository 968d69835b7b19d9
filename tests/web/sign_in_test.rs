//! Callback completion, session rotation and anonymous session bounds.

use axum::http::{HeaderMap, StatusCode};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::json;

use ragcall::auth::AuthCodeFlow;
use ragcall::web::bind;

use crate::harness::{app, location, set_cookie, TestApp};
use crate::http_stub::serve_once;

fn id_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

fn flow() -> AuthCodeFlow {
    AuthCodeFlow {
        state: "state-1".to_owned(),
        nonce: "nonce-1".to_owned(),
        code_verifier: "verifier-1".to_owned(),
        redirect_uri: "http://127.0.0.1:5000/getAToken".to_owned(),
        auth_uri: "https://login.example/authorize?x=1".to_owned(),
    }
}

/// Anonymous session holding a pending sign-in; returns its cookie.
async fn pending_session(app: &TestApp) -> String {
    let (id, _) = app.state.sessions.get_or_create(&HeaderMap::new()).await;
    app.state.sessions.set_flow(id, flow()).await;
    format!("session={}", app.state.sessions.sign(id))
}

#[tokio::test]
async fn successful_callback_rotates_the_session_cookie() {
    let token_body = json!({
        "access_token": "access-abc",
        "id_token": id_token(&json!({
            "name": "Ana Lopez",
            "preferred_username": "ana@contoso.com",
            "oid": "oid-123",
            "nonce": "nonce-1"
        })),
    })
    .to_string();
    let (token_base, _rx) = serve_once("200 OK", "application/json", &token_body).await;
    let app = app()
        .identity_endpoints(&format!("{token_base}/token"), "http://127.0.0.1:9/me")
        .build();
    let before = pending_session(&app).await;

    let response = app
        .get("/getAToken?code=code-xyz&state=state-1", Some(&before))
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response).as_deref(), Some("/"));
    let after = match set_cookie(&response) {
        Some(cookie) => cookie,
        None => panic!("sign-in should issue a fresh session cookie"),
    };
    assert!(after.starts_with("session="));
    assert_ne!(after, before);

    let old = app.get("/", Some(&before)).await;
    assert_eq!(old.status(), StatusCode::FOUND);
    assert_eq!(location(&old).as_deref(), Some("/login"));

    let new = app.get("/", Some(&after)).await;
    assert_eq!(new.status(), StatusCode::OK);
}

#[tokio::test]
async fn failed_callback_keeps_the_visitor_signed_out() {
    let (token_base, _rx) = serve_once(
        "400 Bad Request",
        "application/json",
        r#"{"error": "invalid_grant", "error_description": "code expired"}"#,
    )
    .await;
    let app = app()
        .identity_endpoints(&format!("{token_base}/token"), "http://127.0.0.1:9/me")
        .build();
    let cookie = pending_session(&app).await;

    let response = app
        .get("/getAToken?code=code-xyz&state=state-1", Some(&cookie))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).is_none());
    let index = app.get("/", Some(&cookie)).await;
    assert_eq!(index.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn anonymous_logins_stay_within_the_session_cap() {
    let app = app().identity_configured().pending_limits(600, 50).build();

    for _ in 0..300 {
        let response = app.get("/login", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(app.state.sessions.count().await, 50);
}

#[tokio::test]
async fn anonymous_logins_do_not_evict_signed_in_users() {
    let app = app().identity_configured().pending_limits(600, 5).build();
    let cookie = app.sign_in().await;

    for _ in 0..20 {
        app.get("/login", None).await;
    }

    assert_eq!(app.state.sessions.count().await, 6);
    let index = app.get("/", Some(&cookie)).await;
    assert_eq!(index.status(), StatusCode::OK);
}

#[tokio::test]
async fn stale_anonymous_sessions_are_purged() {
    let app = app().identity_configured().pending_limits(0, 1000).build();
    let login = app.get("/login", None).await;
    let cookie = match set_cookie(&login) {
        Some(cookie) => cookie,
        None => panic!("login should establish a session cookie"),
    };
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    assert_eq!(app.state.sessions.purge_expired().await, 1);
    let callback = app
        .get("/getAToken?code=abc&state=anything", Some(&cookie))
        .await;
    assert_eq!(callback.status(), StatusCode::OK);
}

#[tokio::test]
async fn bind_resolves_host_names() {
    let listener = match bind("localhost", 0).await {
        Ok(listener) => listener,
        Err(e) => panic!("localhost should bind: {e:#}"),
    };
    match listener.local_addr() {
        Ok(addr) => {
            assert!(addr.ip().is_loopback());
            assert_ne!(addr.port(), 0);
        }
        Err(e) => panic!("listener should expose its address: {e}"),
    }
}
