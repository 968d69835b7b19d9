//! HTML pages and the sign-in round trip up to the provider redirect.

use axum::http::StatusCode;

use crate::harness::{app, body_text, location, set_cookie};

#[tokio::test]
async fn index_redirects_anonymous_users_to_login() {
    let app = app().build();

    let response = app.get("/", None).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response).as_deref(), Some("/login"));
}

#[tokio::test]
async fn index_greets_signed_in_user() {
    let app = app().build();
    let cookie = app.sign_in().await;

    let response = app.get("/", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Ana Lopez"));
    assert!(html.contains("Investor Relations"));
    assert!(html.contains("/process_prompt"));
}

#[tokio::test]
async fn login_starts_flow_and_sets_cookie() {
    let app = app().identity_configured().build();

    let response = app.get("/login", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = match set_cookie(&response) {
        Some(cookie) => cookie,
        None => panic!("login should establish a session cookie"),
    };
    assert!(cookie.starts_with("session="));
    let html = body_text(response).await;
    assert!(html.contains("https://login.microsoftonline.com/contoso/oauth2/v2.0/authorize?"));
    assert!(html.contains("code_challenge_method"));
}

#[tokio::test]
async fn callback_with_wrong_state_fails_and_flow_is_consumed() {
    let app = app().identity_configured().build();
    let login = app.get("/login", None).await;
    let cookie = match set_cookie(&login) {
        Some(cookie) => cookie,
        None => panic!("login should establish a session cookie"),
    };

    let first = app
        .get("/getAToken?code=abc&state=forged", Some(&cookie))
        .await;
    assert_eq!(first.status(), StatusCode::OK);
    let html = body_text(first).await;
    assert!(html.contains("ValueError"));
    assert!(html.contains("state mismatch"));

    let second = app
        .get("/getAToken?code=abc&state=forged", Some(&cookie))
        .await;
    let html = body_text(second).await;
    assert!(html.contains("no sign-in in progress"));

    // Still not signed in.
    let index = app.get("/", Some(&cookie)).await;
    assert_eq!(index.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn callback_without_session_renders_error_page() {
    let app = app().identity_configured().build();

    let response = app.get("/getAToken?error=access_denied", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Sign-in failed"));
}

#[tokio::test]
async fn login_without_identity_config_shows_error_page() {
    let app = app().build();

    let response = app.get("/login", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Configuration error"));
}

#[tokio::test]
async fn logout_clears_session() {
    let app = app().build();
    let cookie = app.sign_in().await;

    let response = app.get("/logout", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response).as_deref(), Some("/login"));
    assert_eq!(set_cookie(&response).as_deref(), Some("session="));

    let index = app.get("/", Some(&cookie)).await;
    assert_eq!(index.status(), StatusCode::FOUND);
}
