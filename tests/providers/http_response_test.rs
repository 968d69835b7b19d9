//! HTTP response sanitization and truncation tests.

use ragcall::providers::{check_http_response, sanitize_http_error_body, ProviderError};

use crate::http_stub::serve_once;

async fn checked(status_line: &str, body: &str) -> Result<String, ProviderError> {
    let (url, _rx) = serve_once(status_line, "text/plain", body).await;
    let response = match reqwest::get(format!("{url}/")).await {
        Ok(response) => response,
        Err(err) => panic!("request should complete: {err}"),
    };
    check_http_response(response).await
}

#[tokio::test]
async fn success_returns_body() {
    match checked("200 OK", "{\"ok\":true}").await {
        Ok(body) => assert_eq!(body, "{\"ok\":true}"),
        Err(err) => panic!("2xx should pass: {err}"),
    }
}

#[tokio::test]
async fn check_http_response_redacts_key_like_values() {
    let raw_key = "sk-abcdefghijklmnopqrstuvwxyz0123456789";
    let body = format!("{{\"error\": \"bad key {raw_key}\"}}");

    match checked("401 Unauthorized", &body).await {
        Err(ProviderError::HttpStatus { status, body }) => {
            assert_eq!(status, 401);
            assert!(!body.contains(raw_key));
            assert!(body.contains("[REDACTED]"));
        }
        other => panic!("expected http status error, got: {other:?}"),
    }
}

#[tokio::test]
async fn check_http_response_truncates_long_error_body() {
    let body = "x".repeat(400);

    match checked("500 Internal Server Error", &body).await {
        Err(ProviderError::HttpStatus { body, .. }) => {
            assert!(body.ends_with("...[truncated]"));
        }
        other => panic!("expected http status error, got: {other:?}"),
    }
}

#[test]
fn sanitize_redacts_api_key_assignments_and_jwts() {
    let body = "api-key: ABCDEF0123456789ABCDEF token eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxMjM0NTY3ODkwIn0.sig";
    let out = sanitize_http_error_body(body);
    assert!(!out.contains("ABCDEF0123456789ABCDEF"));
    assert!(!out.contains("eyJhbGciOiJIUzI1NiJ9"));
    assert_eq!(out.matches("[REDACTED]").count(), 2);
}
