//! `/process_prompt`, `/process_chat`, `/process_search`.

use axum::http::StatusCode;

use crate::fakes::{doc, FakeProvider, FakeSearch};
use crate::harness::{app, json_body};

fn documents() -> Vec<ragcall::search::SearchResult> {
    vec![
        doc("Q3 report", "Revenue grew 12%.", 2.5),
        doc("Guidance", "Guidance raised.", 1.5),
    ]
}

#[tokio::test]
async fn unauthenticated_requests_get_401_regardless_of_body() {
    let app = app().build();

    for (uri, body) in [
        ("/process_prompt", r#"{"prompt": "hi", "mode": "chat"}"#),
        ("/process_prompt", "not even json"),
        ("/process_chat", r#"{"prompt": "hi"}"#),
        ("/process_search", "{}"),
        ("/process_sk_chat", r#"{"prompt": "hi"}"#),
        ("/process_sk_search", r#"{"prompt": "hi"}"#),
    ] {
        let (status, body) = json_body(app.post_json(uri, None, body).await).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["error"], "Not authenticated");
    }
}

#[tokio::test]
async fn forged_cookie_is_not_a_session() {
    let app = app().build();
    let (status, _) = json_body(
        app.post_json(
            "/process_prompt",
            Some("session=00000000-0000-0000-0000-000000000000.AAAA"),
            r#"{"prompt": "hi"}"#,
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_or_empty_prompt_is_400() {
    let app = app().build();
    let cookie = app.sign_in().await;

    for body in ["{}", r#"{"prompt": ""}"#, "garbage", r#"{"prompt": 42}"#] {
        let (status, json) =
            json_body(app.post_json("/process_prompt", Some(&cookie), body).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json["error"], "No prompt provided");
    }
}

#[tokio::test]
async fn chat_mode_envelope() {
    let app = app()
        .search(FakeSearch::with_documents(documents()))
        .provider(FakeProvider::replying("Solid quarter."))
        .build();
    let cookie = app.sign_in().await;

    let (status, json) = json_body(
        app.post_json(
            "/process_prompt",
            Some(&cookie),
            r#"{"prompt": "How was Q3?", "mode": "chat", "persona": "ceo"}"#,
        )
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert_eq!(json["mode"], "chat");
    assert_eq!(json["persona"], "ceo");
    assert_eq!(json["query"], "How was Q3?");
    assert_eq!(json["chat_result"]["status"], "success");
    assert_eq!(json["chat_result"]["content"], "Solid quarter.");
    assert_eq!(json["chat_result"]["usage"]["total_tokens"], 150);
    let response = json["response"].as_str().unwrap_or_default();
    assert!(response.starts_with("CEO Response (with knowledge base context):"));
    assert!(response.contains("Based on 2 relevant document(s)"));
}

#[tokio::test]
async fn unknown_mode_and_persona_fall_back() {
    let app = app()
        .search(FakeSearch::with_documents(documents()))
        .build();
    let cookie = app.sign_in().await;

    let (status, json) = json_body(
        app.post_json(
            "/process_prompt",
            Some(&cookie),
            r#"{"prompt": "revenue", "mode": "brainstorm", "persona": "cfo"}"#,
        )
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "search");
    assert_eq!(json["status"], "success");
    assert_eq!(json["search_results"]["status"], "success");
    assert_eq!(json["search_results"]["total_count"], 2);
    assert_eq!(json["search_results"]["documents"][0]["title"], "Q3 report");
    assert_eq!(json["search_results"]["documents"][0]["score"], 2.5);
    assert!(json.get("persona").is_none());
}

#[tokio::test]
async fn chat_without_backends_is_an_in_band_error() {
    let app = app().build();
    let cookie = app.sign_in().await;

    let (status, json) = json_body(
        app.post_json(
            "/process_chat",
            Some(&cookie),
            r#"{"prompt": "hi", "persona": "analyst"}"#,
        )
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "error");
    assert_eq!(json["response"], "Failed to create OpenAI client");
    assert_eq!(json["persona"], "analyst");
    assert_eq!(json["context_documents"], 0);
    assert_eq!(json["chat_result"]["status"], "error");
}

#[tokio::test]
async fn search_route_reports_search_errors() {
    let app = app().search(FakeSearch::failing()).build();
    let cookie = app.sign_in().await;

    let (status, json) = json_body(
        app.post_json("/process_search", Some(&cookie), r#"{"prompt": "revenue"}"#)
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "error");
    assert_eq!(json["search_results"]["status"], "error");
    assert!(json["response"]
        .as_str()
        .unwrap_or_default()
        .starts_with("Search error:"));
}
