//! Azure OpenAI provider wire format tests.

use ragcall::config::CompletionConfig;
use ragcall::providers::azure_openai::{
    build_request, completions_url, parse_response, AzureOpenAiProvider,
};
use ragcall::providers::{CompletionRequest, LlmProvider, Message, ProviderError};

use crate::http_stub::{captured, serve_once};

fn simple_request() -> CompletionRequest {
    CompletionRequest {
        messages: vec![
            Message::system("You are a CEO."),
            Message::user("How was the quarter?"),
        ],
        max_tokens: 500,
        temperature: 0.7,
    }
}

fn config(endpoint: &str) -> CompletionConfig {
    CompletionConfig {
        endpoint: endpoint.to_owned(),
        api_key: "test-azure-key".to_owned(),
        ..CompletionConfig::default()
    }
}

#[test]
fn build_request_maps_roles_and_sampling() {
    let req = build_request(&simple_request());
    assert_eq!(req.messages.len(), 2);
    assert_eq!(req.messages[0].role, "system");
    assert_eq!(req.messages[1].role, "user");
    assert_eq!(req.messages[1].content, "How was the quarter?");
    assert_eq!(req.max_tokens, 500);
    assert!((req.temperature - 0.7).abs() < f32::EPSILON);
}

#[test]
fn completions_url_is_deployment_scoped() {
    assert_eq!(
        completions_url("https://demo.openai.azure.com/", "gpt-35-turbo", "2024-12-01-preview"),
        "https://demo.openai.azure.com/openai/deployments/gpt-35-turbo/chat/completions?api-version=2024-12-01-preview"
    );
}

#[test]
fn parse_response_reads_first_choice_and_usage() {
    let body = r#"{
        "model": "gpt-35-turbo",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": "Strong."}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120}
    }"#;
    let resp = match parse_response(body) {
        Ok(resp) => resp,
        Err(err) => panic!("response should parse: {err}"),
    };
    assert_eq!(resp.content.as_deref(), Some("Strong."));
    assert_eq!(resp.usage.total_tokens, 120);
    assert_eq!(resp.model, "gpt-35-turbo");
}

#[test]
fn parse_response_without_choices_has_no_content() {
    let resp = match parse_response(r#"{"choices": [], "usage": {"prompt_tokens": 5, "completion_tokens": 0}}"#) {
        Ok(resp) => resp,
        Err(err) => panic!("response should parse: {err}"),
    };
    assert!(resp.content.is_none());
    assert_eq!(resp.usage.total_tokens, 5);
}

#[test]
fn parse_response_rejects_non_json() {
    assert!(matches!(parse_response("<html>"), Err(ProviderError::Parse(_))));
}

#[test]
fn from_config_requires_endpoint_and_key() {
    match AzureOpenAiProvider::from_config(&CompletionConfig::default()) {
        Err(ProviderError::Unavailable(_)) => {}
        other => panic!("expected unavailable, got: {other:?}"),
    }
}

#[tokio::test]
async fn complete_posts_to_deployment_with_api_key() {
    let reply = r#"{"choices": [{"message": {"content": "Record revenue."}}], "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}}"#;
    let (base, rx) = serve_once("200 OK", "application/json", reply).await;
    let provider = match AzureOpenAiProvider::from_config(&config(&base)) {
        Ok(provider) => provider,
        Err(err) => panic!("provider should build: {err}"),
    };

    let resp = match provider.complete(simple_request()).await {
        Ok(resp) => resp,
        Err(err) => panic!("completion should succeed: {err}"),
    };
    assert_eq!(resp.content.as_deref(), Some("Record revenue."));

    let request = captured(rx).await;
    assert!(request.request_line.starts_with(
        "POST /openai/deployments/gpt-35-turbo/chat/completions?api-version=2024-12-01-preview "
    ));
    assert_eq!(request.header("api-key"), Some("test-azure-key"));
    let body: serde_json::Value = match serde_json::from_str(&request.body) {
        Ok(body) => body,
        Err(err) => panic!("request body should be JSON: {err}"),
    };
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["max_tokens"], 500);
}

#[tokio::test]
async fn complete_surfaces_http_errors() {
    let (base, _rx) = serve_once(
        "429 Too Many Requests",
        "application/json",
        r#"{"error": {"code": "429", "message": "Rate limit"}}"#,
    )
    .await;
    let provider = match AzureOpenAiProvider::from_config(&config(&base)) {
        Ok(provider) => provider,
        Err(err) => panic!("provider should build: {err}"),
    };

    match provider.complete(simple_request()).await {
        Err(ProviderError::HttpStatus { status, body }) => {
            assert_eq!(status, 429);
            assert!(body.contains("Rate limit"));
        }
        other => panic!("expected http status error, got: {other:?}"),
    }
}
