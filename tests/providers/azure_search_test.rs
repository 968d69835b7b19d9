//! Azure AI Search client wire format tests.

use ragcall::config::SearchConfig;
use ragcall::search::azure::{build_request, parse_count, parse_response, AzureSearchClient};
use ragcall::search::{DocumentSearch, SearchError, SearchQuery};

use crate::http_stub::{captured, serve_once};

fn client(endpoint: &str) -> AzureSearchClient {
    let config = SearchConfig {
        endpoint: endpoint.to_owned(),
        api_key: "test-search-key".to_owned(),
        ..SearchConfig::default()
    };
    match AzureSearchClient::from_config(&config) {
        Ok(client) => client,
        Err(err) => panic!("client should build: {err}"),
    }
}

#[test]
fn build_request_asks_for_total_count() {
    let req = build_request(&SearchQuery::new("revenue", 5));
    assert_eq!(req.search, "revenue");
    assert_eq!(req.top, 5);
    assert!(req.count);
}

#[test]
fn parse_response_keeps_fields_and_score() {
    let body = r#"{
        "@odata.count": 17,
        "value": [
            {"@search.score": 3.25, "title": "Q3", "content": "Revenue grew.", "year": 2024},
            {"@search.score": 1.0, "Content": "Upper-case field."}
        ]
    }"#;
    let page = match parse_response(body) {
        Ok(page) => page,
        Err(err) => panic!("response should parse: {err}"),
    };
    assert_eq!(page.total_count, Some(17));
    assert_eq!(page.documents.len(), 2);
    assert!((page.documents[0].score - 3.25).abs() < f64::EPSILON);
    assert_eq!(page.documents[0].str_field("title"), Some("Q3"));
    assert_eq!(page.documents[0].fields.get("year"), Some(&serde_json::json!(2024)));
    assert!(!page.documents[0].fields.contains_key("@search.score"));
    assert_eq!(page.documents[1].str_field("Content"), Some("Upper-case field."));
}

#[test]
fn parse_count_accepts_bom_prefixed_text() {
    match parse_count("\u{feff}1234") {
        Ok(count) => assert_eq!(count, 1234),
        Err(err) => panic!("count should parse: {err}"),
    }
    assert!(matches!(parse_count("many"), Err(SearchError::Parse(_))));
}

#[tokio::test]
async fn search_posts_query_with_api_key() {
    let reply = r#"{"@odata.count": 1, "value": [{"@search.score": 2.0, "content": "Margins."}]}"#;
    let (base, rx) = serve_once("200 OK", "application/json", reply).await;

    let page = match client(&base).search(&SearchQuery::new("margins", 3)).await {
        Ok(page) => page,
        Err(err) => panic!("search should succeed: {err}"),
    };
    assert_eq!(page.documents.len(), 1);
    assert_eq!(page.total_count, Some(1));

    let request = captured(rx).await;
    assert!(request
        .request_line
        .starts_with("POST /indexes/novatech-03/docs/search?api-version=2023-11-01 "));
    assert_eq!(request.header("api-key"), Some("test-search-key"));
    let body: serde_json::Value = match serde_json::from_str(&request.body) {
        Ok(body) => body,
        Err(err) => panic!("request body should be JSON: {err}"),
    };
    assert_eq!(body, serde_json::json!({"search": "margins", "top": 3, "count": true}));
}

#[tokio::test]
async fn document_count_reads_plain_text() {
    let (base, rx) = serve_once("200 OK", "text/plain; charset=utf-8", "\u{feff}42").await;

    match client(&base).document_count().await {
        Ok(count) => assert_eq!(count, 42),
        Err(err) => panic!("count should succeed: {err}"),
    }

    let request = captured(rx).await;
    assert!(request
        .request_line
        .starts_with("GET /indexes/novatech-03/docs/$count?api-version=2023-11-01 "));
}

#[tokio::test]
async fn search_http_errors_are_upstream_errors() {
    let (base, _rx) = serve_once(
        "403 Forbidden",
        "application/json",
        r#"{"error": {"message": "Invalid api-key"}}"#,
    )
    .await;

    match client(&base).search(&SearchQuery::new("x", 3)).await {
        Err(SearchError::Upstream(_)) => {}
        other => panic!("expected upstream error, got: {other:?}"),
    }
}
