//! Azure AI Search client using the index documents REST API.
//!
//! - `POST {endpoint}/indexes/{index}/docs/search?api-version=…`
//! - `GET  {endpoint}/indexes/{index}/docs/$count?api-version=…`
//!
//! Authenticated with the `api-key` header.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::SearchConfig;
use crate::providers::check_http_response;

use super::{DocumentSearch, SearchError, SearchPage, SearchQuery, SearchResult};

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Search request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct AzureSearchRequest {
    /// Free-text query.
    pub search: String,
    /// Maximum results.
    pub top: usize,
    /// Request `@odata.count`.
    pub count: bool,
}

/// Search response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AzureSearchResponse {
    /// Total match count when requested.
    #[serde(rename = "@odata.count")]
    pub count: Option<u64>,
    /// Raw result records.
    #[serde(default)]
    pub value: Vec<Map<String, Value>>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Azure AI Search client bound to one index.
#[derive(Clone)]
pub struct AzureSearchClient {
    index_url: String,
    api_key: String,
    api_version: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AzureSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureSearchClient")
            .field("index_url", &self.index_url)
            .field("api_key", &"__REDACTED__")
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl AzureSearchClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::NotConfigured`] when the endpoint or key is
    /// missing. No network call is made.
    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        if !config.is_configured() {
            return Err(SearchError::NotConfigured);
        }
        Ok(Self {
            index_url: format!(
                "{}/indexes/{}",
                config.endpoint.trim().trim_end_matches('/'),
                config.index
            ),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            client: reqwest::Client::new(),
        })
    }

    fn docs_url(&self, suffix: &str) -> String {
        format!(
            "{}/docs{suffix}?api-version={}",
            self.index_url, self.api_version
        )
    }
}

/// Build the search request body for a query.
#[doc(hidden)]
pub fn build_request(query: &SearchQuery) -> AzureSearchRequest {
    AzureSearchRequest {
        search: query.text.clone(),
        top: query.top,
        count: query.include_total_count,
    }
}

/// Parse a search response body into a page of results.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] on malformed JSON.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<SearchPage, SearchError> {
    let resp: AzureSearchResponse =
        serde_json::from_str(body).map_err(|e| SearchError::Parse(e.to_string()))?;
    Ok(SearchPage {
        documents: resp.value.into_iter().map(SearchResult::from_raw).collect(),
        total_count: resp.count,
    })
}

/// Parse the plain-text `$count` body (may carry a UTF-8 BOM).
///
/// # Errors
///
/// Returns [`SearchError::Parse`] when the body is not an integer.
#[doc(hidden)]
pub fn parse_count(body: &str) -> Result<u64, SearchError> {
    let trimmed = body.trim_start_matches('\u{feff}').trim();
    trimmed
        .parse()
        .map_err(|_| SearchError::Parse(format!("unexpected document count body: {trimmed:?}")))
}

// ---------------------------------------------------------------------------
// Trait impl
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl DocumentSearch for AzureSearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SearchError> {
        let response = self
            .client
            .post(self.docs_url("/search"))
            .header("content-type", "application/json")
            .header("api-key", &self.api_key)
            .json(&build_request(query))
            .send()
            .await?;

        let payload = check_http_response(response).await?;
        let page = parse_response(&payload)?;
        tracing::debug!(
            results = page.documents.len(),
            total_count = ?page.total_count,
            "search completed"
        );
        Ok(page)
    }

    async fn document_count(&self) -> Result<u64, SearchError> {
        let response = self
            .client
            .get(self.docs_url("/$count"))
            .header("api-key", &self.api_key)
            .send()
            .await?;

        let payload = check_http_response(response).await?;
        parse_count(&payload)
    }
}
