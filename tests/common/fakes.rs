//! In-process backends for pipeline and router tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Map;

use ragcall::providers::{
    CompletionRequest, CompletionResponse, LlmProvider, ProviderError, UsageStats,
};
use ragcall::search::{DocumentSearch, SearchError, SearchPage, SearchQuery, SearchResult};

/// A ranked document with a title and content.
pub fn doc(title: &str, content: &str, score: f64) -> SearchResult {
    let mut result = SearchResult::from_raw(Map::new())
        .with_field("title", title)
        .with_field("content", content);
    result.score = score;
    result
}

/// Search backend serving a fixed document list.
pub struct FakeSearch {
    documents: Vec<SearchResult>,
    total_count: u64,
    failing: bool,
    queries: Mutex<Vec<SearchQuery>>,
}

impl FakeSearch {
    /// Backend returning `documents` (truncated to each query's `top`).
    pub fn with_documents(documents: Vec<SearchResult>) -> Self {
        let total_count = u64::try_from(documents.len()).unwrap_or(u64::MAX);
        Self {
            documents,
            total_count,
            failing: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Override the reported total count.
    pub fn with_total_count(mut self, total_count: u64) -> Self {
        self.total_count = total_count;
        self
    }

    /// Backend whose every call fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::with_documents(Vec::new())
        }
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentSearch for FakeSearch {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SearchError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }
        if self.failing {
            return Err(SearchError::Parse("index offline".to_owned()));
        }
        Ok(SearchPage {
            documents: self.documents.iter().take(query.top).cloned().collect(),
            total_count: Some(self.total_count),
        })
    }

    async fn document_count(&self) -> Result<u64, SearchError> {
        if self.failing {
            return Err(SearchError::Parse("index offline".to_owned()));
        }
        Ok(self.total_count)
    }
}

/// Completion backend with a canned reply.
pub struct FakeProvider {
    reply: Option<String>,
    failing: bool,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeProvider {
    /// Provider answering `reply`.
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_owned()),
            failing: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider returning a choice without content.
    pub fn empty() -> Self {
        Self {
            reply: None,
            failing: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider whose every call is rejected upstream.
    pub fn failing() -> Self {
        Self {
            reply: None,
            failing: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for FakeProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        if self.failing {
            return Err(ProviderError::HttpStatus {
                status: 429,
                body: "rate limited".to_owned(),
            });
        }
        Ok(CompletionResponse {
            content: self.reply.clone(),
            usage: UsageStats {
                prompt_tokens: 120,
                completion_tokens: 30,
                total_tokens: 150,
            },
            model: "fake-gpt".to_owned(),
        })
    }

    fn model_id(&self) -> &str {
        "fake-gpt"
    }
}
