//! Document search abstraction.
//!
//! [`DocumentSearch`] is the seam between the RAG pipeline and the index
//! backend. The production implementation is [`azure::AzureSearchClient`]
//! (Azure AI Search REST API); tests substitute in-process fakes.
//!
//! Backend calls return `Result<_, SearchError>`; the pipeline converts them
//! at the boundary into a [`SearchOutcome`], which is what handlers serialize.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::providers::ProviderError;

pub mod azure;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One ranked document returned by the index.
///
/// Serialized flat: every index field plus `score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Relevance score reported by the index (`@search.score`).
    #[serde(default)]
    pub score: f64,
    /// Index fields, excluding `@`-prefixed annotations.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl SearchResult {
    /// Build a result from a raw index record.
    ///
    /// The score is read from `@search.score`; keys starting with `@` are
    /// dropped from the field map.
    pub fn from_raw(raw: Map<String, Value>) -> Self {
        let score = raw
            .get("@search.score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let fields = raw
            .into_iter()
            .filter(|(key, _)| !key.starts_with('@'))
            .collect();
        Self { score, fields }
    }

    /// Builder-style helper used by fakes and tests.
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    /// String value of a field, if present and a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// A keyword query against the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free-text search expression.
    pub text: String,
    /// Maximum number of results to return.
    pub top: usize,
    /// Ask the index for the total match count.
    pub include_total_count: bool,
}

impl SearchQuery {
    /// Query for `top` results with the total count requested.
    pub fn new(text: impl Into<String>, top: usize) -> Self {
        Self {
            text: text.into(),
            top,
            include_total_count: true,
        }
    }
}

/// A page of results from the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Ranked documents, best first.
    pub documents: Vec<SearchResult>,
    /// Total matches in the index, when requested and reported.
    pub total_count: Option<u64>,
}

/// Outcome of a search as seen by handlers and the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SearchOutcome {
    /// The index answered.
    Success {
        /// Ranked documents.
        documents: Vec<SearchResult>,
        /// Total matches reported by the index (0 when unreported).
        total_count: u64,
        /// The query text.
        query: String,
    },
    /// The search could not be performed.
    Error {
        /// Human-readable error.
        error: String,
        /// The query text.
        query: String,
    },
}

impl SearchOutcome {
    /// Convert a backend result into an outcome.
    pub fn from_result(query: &str, result: Result<SearchPage, SearchError>) -> Self {
        match result {
            Ok(page) => Self::Success {
                documents: page.documents,
                total_count: page.total_count.unwrap_or(0),
                query: query.to_owned(),
            },
            Err(e) => Self::Error {
                error: format!("Search error: {e}"),
                query: query.to_owned(),
            },
        }
    }

    /// Outcome used when no search backend is configured.
    pub fn unavailable(query: &str) -> Self {
        Self::Error {
            error: "Failed to create search client".to_owned(),
            query: query.to_owned(),
        }
    }

    /// Documents of a successful outcome; empty otherwise.
    pub fn documents(&self) -> &[SearchResult] {
        match self {
            Self::Success { documents, .. } => documents,
            Self::Error { .. } => &[],
        }
    }

    /// Mutable access to the documents of a successful outcome.
    pub fn documents_mut(&mut self) -> Option<&mut Vec<SearchResult>> {
        match self {
            Self::Success { documents, .. } => Some(documents),
            Self::Error { .. } => None,
        }
    }

    /// Whether the index answered.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by search backends.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Endpoint or key missing.
    #[error("search service not configured")]
    NotConfigured,
    /// HTTP transport failure.
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Non-success status or transport failure while reading the body.
    #[error(transparent)]
    Upstream(#[from] ProviderError),
    /// Response did not match the expected schema.
    #[error("search response parse error: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Keyword search over a document index.
#[async_trait]
pub trait DocumentSearch: Send + Sync {
    /// Run a query and return ranked results.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] on transport, status, or parse failure.
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SearchError>;

    /// Number of documents in the index.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] on transport, status, or parse failure.
    async fn document_count(&self) -> Result<u64, SearchError>;
}

/// Run a query against an optional backend and convert to an outcome.
///
/// Never fails: a missing backend or a backend error becomes
/// [`SearchOutcome::Error`].
pub async fn search_documents(
    search: Option<&dyn DocumentSearch>,
    query: &str,
    top: usize,
) -> SearchOutcome {
    let Some(search) = search else {
        return SearchOutcome::unavailable(query);
    };
    let result = search.search(&SearchQuery::new(query, top)).await;
    if let Err(e) = &result {
        tracing::warn!(error = %e, top, "document search failed");
    }
    SearchOutcome::from_result(query, result)
}
