//! Direct RAG pipeline: search, assemble, prompt, complete, format.

use std::sync::Arc;

use serde::Serialize;

use crate::providers::LlmProvider;
use crate::search::{search_documents, DocumentSearch, SearchOutcome};

use super::completion::{complete_chat, ChatResult, GenerationParams};
use super::context::{assemble_context, CHAT_TOP, SEARCH_TOP};
use super::format::{format_chat_response, format_search_response};
use super::persona::Persona;
use super::prompt::build_messages;
use super::{ResponseStatus, Variant};

/// Chat-mode result.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    /// Formatted text (or the error message).
    pub response: String,
    /// Overall outcome.
    pub status: ResponseStatus,
    /// The user's query.
    pub query: String,
    /// Persona that answered.
    pub persona: Persona,
    /// Documents that contributed context.
    pub context_documents: usize,
    /// Raw completion result.
    pub chat_result: ChatResult,
}

/// Search-only result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// Formatted listing (or the error message).
    pub response: String,
    /// Overall outcome.
    pub status: ResponseStatus,
    /// The user's query.
    pub query: String,
    /// Raw search outcome.
    pub search_results: SearchOutcome,
}

/// Backends and settings for the direct pipeline.
#[derive(Clone)]
pub struct RagPipeline {
    search: Option<Arc<dyn DocumentSearch>>,
    provider: Option<Arc<dyn LlmProvider>>,
    params: GenerationParams,
    rag_debug: bool,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("search", &self.search.is_some())
            .field("provider", &self.provider.as_ref().map(|p| p.model_id()))
            .field("params", &self.params)
            .field("rag_debug", &self.rag_debug)
            .finish()
    }
}

impl RagPipeline {
    /// Create a pipeline. Either backend may be absent.
    pub fn new(
        search: Option<Arc<dyn DocumentSearch>>,
        provider: Option<Arc<dyn LlmProvider>>,
        params: GenerationParams,
        rag_debug: bool,
    ) -> Self {
        Self {
            search,
            provider,
            params,
            rag_debug,
        }
    }

    /// Answer a query in character, grounded in up to three documents.
    pub async fn process_chat(&self, query: &str, persona: Persona) -> ChatResponse {
        tracing::info!(%persona, query_len = query.len(), "processing chat query");

        let (context, _) = assemble_context(self.search.as_deref(), query, CHAT_TOP).await;
        let messages = build_messages(persona, query, &context, Variant::Direct);
        if self.rag_debug {
            tracing::debug!(
                documents = context.count(),
                prompt_chars = messages.iter().map(|m| m.content.len()).sum::<usize>(),
                "prompt assembled"
            );
        }

        let chat_result = complete_chat(self.provider.as_deref(), messages, self.params).await;
        let response = format_chat_response(
            persona,
            &chat_result,
            context.count(),
            Variant::Direct,
            self.rag_debug,
        );

        ChatResponse {
            response,
            status: ResponseStatus::from_success(chat_result.is_success()),
            query: query.to_owned(),
            persona,
            context_documents: context.count(),
            chat_result,
        }
    }

    /// List the top five documents for a query.
    pub async fn process_search(&self, query: &str) -> SearchResponse {
        tracing::info!(query_len = query.len(), "processing search query");

        let outcome = search_documents(self.search.as_deref(), query, SEARCH_TOP).await;
        SearchResponse {
            response: format_search_response(query, &outcome),
            status: ResponseStatus::from_success(outcome.is_success()),
            query: query.to_owned(),
            search_results: outcome,
        }
    }

    /// Raw search results for diagnostics.
    pub async fn raw_search(&self, query: &str, top: usize) -> SearchOutcome {
        search_documents(self.search.as_deref(), query, top).await
    }
}
