//! Orchestrated RAG variant.
//!
//! Routes the same search → prompt → completion steps through a plugin
//! [`kernel::Kernel`]: persona functions, a retrieval function and a
//! registered chat completion service. The kernel is built at most once,
//! on first use, behind a [`tokio::sync::OnceCell`]; concurrent first
//! callers await the same initialization.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::providers::LlmProvider;
use crate::rag::completion::{complete_chat, GenerationParams};
use crate::rag::context::ContextBlock;
use crate::rag::format::{format_chat_response, format_orchestrated_search};
use crate::rag::persona::Persona;
use crate::rag::prompt::build_messages_with_system;
use crate::rag::{ResponseStatus, Variant};
use crate::search::DocumentSearch;

pub mod kernel;
pub mod plugins;

use kernel::{FunctionValue, Kernel, KernelArguments};
use plugins::{
    PersonaFunction, SearchDocumentsFunction, PERSONAS_PLUGIN, RAG_PLUGIN, SEARCH_FUNCTION,
};

/// Service id of the registered chat completion service.
pub const CHAT_SERVICE_ID: &str = "azure_chat_completion";

/// Framework tag reported in orchestrated responses.
pub const FRAMEWORK: &str = "semantic_kernel";

/// System message used when the persona plugin cannot answer.
const FALLBACK_SYSTEM_MESSAGE: &str = "You are an AI assistant providing helpful responses.";

/// Documents requested for the orchestrated search listing.
const ORCHESTRATED_SEARCH_TOP: usize = 5;

/// Why the orchestrator cannot serve a request.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Turned off in configuration.
    #[error("orchestrator is disabled")]
    Disabled,
    /// Kernel construction failed.
    #[error("kernel initialization failed: {0}")]
    Init(String),
}

/// Orchestrated chat result.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratedChat {
    /// Formatted text (or the error message).
    pub response: String,
    /// Overall outcome.
    pub status: ResponseStatus,
    /// The user's query.
    pub query: String,
    /// Persona that answered.
    pub persona: Persona,
    /// Always [`FRAMEWORK`].
    pub framework: &'static str,
    /// Whether any document contributed context.
    pub context_found: bool,
    /// Documents that contributed context.
    pub context_documents: usize,
}

/// Orchestrated search result.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratedSearch {
    /// Formatted listing (or the error message).
    pub response: String,
    /// Overall outcome.
    pub status: ResponseStatus,
    /// The user's query.
    pub query: String,
    /// Always [`FRAMEWORK`].
    pub framework: &'static str,
    /// Documents listed.
    pub results_count: usize,
}

/// Kernel state reported by `/ai_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelStatus {
    /// Orchestrator switched on.
    pub enabled: bool,
    /// Kernel has been built.
    pub initialized: bool,
    /// Chat service registered in the kernel.
    pub chat_completion_available: bool,
    /// Retrieval backend wired into the kernel.
    pub search_available: bool,
    /// Search credentials present.
    pub azure_search_configured: bool,
    /// Completion credentials present.
    pub azure_openai_configured: bool,
    /// Loaded plugin names.
    pub plugins_loaded: Vec<String>,
}

/// The orchestrated pipeline service.
pub struct Orchestrator {
    enabled: bool,
    provider: Option<Arc<dyn LlmProvider>>,
    search: Option<Arc<dyn DocumentSearch>>,
    params: GenerationParams,
    rag_debug: bool,
    kernel: OnceCell<Kernel>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider.as_ref().map(|p| p.model_id()))
            .field("search", &self.search.is_some())
            .field("initialized", &self.kernel.initialized())
            .finish()
    }
}

impl Orchestrator {
    /// Create an uninitialized orchestrator.
    pub fn new(
        enabled: bool,
        provider: Option<Arc<dyn LlmProvider>>,
        search: Option<Arc<dyn DocumentSearch>>,
        params: GenerationParams,
        rag_debug: bool,
    ) -> Self {
        Self {
            enabled,
            provider,
            search,
            params,
            rag_debug,
            kernel: OnceCell::new(),
        }
    }

    /// Whether the orchestrator is switched on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the kernel has been built.
    pub fn is_initialized(&self) -> bool {
        self.kernel.initialized()
    }

    /// Whether the kernel can be built with the current configuration.
    pub fn can_initialize(&self) -> bool {
        self.enabled && self.provider.is_some()
    }

    fn build_kernel(&self) -> Result<Kernel, OrchestratorError> {
        let provider = self.provider.clone().ok_or_else(|| {
            OrchestratorError::Init("Azure OpenAI endpoint or key not configured".to_owned())
        })?;

        let mut kernel = Kernel::new();
        kernel.add_service(CHAT_SERVICE_ID, provider);
        for persona in [Persona::Analyst, Persona::Ceo] {
            kernel.add_function(PERSONAS_PLUGIN, Arc::new(PersonaFunction::new(persona)));
        }
        kernel.add_function(
            RAG_PLUGIN,
            Arc::new(SearchDocumentsFunction::new(self.search.clone())),
        );

        tracing::info!(
            plugins = ?kernel.plugin_names(),
            search = self.search.is_some(),
            "orchestrator kernel initialized"
        );
        Ok(kernel)
    }

    /// The kernel, built on first call.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Disabled`] when switched off,
    /// [`OrchestratorError::Init`] when the kernel cannot be built.
    pub async fn kernel(&self) -> Result<&Kernel, OrchestratorError> {
        if !self.enabled {
            return Err(OrchestratorError::Disabled);
        }
        self.kernel
            .get_or_try_init(|| async { self.build_kernel() })
            .await
    }

    /// Answer a query in character through the kernel.
    ///
    /// # Errors
    ///
    /// Only when the kernel is unavailable; backend failures are reported
    /// inside the result.
    pub async fn process_chat(
        &self,
        query: &str,
        persona: Persona,
    ) -> Result<OrchestratedChat, OrchestratorError> {
        let kernel = self.kernel().await?;
        tracing::info!(%persona, query_len = query.len(), "processing orchestrated chat query");

        let args = KernelArguments::default()
            .with("query", query)
            .with("top", plugins::MAX_PLUGIN_DOCUMENTS);
        let documents = match kernel.invoke(RAG_PLUGIN, SEARCH_FUNCTION, &args).await {
            Ok(FunctionValue::Documents(docs)) => docs,
            Ok(FunctionValue::Text(_)) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "retrieval function failed");
                Vec::new()
            }
        };

        let system = match kernel
            .invoke(
                PERSONAS_PLUGIN,
                PersonaFunction::function_name(persona),
                &KernelArguments::default(),
            )
            .await
        {
            Ok(FunctionValue::Text(text)) => text,
            Ok(FunctionValue::Documents(_)) => FALLBACK_SYSTEM_MESSAGE.to_owned(),
            Err(e) => {
                tracing::warn!(error = %e, "persona function failed");
                FALLBACK_SYSTEM_MESSAGE.to_owned()
            }
        };

        let context = ContextBlock::from_texts(documents);
        let messages = build_messages_with_system(&system, query, &context, Variant::Orchestrated);

        let service = kernel.service(CHAT_SERVICE_ID).ok();
        let chat_result = complete_chat(service.as_deref(), messages, self.params).await;
        let response = format_chat_response(
            persona,
            &chat_result,
            context.count(),
            Variant::Orchestrated,
            self.rag_debug,
        );

        Ok(OrchestratedChat {
            response,
            status: ResponseStatus::from_success(chat_result.is_success()),
            query: query.to_owned(),
            persona,
            framework: FRAMEWORK,
            context_found: !context.is_empty(),
            context_documents: context.count(),
        })
    }

    /// List retrieved document excerpts through the kernel.
    ///
    /// # Errors
    ///
    /// Only when the kernel is unavailable.
    pub async fn process_search(&self, query: &str) -> Result<OrchestratedSearch, OrchestratorError> {
        let kernel = self.kernel().await?;
        tracing::info!(query_len = query.len(), "processing orchestrated search query");

        if self.search.is_none() {
            return Ok(OrchestratedSearch {
                response: "Search service not available - Azure AI Search not configured"
                    .to_owned(),
                status: ResponseStatus::Error,
                query: query.to_owned(),
                framework: FRAMEWORK,
                results_count: 0,
            });
        }

        let args = KernelArguments::default()
            .with("query", query)
            .with("top", ORCHESTRATED_SEARCH_TOP);
        let documents = match kernel.invoke(RAG_PLUGIN, SEARCH_FUNCTION, &args).await {
            Ok(FunctionValue::Documents(docs)) => docs,
            Ok(FunctionValue::Text(_)) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "retrieval function failed");
                Vec::new()
            }
        };

        Ok(OrchestratedSearch {
            response: format_orchestrated_search(query, &documents),
            status: ResponseStatus::Success,
            query: query.to_owned(),
            framework: FRAMEWORK,
            results_count: documents.len(),
        })
    }

    /// Snapshot of the kernel state. Never triggers initialization.
    pub fn status(&self) -> KernelStatus {
        let kernel = self.kernel.get();
        KernelStatus {
            enabled: self.enabled,
            initialized: kernel.is_some(),
            chat_completion_available: kernel.is_some_and(|k| k.has_service(CHAT_SERVICE_ID)),
            search_available: kernel.is_some() && self.search.is_some(),
            azure_search_configured: self.search.is_some(),
            azure_openai_configured: self.provider.is_some(),
            plugins_loaded: kernel.map(Kernel::plugin_names).unwrap_or_default(),
        }
    }
}
