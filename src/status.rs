//! Aggregated backend availability for `/ai_status` and the `status`
//! subcommand.

use serde::Serialize;

use crate::config::AppConfig;
use crate::orchestrator::Orchestrator;
use crate::search::DocumentSearch;

/// Overall readiness across the three backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallStatus {
    /// Every backend is available.
    Ready,
    /// Some, but not all, backends are available.
    Partial,
    /// No backend is available.
    Error,
}

/// Combine per-backend availability.
pub fn overall_status(search: bool, completion: bool, orchestrator: bool) -> OverallStatus {
    match [search, completion, orchestrator].iter().filter(|ok| **ok).count() {
        0 => OverallStatus::Error,
        3 => OverallStatus::Ready,
        _ => OverallStatus::Partial,
    }
}

/// Search backend status.
#[derive(Debug, Clone, Serialize)]
pub struct SearchStatus {
    /// Backend answered a document count.
    pub available: bool,
    /// `Ready`, `Configuration Error` or `Error: …`.
    pub status: String,
    /// Configured endpoint.
    pub endpoint: Option<String>,
    /// Index name.
    pub index: String,
    /// Documents in the index (0 when unavailable).
    pub document_count: u64,
    /// Same as `status`.
    pub service_status: String,
}

/// Completion backend status.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionStatus {
    /// Credentials present.
    pub available: bool,
    /// `Ready` or `Configuration Error`.
    pub status: String,
    /// Configured endpoint.
    pub endpoint: Option<String>,
    /// Model name.
    pub model: String,
    /// Deployment name.
    pub deployment: String,
    /// API version.
    pub api_version: String,
    /// Same as `status`.
    pub service_status: String,
}

/// Orchestrator status.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    /// Enabled and able to build its kernel.
    pub available: bool,
    /// `Ready`, `Disabled` or `Not Configured`.
    pub status: String,
    /// `Ready` once the kernel is built, else `Initialization Required`
    /// (or the same value as `status` when unavailable).
    pub service_status: String,
    /// Kernel built.
    pub initialized: bool,
    /// Chat service registered.
    pub chat_completion_available: bool,
    /// Retrieval wired into the kernel.
    pub search_available: bool,
    /// Search credentials present.
    pub azure_search_configured: bool,
    /// Completion credentials present.
    pub azure_openai_configured: bool,
    /// Loaded plugin names.
    pub plugins_loaded: Vec<String>,
}

/// Full `/ai_status` payload.
#[derive(Debug, Clone, Serialize)]
pub struct AiStatus {
    /// Rolled-up readiness.
    pub overall_status: OverallStatus,
    /// Search backend.
    pub azure_search: SearchStatus,
    /// Completion backend.
    pub azure_openai: CompletionStatus,
    /// Orchestrated variant.
    pub semantic_kernel: OrchestratorStatus,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

async fn search_status(config: &AppConfig, search: Option<&dyn DocumentSearch>) -> SearchStatus {
    let (available, status, document_count) = match search {
        None => (false, "Configuration Error".to_owned(), 0),
        Some(search) => match search.document_count().await {
            Ok(count) => (true, "Ready".to_owned(), count),
            Err(e) => {
                tracing::warn!(error = %e, "search status probe failed");
                (false, format!("Error: {e}"), 0)
            }
        },
    };
    SearchStatus {
        available,
        service_status: status.clone(),
        status,
        endpoint: non_empty(&config.search.endpoint),
        index: config.search.index.clone(),
        document_count,
    }
}

fn completion_status(config: &AppConfig) -> CompletionStatus {
    let available = config.completion.is_configured();
    let status = if available {
        "Ready"
    } else {
        "Configuration Error"
    };
    CompletionStatus {
        available,
        status: status.to_owned(),
        endpoint: non_empty(&config.completion.endpoint),
        model: config.completion.model.clone(),
        deployment: config.completion.deployment.clone(),
        api_version: config.completion.api_version.clone(),
        service_status: status.to_owned(),
    }
}

fn orchestrator_status(orchestrator: &Orchestrator) -> OrchestratorStatus {
    let kernel = orchestrator.status();
    let available = orchestrator.can_initialize();
    let status = if !kernel.enabled {
        "Disabled"
    } else if available {
        "Ready"
    } else {
        "Not Configured"
    };
    let service_status = match (available, kernel.initialized) {
        (true, true) => "Ready",
        (true, false) => "Initialization Required",
        (false, _) => status,
    };
    OrchestratorStatus {
        available,
        status: status.to_owned(),
        service_status: service_status.to_owned(),
        initialized: kernel.initialized,
        chat_completion_available: kernel.chat_completion_available,
        search_available: kernel.search_available,
        azure_search_configured: kernel.azure_search_configured,
        azure_openai_configured: kernel.azure_openai_configured,
        plugins_loaded: kernel.plugins_loaded,
    }
}

/// Probe every backend and roll up the result.
///
/// Only the search backend is contacted (document count); completion
/// availability is judged from configuration.
pub async fn collect(
    config: &AppConfig,
    search: Option<&dyn DocumentSearch>,
    orchestrator: &Orchestrator,
) -> AiStatus {
    let azure_search = search_status(config, search).await;
    let azure_openai = completion_status(config);
    let semantic_kernel = orchestrator_status(orchestrator);
    AiStatus {
        overall_status: overall_status(
            azure_search.available,
            azure_openai.available,
            semantic_kernel.available,
        ),
        azure_search,
        azure_openai,
        semantic_kernel,
    }
}
