//! HTTP surface: axum router, shared state and the server loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::auth::{IdentityClient, REDIRECT_PATH};
use crate::config::AppConfig;
use crate::orchestrator::Orchestrator;
use crate::providers::azure_openai::AzureOpenAiProvider;
use crate::providers::LlmProvider;
use crate::rag::completion::GenerationParams;
use crate::rag::pipeline::RagPipeline;
use crate::search::azure::AzureSearchClient;
use crate::search::DocumentSearch;

pub mod handlers;
pub mod pages;
pub mod session;

use pages::Pages;
use session::SessionStore;

/// Interval between expired-session sweeps.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration.
    pub config: Arc<AppConfig>,
    /// Search backend, when configured.
    pub search: Option<Arc<dyn DocumentSearch>>,
    /// Direct RAG pipeline.
    pub pipeline: Arc<RagPipeline>,
    /// Orchestrated RAG pipeline.
    pub orchestrator: Arc<Orchestrator>,
    /// Browser sessions.
    pub sessions: Arc<SessionStore>,
    /// HTML pages.
    pub pages: Arc<Pages>,
    /// Identity provider client.
    pub identity: Arc<IdentityClient>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build state with real backends from configuration.
    ///
    /// Missing AI credentials leave the corresponding backend unset; they
    /// never fail startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the page templates fail to register or the
    /// session key is rejected.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let search: Option<Arc<dyn DocumentSearch>> =
            match AzureSearchClient::from_config(&config.search) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    warn!(error = %e, "document search disabled");
                    None
                }
            };
        let provider: Option<Arc<dyn LlmProvider>> =
            match AzureOpenAiProvider::from_config(&config.completion) {
                Ok(provider) => Some(Arc::new(provider)),
                Err(e) => {
                    warn!(error = %e, "chat completion disabled");
                    None
                }
            };
        if !config.identity.is_configured() {
            warn!("identity provider not configured; sign-in will fail");
        }
        let identity = IdentityClient::new(&config.identity, &config.public_base_url());
        Self::new(config, search, provider, identity)
    }

    /// Build state from explicit parts (tests inject fakes here).
    ///
    /// # Errors
    ///
    /// Returns an error if the page templates fail to register.
    pub fn new(
        config: AppConfig,
        search: Option<Arc<dyn DocumentSearch>>,
        provider: Option<Arc<dyn LlmProvider>>,
        identity: IdentityClient,
    ) -> anyhow::Result<Self> {
        let params = GenerationParams::from(&config.completion);
        let rag_debug = config.rag_debug();

        let pipeline = RagPipeline::new(search.clone(), provider.clone(), params, rag_debug);
        let orchestrator = Orchestrator::new(
            config.orchestrator.enabled,
            provider,
            search.clone(),
            params,
            rag_debug,
        );
        let secure = config.public_base_url().starts_with("https://");
        let sessions = SessionStore::new(
            &config.server.secret_key,
            config.server.session_ttl_secs,
            secure,
        )
        .context("failed to create session store")?;
        let pages = Pages::new(&config.server.company_url)?;

        Ok(Self {
            config: Arc::new(config),
            search,
            pipeline: Arc::new(pipeline),
            orchestrator: Arc::new(orchestrator),
            sessions: Arc::new(sessions),
            pages: Arc::new(pages),
            identity: Arc::new(identity),
        })
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/login", get(handlers::login))
        .route(REDIRECT_PATH, get(handlers::authorized))
        .route("/logout", get(handlers::logout))
        .route("/process_prompt", post(handlers::process_prompt))
        .route("/process_chat", post(handlers::process_chat))
        .route("/process_search", post(handlers::process_search))
        .route("/process_sk_chat", post(handlers::process_sk_chat))
        .route("/process_sk_search", post(handlers::process_sk_search))
        .route("/ai_status", get(handlers::ai_status))
        .route("/test", get(handlers::test_status))
        .route(
            "/test_rag",
            get(handlers::test_rag_info).post(handlers::test_rag),
        )
        .route("/auth_error_test", get(handlers::auth_error_test))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind a listener on `host:port`. `host` may be a name such as
/// `localhost` or an IP literal.
///
/// # Errors
///
/// Returns an error if the host does not resolve or the port is taken.
pub async fn bind(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))
}

/// Serve on `listener` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve(state: AppState, listener: TcpListener) -> anyhow::Result<()> {
    let addr = listener
        .local_addr()
        .context("failed to read listener address")?;

    let sessions = Arc::clone(&state.sessions);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sessions.purge_expired().await;
            if removed > 0 {
                debug!(removed, "purged expired sessions");
            }
        }
    });

    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
