//! Configuration loading.
//!
//! Loads from `./config.toml` (or `$RAGCALL_CONFIG_PATH`), then applies
//! environment variable overrides. Every AI backend setting is optional:
//! missing credentials degrade features to structured error responses and
//! never fail startup.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

// ── Top-level config ────────────────────────────────────────────

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server and session settings.
    pub server: ServerConfig,
    /// OIDC identity provider settings.
    pub identity: IdentityConfig,
    /// Document search backend.
    pub search: SearchConfig,
    /// Chat completion backend.
    pub completion: CompletionConfig,
    /// Orchestrated pipeline variant.
    pub orchestrator: OrchestratorConfig,
    /// Debug switches.
    pub debug: DebugConfig,
}

impl AppConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// `path` overrides the file location; otherwise `$RAGCALL_CONFIG_PATH`
    /// or `./config.toml` is used. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path_with(|key| std::env::var(key).ok()),
        };
        let mut config = Self::load_from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config file {}: {e}",
                path.display()
            )),
        }
    }

    /// Resolve the config path using a custom env resolver.
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("RAGCALL_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function so tests never touch the process environment.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        // Server.
        if let Some(v) = env("HOST") {
            self.server.host = v;
        }
        if let Some(v) = env("PORT") {
            match v.parse() {
                Ok(n) => self.server.port = n,
                Err(_) => warn_invalid("PORT", &v),
            }
        }
        if let Some(v) = env("PUBLIC_BASE_URL") {
            self.server.public_base_url = Some(v);
        }
        if let Some(v) = env("SECRET_KEY") {
            self.server.secret_key = v;
        }
        if let Some(v) = env("COMPANY_URL") {
            self.server.company_url = v;
        }
        if let Some(v) = env("SESSION_TTL_SECS") {
            match v.parse() {
                Ok(n) => self.server.session_ttl_secs = n,
                Err(_) => warn_invalid("SESSION_TTL_SECS", &v),
            }
        }
        if let Some(v) = env("LOGS_DIR") {
            self.server.logs_dir = Some(PathBuf::from(v));
        }

        // Identity provider.
        if let Some(v) = env("AZURE_CLIENT_ID") {
            self.identity.client_id = v;
        }
        if let Some(v) = env("AZURE_CLIENT_SECRET") {
            self.identity.client_secret = v;
        }
        if let Some(v) = env("AZURE_TENANT_ID") {
            self.identity.tenant_id = v;
        }

        // Search.
        if let Some(v) = env("AZURE_SEARCH_ENDPOINT") {
            self.search.endpoint = v;
        }
        if let Some(v) = env("AZURE_SEARCH_KEY") {
            self.search.api_key = v;
        }
        if let Some(v) = env("AZURE_SEARCH_INDEX") {
            self.search.index = v;
        }
        if let Some(v) = env("AZURE_SEARCH_API_VERSION") {
            self.search.api_version = v;
        }

        // Completion.
        if let Some(v) = env("AZURE_OPENAI_ENDPOINT") {
            self.completion.endpoint = v;
        }
        if let Some(v) = env("AZURE_OPENAI_KEY") {
            self.completion.api_key = v;
        }
        if let Some(v) = env("AZURE_OPENAI_MODEL") {
            self.completion.model = v;
        }
        if let Some(v) = env("AZURE_OPENAI_DEPLOYMENT") {
            self.completion.deployment = v;
        }
        if let Some(v) = env("AZURE_OPENAI_API_VERSION") {
            self.completion.api_version = v;
        }
        if let Some(v) = env("AZURE_OPENAI_MAX_TOKENS") {
            match v.parse() {
                Ok(n) => self.completion.max_tokens = n,
                Err(_) => warn_invalid("AZURE_OPENAI_MAX_TOKENS", &v),
            }
        }
        if let Some(v) = env("AZURE_OPENAI_TEMPERATURE") {
            match v.parse() {
                Ok(t) => self.completion.temperature = t,
                Err(_) => warn_invalid("AZURE_OPENAI_TEMPERATURE", &v),
            }
        }

        // Orchestrator.
        if let Some(v) = env("ORCHESTRATOR_ENABLED") {
            self.orchestrator.enabled = parse_flag(&v);
        }

        // Debug.
        if let Some(v) = env("APP_DEBUG") {
            self.debug.enabled = parse_flag(&v);
        }
        if let Some(v) = env("RAG_DEBUG") {
            self.debug.rag = parse_flag(&v);
        }
    }

    /// Whether RAG debug output (token usage lines, verbose logs) is on.
    ///
    /// General debug mode implies RAG debug.
    pub fn rag_debug(&self) -> bool {
        self.debug.enabled || self.debug.rag
    }

    /// Base URL used to build the OAuth redirect URI.
    pub fn public_base_url(&self) -> String {
        self.server
            .public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.server.host, self.server.port))
    }
}

fn warn_invalid(var: &str, value: &str) {
    tracing::warn!(var, value, "ignoring invalid env override");
}

/// Parse a truthy flag the way shell users write them (`true`, `1`, `yes`, `on`).
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

// ── Server config ───────────────────────────────────────────────

/// HTTP server and session settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Externally visible base URL (for the OAuth redirect URI).
    pub public_base_url: Option<String>,
    /// Session cookie signing key.
    pub secret_key: String,
    /// External company link injected into every page.
    pub company_url: String,
    /// Session lifetime in seconds.
    pub session_ttl_secs: u64,
    /// Directory for JSON log files. Console-only logging when unset.
    pub logs_dir: Option<PathBuf>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("public_base_url", &self.public_base_url)
            .field("secret_key", &"__REDACTED__")
            .field("company_url", &self.company_url)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("logs_dir", &self.logs_dir)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            public_base_url: None,
            secret_key: uuid::Uuid::new_v4().to_string(),
            company_url: "https://www.novatech-demo.test/".to_string(),
            session_ttl_secs: 8 * 60 * 60,
            logs_dir: None,
        }
    }
}

// ── Identity config ─────────────────────────────────────────────

/// Azure AD (Entra ID) application registration.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Application (client) ID.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Directory (tenant) ID.
    pub tenant_id: String,
}

impl IdentityConfig {
    /// Authority base URL for the tenant.
    pub fn authority(&self) -> String {
        format!("https://login.microsoftonline.com/{}", self.tenant_id)
    }

    /// Whether enough is configured to start a sign-in flow.
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.tenant_id.trim().is_empty()
    }
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"__REDACTED__")
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

// ── Search config ───────────────────────────────────────────────

/// Azure AI Search settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Service endpoint, e.g. `https://my-search.search.windows.net`.
    pub endpoint: String,
    /// Query or admin key.
    pub api_key: String,
    /// Index name.
    pub index: String,
    /// REST API version.
    pub api_version: String,
}

impl SearchConfig {
    /// Whether endpoint and key are both present.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            index: "novatech-03".to_string(),
            api_version: "2023-11-01".to_string(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"__REDACTED__")
            .field("index", &self.index)
            .field("api_version", &self.api_version)
            .finish()
    }
}

// ── Completion config ───────────────────────────────────────────

/// Azure OpenAI settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Resource endpoint, e.g. `https://my-oai.openai.azure.com`.
    pub endpoint: String,
    /// API key.
    pub api_key: String,
    /// Model name (reported in status only).
    pub model: String,
    /// Deployment name used in the request path.
    pub deployment: String,
    /// REST API version.
    pub api_version: String,
    /// Maximum output tokens per completion.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl CompletionConfig {
    /// Whether endpoint and key are both present.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model: "gpt-35-turbo".to_string(),
            deployment: "gpt-35-turbo".to_string(),
            api_version: "2024-12-01-preview".to_string(),
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"__REDACTED__")
            .field("model", &self.model)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

// ── Orchestrator / debug ────────────────────────────────────────

/// Orchestrated pipeline settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// When false the `sk` routes answer 503.
    pub enabled: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Debug switches.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// General debug mode (verbose logging).
    pub enabled: bool,
    /// RAG debug mode (token usage appended to chat responses).
    pub rag: bool,
}

// ── Tests ───────────────────────────────────────────────────────
