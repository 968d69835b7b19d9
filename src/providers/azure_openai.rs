//! Azure OpenAI provider implementation using the deployment-scoped
//! `/openai/deployments/{deployment}/chat/completions` API.

use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;

use super::{
    check_http_response, CompletionRequest, CompletionResponse, LlmProvider, ProviderError,
    UsageStats,
};

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Azure OpenAI chat completions request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct AzureChatRequest {
    /// Conversation messages.
    pub messages: Vec<AzureMessage>,
    /// Maximum completion tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// A message in chat completions format.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct AzureMessage {
    /// Role (`system`, `user`, `assistant`).
    pub role: String,
    /// Text content.
    pub content: String,
}

/// Azure OpenAI chat completions response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AzureChatResponse {
    /// Response choices.
    #[serde(default)]
    pub choices: Vec<AzureChoice>,
    /// Model that served the response.
    #[serde(default)]
    pub model: String,
    /// Token usage.
    pub usage: Option<AzureUsage>,
}

/// A response choice.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AzureChoice {
    /// Assistant message for this choice.
    pub message: Option<AzureResponseMessage>,
}

/// Assistant message from the service.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AzureResponseMessage {
    /// Optional text content (absent when filtered).
    pub content: Option<String>,
}

/// Token usage statistics.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AzureUsage {
    /// Prompt token count.
    pub prompt_tokens: Option<u32>,
    /// Completion token count.
    pub completion_tokens: Option<u32>,
    /// Total token count.
    pub total_tokens: Option<u32>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Azure OpenAI chat completions provider bound to one deployment.
#[derive(Clone)]
pub struct AzureOpenAiProvider {
    url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AzureOpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAiProvider")
            .field("url", &self.url)
            .field("api_key", &"__REDACTED__")
            .field("model", &self.model)
            .finish()
    }
}

impl AzureOpenAiProvider {
    /// Build a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] when the endpoint or key is
    /// missing. No network call is made.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, ProviderError> {
        if !config.is_configured() {
            return Err(ProviderError::Unavailable(
                "Azure OpenAI endpoint or key not configured".to_owned(),
            ));
        }
        Ok(Self {
            url: completions_url(&config.endpoint, &config.deployment, &config.api_version),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            client: reqwest::Client::new(),
        })
    }

    /// Full request URL including the `api-version` query.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Build the deployment-scoped chat completions URL.
pub fn completions_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim().trim_end_matches('/'),
        deployment,
        api_version
    )
}

// ---------------------------------------------------------------------------
// Request / Response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build an Azure chat request from a completion request.
#[doc(hidden)]
pub fn build_request(request: &CompletionRequest) -> AzureChatRequest {
    AzureChatRequest {
        messages: request
            .messages
            .iter()
            .map(|m| AzureMessage {
                role: m.role.as_str().to_owned(),
                content: m.content.clone(),
            })
            .collect(),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

/// Parse a chat completions response.
///
/// A response without choices or without message content parses to
/// `content: None`; the caller decides how to report it.
///
/// # Errors
///
/// Returns `ProviderError::Parse` if the body is not valid JSON of the
/// expected shape.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<CompletionResponse, ProviderError> {
    let resp: AzureChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content);

    let usage = resp
        .usage
        .map(|u| {
            let prompt_tokens = u.prompt_tokens.unwrap_or(0);
            let completion_tokens = u.completion_tokens.unwrap_or(0);
            UsageStats {
                prompt_tokens,
                completion_tokens,
                total_tokens: u
                    .total_tokens
                    .unwrap_or_else(|| prompt_tokens.saturating_add(completion_tokens)),
            }
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        content,
        usage,
        model: resp.model,
    })
}

// ---------------------------------------------------------------------------
// Trait impl
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl LlmProvider for AzureOpenAiProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let api_request = build_request(&request);

        let response = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .header("api-key", &self.api_key)
            .json(&api_request)
            .send()
            .await?;

        let payload = check_http_response(response).await?;
        parse_response(&payload)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
