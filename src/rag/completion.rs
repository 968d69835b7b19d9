//! Completion invocation: one call, converted into a [`ChatResult`].

use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::providers::{CompletionRequest, LlmProvider, Message, UsageStats};

/// Sampling parameters for a completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

impl From<&CompletionConfig> for GenerationParams {
    fn from(config: &CompletionConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// Result of a completion call as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChatResult {
    /// The model produced text.
    Success {
        /// Generated text.
        content: String,
        /// Token usage.
        usage: UsageStats,
    },
    /// No text was produced.
    Error {
        /// Human-readable error.
        error: String,
    },
}

impl ChatResult {
    /// Whether the call produced text.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Send `messages` to the provider and convert the outcome.
///
/// A missing provider means credentials were never configured; no network
/// call is made. Single attempt, no retries.
pub async fn complete_chat(
    provider: Option<&dyn LlmProvider>,
    messages: Vec<Message>,
    params: GenerationParams,
) -> ChatResult {
    let Some(provider) = provider else {
        tracing::warn!("completion requested but no client is configured");
        return ChatResult::Error {
            error: "Failed to create OpenAI client".to_owned(),
        };
    };

    tracing::debug!(
        model = provider.model_id(),
        messages = messages.len(),
        max_tokens = params.max_tokens,
        temperature = params.temperature,
        "calling chat completion"
    );

    let request = CompletionRequest {
        messages,
        max_tokens: params.max_tokens,
        temperature: params.temperature,
    };

    match provider.complete(request).await {
        Ok(response) => match response.content {
            Some(content) if !content.is_empty() => {
                tracing::debug!(
                    chars = content.chars().count(),
                    total_tokens = response.usage.total_tokens,
                    "chat completion succeeded"
                );
                ChatResult::Success {
                    content,
                    usage: response.usage,
                }
            }
            _ => {
                tracing::warn!(model = %response.model, "chat completion returned no content");
                ChatResult::Error {
                    error: "OpenAI returned empty response".to_owned(),
                }
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "chat completion failed");
            ChatResult::Error {
                error: format!("Chat completion error: {e}"),
            }
        }
    }
}
