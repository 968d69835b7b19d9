//! Retrieval-augmented generation.
//!
//! The pipeline is strictly sequential:
//! search → [`context`] → [`prompt`] → [`completion`] → [`format`].
//! [`pipeline::RagPipeline`] wires the steps for the direct variant; the
//! orchestrated variant in [`crate::orchestrator`] reuses the same steps
//! through kernel plugins.

use serde::Serialize;

pub mod completion;
pub mod context;
pub mod format;
pub mod persona;
pub mod pipeline;
pub mod prompt;

/// Which pipeline variant produced a prompt or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Search and completion clients called directly.
    Direct,
    /// Steps routed through the plugin kernel.
    Orchestrated,
}

impl Variant {
    /// Parenthesised part of the response header.
    pub fn header_suffix(self) -> &'static str {
        match self {
            Self::Direct => "with knowledge base context",
            Self::Orchestrated => "powered by Semantic Kernel",
        }
    }
}

/// Top-level status of a response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The request produced a result.
    Success,
    /// The request failed; `response` carries the message.
    Error,
}

impl ResponseStatus {
    /// Map a success flag.
    pub fn from_success(ok: bool) -> Self {
        if ok {
            Self::Success
        } else {
            Self::Error
        }
    }
}
