//! ragcall: earnings-call rehearsal web app.
//!
//! Signed-in users chat with a financial-analyst or CEO persona whose
//! answers are grounded in documents retrieved from an Azure AI Search index
//! and generated by Azure OpenAI. A second, plugin-based pipeline serves the
//! same flow through a small orchestration kernel.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod logging;
pub mod providers;
pub mod search;

pub mod orchestrator;
pub mod rag;

pub mod status;
pub mod web;
