//! Kernel plugins: persona system messages and document retrieval.

use std::sync::Arc;

use async_trait::async_trait;

use crate::rag::context::{extract_content, truncate_chars, MAX_SNIPPET_CHARS};
use crate::rag::persona::Persona;
use crate::search::{DocumentSearch, SearchQuery};

use super::kernel::{FunctionValue, KernelArguments, KernelError, KernelFunction};

/// Plugin holding the persona functions.
pub const PERSONAS_PLUGIN: &str = "personas";

/// Plugin holding the retrieval function.
pub const RAG_PLUGIN: &str = "rag";

/// Retrieval function name.
pub const SEARCH_FUNCTION: &str = "search_documents";

/// Content fields considered by the retrieval plugin.
pub const PLUGIN_CONTENT_FIELDS: [&str; 4] = ["content", "Content", "text", "Text"];

/// Most documents the retrieval plugin ever returns.
pub const MAX_PLUGIN_DOCUMENTS: usize = 3;

/// Returns the system message of one persona.
#[derive(Debug, Clone, Copy)]
pub struct PersonaFunction {
    persona: Persona,
}

impl PersonaFunction {
    /// Function for `persona`.
    pub fn new(persona: Persona) -> Self {
        Self { persona }
    }

    /// Registered name for a persona's function.
    pub fn function_name(persona: Persona) -> &'static str {
        match persona {
            Persona::Analyst => "get_analyst_persona",
            Persona::Ceo => "get_ceo_persona",
        }
    }
}

#[async_trait]
impl KernelFunction for PersonaFunction {
    fn name(&self) -> &str {
        Self::function_name(self.persona)
    }

    fn description(&self) -> &str {
        match self.persona {
            Persona::Analyst => "Get system message for Financial Analyst persona",
            Persona::Ceo => "Get system message for CEO persona",
        }
    }

    async fn invoke(&self, _args: &KernelArguments) -> Result<FunctionValue, KernelError> {
        Ok(FunctionValue::Text(self.persona.system_message().to_owned()))
    }
}

/// Searches the index and returns up to three bounded document contents.
///
/// Search failures and a missing backend both yield an empty list.
pub struct SearchDocumentsFunction {
    search: Option<Arc<dyn DocumentSearch>>,
}

impl SearchDocumentsFunction {
    /// Function over an optional backend.
    pub fn new(search: Option<Arc<dyn DocumentSearch>>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl KernelFunction for SearchDocumentsFunction {
    fn name(&self) -> &str {
        SEARCH_FUNCTION
    }

    fn description(&self) -> &str {
        "Search Azure AI Search for relevant documents"
    }

    async fn invoke(&self, args: &KernelArguments) -> Result<FunctionValue, KernelError> {
        let query = args
            .get("query")
            .ok_or_else(|| KernelError::InvalidArgument("missing query".to_owned()))?;
        let top = match args.get("top") {
            Some(raw) => raw
                .parse()
                .map_err(|_| KernelError::InvalidArgument(format!("top must be an integer: {raw}")))?,
            None => MAX_PLUGIN_DOCUMENTS,
        };

        let Some(search) = &self.search else {
            return Ok(FunctionValue::Documents(Vec::new()));
        };

        let page = match search.search(&SearchQuery::new(query, top)).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "retrieval plugin search failed");
                return Ok(FunctionValue::Documents(Vec::new()));
            }
        };

        let documents = page
            .documents
            .iter()
            .filter_map(|doc| extract_content(doc, &PLUGIN_CONTENT_FIELDS))
            .map(|content| truncate_chars(&content, MAX_SNIPPET_CHARS).0)
            .take(MAX_PLUGIN_DOCUMENTS)
            .collect();

        Ok(FunctionValue::Documents(documents))
    }
}
