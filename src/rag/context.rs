//! Context assembly: turn search results into bounded, labeled snippets.

use serde_json::Value;

use crate::search::{search_documents, DocumentSearch, SearchOutcome, SearchResult};

/// Candidate content fields, checked in order.
pub const CONTENT_FIELDS: [&str; 6] = [
    "content",
    "Content",
    "text",
    "Text",
    "description",
    "Description",
];

/// Maximum characters kept from a single document.
pub const MAX_SNIPPET_CHARS: usize = 4000;

/// Marker appended to a truncated snippet.
pub const ELLIPSIS: &str = "...";

/// Results requested for chat context.
pub const CHAT_TOP: usize = 3;

/// Results requested for search-only display.
pub const SEARCH_TOP: usize = 5;

/// Ordered snippets injected into the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextBlock {
    snippets: Vec<String>,
}

impl ContextBlock {
    /// Label already-extracted document texts in order, starting at 1.
    pub fn from_texts(texts: impl IntoIterator<Item = String>) -> Self {
        let snippets = texts
            .into_iter()
            .enumerate()
            .map(|(idx, text)| format!("Document {}:\n{text}", idx.saturating_add(1)))
            .collect();
        Self { snippets }
    }

    /// Labeled snippets, each `"Document i:\n<text>"`.
    pub fn snippets(&self) -> &[String] {
        &self.snippets
    }

    /// Number of documents included.
    pub fn count(&self) -> usize {
        self.snippets.len()
    }

    /// Whether no document contributed content.
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Snippets separated by a blank line.
    pub fn joined(&self) -> String {
        self.snippets.join("\n\n")
    }
}

/// Text of a field value if it counts as usable content.
///
/// Strings must be non-empty after trimming; other non-empty values are
/// rendered as JSON.
fn usable_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// Pick the content of a result from the first usable candidate field.
///
/// Falls back to a JSON rendering of the whole record. Returns `None`
/// only when the record cannot be rendered at all.
pub fn extract_content(result: &SearchResult, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|field| result.fields.get(*field).and_then(usable_text))
        .or_else(|| serde_json::to_string(result).ok())
        .filter(|text| !text.trim().is_empty())
}

/// Keep at most `max` characters. Returns the kept text and whether
/// anything was cut.
pub fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => (text[..byte_idx].to_owned(), true),
        None => (text.to_owned(), false),
    }
}

/// Build the context block from a search outcome.
///
/// Labels use the 1-based position of each result in the outcome, so a
/// skipped record leaves a gap in the numbering.
pub fn assemble(outcome: &SearchOutcome) -> ContextBlock {
    let documents = match outcome {
        SearchOutcome::Success { documents, .. } => documents,
        SearchOutcome::Error { error, .. } => {
            tracing::warn!(error = %error, "search failed; continuing without context");
            return ContextBlock::default();
        }
    };

    let mut snippets = Vec::with_capacity(documents.len());
    for (idx, result) in documents.iter().enumerate() {
        let position = idx.saturating_add(1);
        let Some(content) = extract_content(result, &CONTENT_FIELDS) else {
            tracing::debug!(position, "document has no usable content");
            continue;
        };
        let (kept, truncated) = truncate_chars(&content, MAX_SNIPPET_CHARS);
        let text = if truncated {
            format!("{kept}{ELLIPSIS}")
        } else {
            kept
        };
        tracing::debug!(
            position,
            chars = content.chars().count(),
            truncated,
            "added document to context"
        );
        snippets.push(format!("Document {position}:\n{text}"));
    }

    ContextBlock { snippets }
}

/// Search for `query` and assemble the chat context.
///
/// Returns the context together with the raw outcome. Search failures
/// yield an empty context and are only logged.
pub async fn assemble_context(
    search: Option<&dyn DocumentSearch>,
    query: &str,
    top: usize,
) -> (ContextBlock, SearchOutcome) {
    let outcome = search_documents(search, query, top).await;
    let context = assemble(&outcome);
    (context, outcome)
}
