//! Response formatting for chat and search-only results.

use serde_json::Value;

use crate::search::{SearchOutcome, SearchResult};

use super::completion::ChatResult;
use super::context::{truncate_chars, ELLIPSIS};
use super::persona::Persona;
use super::Variant;

/// Characters of content shown per search hit.
pub const DISPLAY_CHARS: usize = 200;

/// Documents listed in a search-only response.
pub const DISPLAY_LIMIT: usize = 5;

/// Format a chat result for display.
///
/// Errors are returned verbatim. Successful text gets the persona header,
/// a provenance line and, in RAG debug mode, a token usage line.
pub fn format_chat_response(
    persona: Persona,
    result: &ChatResult,
    context_documents: usize,
    variant: Variant,
    rag_debug: bool,
) -> String {
    let (content, usage) = match result {
        ChatResult::Error { error } => return error.clone(),
        ChatResult::Success { content, usage } => (content, usage),
    };

    let mut text = format!(
        "{} Response ({}):\n\n{content}",
        persona.label(),
        variant.header_suffix()
    );

    if context_documents > 0 {
        text.push_str(&format!(
            "\n\n📚 Based on {context_documents} relevant document(s) from the knowledge base."
        ));
    } else {
        text.push_str(
            "\n\n💭 No specific documents found in knowledge base for this query - providing general response.",
        );
    }

    if rag_debug {
        text.push_str(&format!(
            "\n\n[Tokens used: {} (prompt: {}, completion: {})]",
            usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
        ));
    }

    text
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn first_present(doc: &SearchResult, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| doc.fields.get(*key))
        .map(display_value)
}

fn clip(text: &str) -> String {
    let (kept, truncated) = truncate_chars(text, DISPLAY_CHARS);
    if truncated {
        format!("{kept}{ELLIPSIS}")
    } else {
        kept
    }
}

/// Format a search outcome for search-only mode.
///
/// Lists up to five hits with title, score and a 200-character excerpt.
pub fn format_search_response(query: &str, outcome: &SearchOutcome) -> String {
    let (documents, total_count) = match outcome {
        SearchOutcome::Error { error, .. } => return error.clone(),
        SearchOutcome::Success {
            documents,
            total_count,
            ..
        } => (documents, total_count),
    };

    if documents.is_empty() {
        return format!("No documents found for query: '{query}'");
    }

    let mut text = format!("Found {total_count} results for: '{query}'\n\n");
    for (idx, doc) in documents.iter().take(DISPLAY_LIMIT).enumerate() {
        let position = idx.saturating_add(1);
        let title = first_present(doc, &["title", "Title"])
            .unwrap_or_else(|| format!("Document {position}"));
        let content = first_present(doc, &["content", "Content", "text"])
            .unwrap_or_else(|| "No content available".to_owned());
        text.push_str(&format!(
            "{position}. {title} (Score: {:.2})\n   {}\n\n",
            doc.score,
            clip(&content)
        ));
    }
    text
}

/// Format the orchestrated search listing (content excerpts only).
pub fn format_orchestrated_search(query: &str, documents: &[String]) -> String {
    if documents.is_empty() {
        return format!("No documents found for query: '{query}'");
    }

    let mut text = format!(
        "Found {} results for: '{query}' ({})\n\n",
        documents.len(),
        Variant::Orchestrated.header_suffix()
    );
    for (idx, content) in documents.iter().enumerate() {
        text.push_str(&format!("{}. {}\n\n", idx.saturating_add(1), clip(content)));
    }
    text
}
