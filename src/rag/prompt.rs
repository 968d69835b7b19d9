//! Prompt construction: persona system message plus grounded user message.

use crate::providers::Message;

use super::context::ContextBlock;
use super::persona::Persona;
use super::Variant;

/// Build the grounded user message for a query.
///
/// A non-empty context embeds the snippets and asks the model to answer
/// from them; an empty context asks for a general response.
pub fn user_prompt(variant: Variant, query: &str, context: &ContextBlock) -> String {
    if context.is_empty() {
        return match variant {
            Variant::Direct => format!(
                "The user asked: {query}\n\n\
                 I couldn't find specific relevant documents in our knowledge base for this query. \
                 Please provide a helpful general response."
            ),
            Variant::Orchestrated => format!(
                "The user asked: {query}\n\n\
                 No specific relevant documents were found in the knowledge base for this query. \
                 Please provide a helpful general response while staying in character according to your persona."
            ),
        };
    }

    let documents = context.joined();
    match variant {
        Variant::Direct => format!(
            "Based on the following relevant documents from our knowledge base, please answer the user's question:\n\n\
             CONTEXT DOCUMENTS:\n{documents}\n\n\
             USER QUESTION: {query}\n\n\
             Please provide a helpful answer based on the context above. \
             If the context doesn't contain relevant information, please say so and provide a general response."
        ),
        Variant::Orchestrated => format!(
            "Based on the following relevant documents from our knowledge base, please respond as the specified persona:\n\n\
             CONTEXT DOCUMENTS:\n{documents}\n\n\
             USER QUESTION: {query}\n\n\
             Please provide a response based on the context above and stay in character according to your persona."
        ),
    }
}

/// The two messages sent to the completion service.
pub fn build_messages(
    persona: Persona,
    query: &str,
    context: &ContextBlock,
    variant: Variant,
) -> Vec<Message> {
    build_messages_with_system(persona.system_message(), query, context, variant)
}

/// Same as [`build_messages`] with an explicit system message.
pub fn build_messages_with_system(
    system: &str,
    query: &str,
    context: &ContextBlock,
    variant: Variant,
) -> Vec<Message> {
    vec![
        Message::system(system),
        Message::user(user_prompt(variant, query, context)),
    ]
}
