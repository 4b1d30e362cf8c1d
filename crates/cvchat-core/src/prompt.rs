//! Prompt templates for answering and for rewriting follow-up questions.

use std::fmt::Write as _;

use cvchat_llm::{Message, Role};
use cvchat_memory::ScoredChunk;

/// Render retrieved chunks as a numbered context block.
#[must_use]
pub fn build_context(hits: &[ScoredChunk<'_>]) -> String {
    let mut context = String::new();
    for (i, hit) in hits.iter().enumerate() {
        let _ = write!(
            context,
            "[{}] (chunk {})\n{}\n\n---\n\n",
            i + 1,
            hit.chunk.chunk_index,
            hit.chunk.content.trim()
        );
    }
    context
}

/// Prompt sent as the user turn when answering `question`.
#[must_use]
pub fn answer_prompt(question: &str, hits: &[ScoredChunk<'_>]) -> String {
    let context = if hits.is_empty() {
        "(no matching excerpts)\n".to_owned()
    } else {
        build_context(hits)
    };
    format!(
        "Use the following excerpts from the uploaded résumés to answer the question at the end. \
If the excerpts do not contain the answer, say that you don't know instead of making one up.

EXCERPTS:
{context}
QUESTION: {question}

Answer:"
    )
}

/// Prompt asking the model to turn a follow-up into a self-contained question.
#[must_use]
pub fn condense_prompt(history: &[Message], question: &str) -> String {
    let mut transcript = String::new();
    for message in history {
        let speaker = match message.role {
            Role::User => "Human",
            Role::Assistant => "Assistant",
            Role::System => continue,
        };
        let _ = writeln!(transcript, "{speaker}: {}", message.content);
    }
    format!(
        "Given the conversation below and a follow-up question, rephrase the follow-up \
so it can be understood without the conversation. Reply with the rephrased question only.

Conversation:
{transcript}
Follow-up question: {question}

Standalone question:"
    )
}
