//! Prompt template rendering.
//!
//! A template holds two placeholders, `{context}` and `{question}`. Rendering
//! is a single left-to-right pass, so placeholder-looking text inside the
//! document or the question is copied verbatim and never expanded.

use crate::models::ScoredFragment;

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const QUESTION_PLACEHOLDER: &str = "{question}";

pub const DEFAULT_TEMPLATE: &str = "Answer the question based only on the following context:
{context}

Question: {question}
";

/// Separator between fragment texts in the rendered context.
const CONTEXT_SEPARATOR: &str = "\n\n";

/// Joins fragment texts in retrieval-rank order.
pub fn build_context(fragments: &[ScoredFragment]) -> String {
    fragments
        .iter()
        .map(|f| f.fragment.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Substitutes `context` and `question` into `template`.
pub fn render(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(QUESTION_PLACEHOLDER) {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Builds the full prompt for a question from its retrieved fragments.
pub fn build_prompt(template: &str, fragments: &[ScoredFragment], question: &str) -> String {
    render(template, &build_context(fragments), question)
}
