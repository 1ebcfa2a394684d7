//! End-to-end question answering: retrieve, assemble, prompt, generate.

use std::sync::Arc;

use carqa_core::error::Result;
use carqa_core::filter::MetadataFilter;
use carqa_core::traits::Generator;
use carqa_core::types::{ChatMessage, Role};
use carqa_hybrid::{assemble, AssemblerConfig, HybridRetriever};

use crate::prompt::{build_system_prompt, build_user_message, focus_query};

/// Canned reply when retrieval finds nothing relevant. Distinct from a
/// failure: the pipeline worked, the corpus just has nothing to say.
pub const NO_CONTEXT_REPLY: &str =
    "I couldn't find any information about that in the reviews. \
Please try another question or select a different car.";

pub struct QaEngine {
    retriever: HybridRetriever,
    generator: Arc<dyn Generator>,
    assembler: AssemblerConfig,
    top_k: usize,
}

impl QaEngine {
    pub fn new(
        retriever: HybridRetriever,
        generator: Arc<dyn Generator>,
        assembler: AssemblerConfig,
        top_k: usize,
    ) -> Self {
        Self { retriever, generator, assembler, top_k }
    }

    /// Answer a question against the review corpus.
    ///
    /// An empty ranked list short-circuits to `NO_CONTEXT_REPLY`
    /// without calling the generator. Assembly failures and generator
    /// outages propagate as their respective error variants.
    pub fn answer(
        &self,
        question: &str,
        filter: Option<&MetadataFilter>,
        history: &[ChatMessage],
    ) -> Result<String> {
        let query = focus_query(question, filter);
        // Pin one snapshot generation for the whole answer: chunk
        // lookups during assembly must read the same generation the
        // ranked list came from, even if a reindex lands mid-answer.
        let snapshot = self.retriever.snapshot();
        let ranked = self.retriever.retrieve_in(&snapshot, &query, self.top_k, filter)?;
        if ranked.is_empty() {
            tracing::info!(question, "no relevant context found");
            return Ok(NO_CONTEXT_REPLY.to_string());
        }

        let context = assemble(&ranked, &snapshot, &self.assembler)?;

        let current_car = filter
            .and_then(|f| match (&f.make, &f.model) {
                (Some(make), Some(model)) => Some(format!("{} {model}", make.to_lowercase())),
                _ => None,
            })
            .unwrap_or_else(|| "None".to_string());
        let previous_context = render_history(history);

        let system = build_system_prompt(&current_car);
        let user = build_user_message(&previous_context, question, &context.render());

        let mut messages: Vec<ChatMessage> = history.to_vec();
        messages.push(ChatMessage::user(user));
        self.generator.generate(&system, &messages)
    }
}

/// Compact prior turns into the "Previous context" prompt slot.
fn render_history(history: &[ChatMessage]) -> String {
    if history.is_empty() {
        return "None".to_string();
    }
    history
        .iter()
        .map(|m| {
            let who = match m.role {
                Role::User => "Q",
                Role::Assistant => "A",
                Role::System => "S",
            };
            format!("{who}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::render_history;
    use carqa_core::types::ChatMessage;

    #[test]
    fn empty_history_renders_as_none() {
        assert_eq!(render_history(&[]), "None");
    }

    #[test]
    fn history_renders_question_answer_pairs() {
        let history = vec![
            ChatMessage::user("Is the M5 reliable?"),
            ChatMessage::assistant("Expert reviews call it excellent."),
        ];
        let rendered = render_history(&history);
        assert_eq!(rendered, "Q: Is the M5 reliable?\nA: Expert reviews call it excellent.");
    }
}
