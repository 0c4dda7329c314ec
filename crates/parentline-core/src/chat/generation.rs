//! Plain LLM generation with trimmed history

use super::session::{Turn, TurnRole};
use crate::error::Result;
use parentline_llm::util::truncate_chars;
use parentline_llm::{CompletionRequest, LlmProvider, Message};
use std::sync::Arc;
use tracing::debug;

/// History turns passed to the model by default
pub const DEFAULT_HISTORY_TURNS: usize = 10;

const USER_TURN_CHARS: usize = 200;
const ASSISTANT_TURN_CHARS: usize = 150;

const EXPERT_PROMPT: &str = "You are a warm, knowledgeable parenting counselor. \
Answer the parent's question with practical, evidence-based guidance in a few short paragraphs. \
Recommend a pediatrician when symptoms could be medical. Reply in the language of the question.";

const CONTEXT_PROMPT: &str = "You are a parenting counselor answering from reference material. \
Use only the material below; if it does not cover the question, say so. \
Reply in the language of the question.";

const REDIRECT_PROMPT: &str = "You are a parenting assistant. The user asked something unrelated \
to parenting. In two sentences, kindly say you can only help with parenting and child-care topics \
and suggest a parenting question they could ask instead. Reply in the language of the question.";

/// Fixed redirect used when the redirect call itself fails
pub const FALLBACK_REDIRECT: &str = "I can only help with parenting and child-care questions. \
Feel free to ask me about sleep, development, feeding or daily care.";

/// Render turns as a compact transcript, clipping long messages
#[must_use]
pub fn format_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| match turn.role {
            TurnRole::User => format!("Parent: {}", truncate_chars(&turn.text, USER_TURN_CHARS)),
            TurnRole::Assistant => format!(
                "Counselor: {}",
                truncate_chars(&turn.text, ASSISTANT_TURN_CHARS)
            ),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generation handler
pub struct GenerationHandler {
    llm: Arc<dyn LlmProvider>,
    model: String,
    history_turns: usize,
}

impl GenerationHandler {
    /// Create a handler; `model` empty means the provider default
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>, history_turns: usize) -> Self {
        Self {
            llm,
            model: model.into(),
            history_turns,
        }
    }

    fn user_prompt(&self, question: &str, history: &[Turn], context: Option<&str>) -> String {
        let start = history.len().saturating_sub(self.history_turns);
        let transcript = format_history(&history[start..]);

        let mut prompt = String::new();
        if let Some(context) = context {
            prompt.push_str("Reference material:\n");
            prompt.push_str(context);
            prompt.push_str("\n\n");
        }
        if !transcript.is_empty() {
            prompt.push_str("Conversation so far:\n");
            prompt.push_str(&transcript);
            prompt.push_str("\n\n");
        }
        prompt.push_str("Question: ");
        prompt.push_str(question);
        prompt
    }

    async fn run(&self, system: &str, user: String) -> Result<String> {
        let request = CompletionRequest::new(self.model.clone())
            .with_message(Message::system(system))
            .with_message(Message::user(user));
        let response = self.llm.complete(request).await?;
        debug!(model = %response.model, "Generation complete");
        Ok(response.content.trim().to_string())
    }

    /// Answer a parenting question from history alone
    pub async fn answer(&self, question: &str, history: &[Turn]) -> Result<String> {
        self.run(EXPERT_PROMPT, self.user_prompt(question, history, None))
            .await
    }

    /// Answer a question grounded in a context block
    pub async fn answer_with_context(
        &self,
        question: &str,
        history: &[Turn],
        context: &str,
    ) -> Result<String> {
        self.run(
            CONTEXT_PROMPT,
            self.user_prompt(question, history, Some(context)),
        )
        .await
    }

    /// Politely steer an off-topic message back to parenting
    pub async fn redirect(&self, question: &str) -> Result<String> {
        self.run(REDIRECT_PROMPT, format!("Message: {}", question))
            .await
    }
}
