//! Script and quiz generation over an LLM provider.
//!
//! [`ContentGenerator`] is the seam the pipeline calls; [`LlmGenerator`] is
//! the edgequake-llm implementation. Calls share the retry driver in
//! [`crate::pipeline::llm`] with the OCR engine.

use crate::config::PipelineConfig;
use crate::error::Doc2CastError;
use crate::output::QuizQuestion;
use crate::pipeline::llm::{build_options, chat_with_retry, RetryPolicy};
use crate::prompts::{
    quiz_system_prompt, quiz_user_prompt, script_user_prompt, truncate_chars,
    SCRIPT_SYSTEM_PROMPT,
};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Number of options every quiz question must carry.
pub const QUIZ_OPTIONS: usize = 4;

/// Produces the podcast script and quiz for a document's text.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// A `Host:` / `Guest:` dialogue about `text`.
    async fn generate_script(&self, text: &str) -> Result<String, Doc2CastError>;

    /// Multiple-choice questions about `text`, ids numbered from 1.
    async fn generate_quiz(&self, text: &str) -> Result<Vec<QuizQuestion>, Doc2CastError>;
}

/// [`ContentGenerator`] backed by an edgequake-llm provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    policy: RetryPolicy,
    temperature: f32,
    max_tokens: usize,
    script_char_limit: usize,
    quiz_char_limit: usize,
    quiz_questions: usize,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            policy: RetryPolicy::from_config(config),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            script_char_limit: config.script_char_limit,
            quiz_char_limit: config.quiz_char_limit,
            quiz_questions: config.quiz_questions,
        }
    }

    async fn complete(
        &self,
        system: &str,
        user: String,
        label: &str,
    ) -> Result<String, Doc2CastError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let options = build_options(self.temperature, self.max_tokens);
        let reply = chat_with_retry(&self.provider, &messages, &options, self.policy, label)
            .await
            .map_err(|message| Doc2CastError::LlmApiError {
                retries: self.policy.max_retries,
                message,
            })?;
        info!(
            "{}: {} chars ({} in / {} out tokens, {} retries)",
            label,
            reply.content.len(),
            reply.prompt_tokens,
            reply.completion_tokens,
            reply.retries
        );
        Ok(reply.content)
    }
}

#[async_trait]
impl ContentGenerator for LlmGenerator {
    async fn generate_script(&self, text: &str) -> Result<String, Doc2CastError> {
        let content = truncate_chars(text, self.script_char_limit);
        if content.len() < text.len() {
            debug!("script input truncated to {} chars", self.script_char_limit);
        }
        let raw = self
            .complete(SCRIPT_SYSTEM_PROMPT, script_user_prompt(content), "script")
            .await?;
        let script = raw.trim();
        if script.is_empty() {
            return Err(Doc2CastError::InvalidGeneratorOutput {
                artifact: "script",
                detail: "empty response".into(),
            });
        }
        Ok(script.to_string())
    }

    async fn generate_quiz(&self, text: &str) -> Result<Vec<QuizQuestion>, Doc2CastError> {
        let content = truncate_chars(text, self.quiz_char_limit);
        let raw = self
            .complete(
                &quiz_system_prompt(self.quiz_questions),
                quiz_user_prompt(content),
                "quiz",
            )
            .await?;
        let mut questions = parse_quiz(&raw)?;
        if questions.len() > self.quiz_questions {
            questions.truncate(self.quiz_questions);
        }
        Ok(questions)
    }
}

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*\n(.*?)\n?\s*```\s*$").unwrap());

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(raw: &str) -> &str {
    match RE_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    }
}

/// Parse the quiz reply, keeping only well-formed questions.
///
/// Accepts a bare JSON array or an object with a `questions` array, with or
/// without code fences. Questions without exactly four options or whose
/// answer index is out of range are dropped; the rest are renumbered 1..n.
pub fn parse_quiz(raw: &str) -> Result<Vec<QuizQuestion>, Doc2CastError> {
    let invalid = |detail: String| Doc2CastError::InvalidGeneratorOutput {
        artifact: "quiz",
        detail,
    };

    let body = strip_code_fences(raw);
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        // Prose around the array: fall back to the outermost brackets.
        Err(e) => match (body.find('['), body.rfind(']')) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end])
                .map_err(|_| invalid(format!("not JSON: {}", e)))?,
            _ => return Err(invalid(format!("not JSON: {}", e))),
        },
    };

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("questions") {
            Some(serde_json::Value::Array(items)) => items,
            _ => return Err(invalid("expected a JSON array of questions".into())),
        },
        _ => return Err(invalid("expected a JSON array of questions".into())),
    };

    let total = items.len();
    let questions: Vec<QuizQuestion> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<QuizQuestion>(item) {
            Ok(q) if q.options.len() == QUIZ_OPTIONS && q.correct_answer < QUIZ_OPTIONS => Some(q),
            Ok(q) => {
                warn!(
                    "Dropping quiz question with {} options / answer {}: {:?}",
                    q.options.len(),
                    q.correct_answer,
                    q.question
                );
                None
            }
            Err(e) => {
                warn!("Dropping malformed quiz question: {}", e);
                None
            }
        })
        .enumerate()
        .map(|(i, q)| QuizQuestion { id: i + 1, ..q })
        .collect();

    if questions.is_empty() {
        return Err(invalid(format!("none of {} questions were usable", total)));
    }
    debug!("Parsed {}/{} quiz questions", questions.len(), total);
    Ok(questions)
}
