//! Shared LLM call driver: timeout, retry and backoff around `provider.chat`.
//!
//! Both the vision OCR engine and the script/quiz generator go through
//! [`chat_with_retry`], so they fail and back off the same way.
//!
//! ## Retry Strategy
//!
//! Failures and timeouts are retried up to `max_retries` times with
//! exponential backoff (`retry_backoff_ms * 2^(attempt-1)`): with a 500 ms
//! base and 3 retries the waits are 500 ms → 1 s → 2 s.

use crate::config::PipelineConfig;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Retry/timeout knobs copied out of [`PipelineConfig`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

/// Text and token counts of a successful completion.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub retries: u32,
}

/// Build completion options for a call.
pub fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

/// Send `messages` until one attempt succeeds or retries run out.
///
/// Returns the last error message when every attempt failed. `label` only
/// feeds the log lines ("script", "quiz", "ocr slide 3 image 1", …).
pub async fn chat_with_retry(
    provider: &Arc<dyn LLMProvider>,
    messages: &[ChatMessage],
    options: &CompletionOptions,
    policy: RetryPolicy,
    label: &str,
) -> Result<ChatReply, String> {
    let start = Instant::now();
    let mut last_err: Option<String> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.backoff(attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label,
                attempt,
                policy.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        let call = provider.chat(messages, Some(options));
        match timeout(Duration::from_secs(policy.timeout_secs), call).await {
            Ok(Ok(response)) => {
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    label,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                return Ok(ChatReply {
                    content: response.content,
                    prompt_tokens: response.prompt_tokens as usize,
                    completion_tokens: response.completion_tokens as usize,
                    retries: attempt,
                });
            }
            Ok(Err(e)) => {
                let err_msg = format!("{}", e);
                warn!("{}: attempt {} failed — {}", label, attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
            Err(_) => {
                let err_msg = format!("timed out after {}s", policy.timeout_secs);
                warn!("{}: attempt {} {}", label, attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| "Unknown error".to_string()))
}
