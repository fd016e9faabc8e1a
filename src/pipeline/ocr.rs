//! OCR over embedded images.
//!
//! [`OcrEngine`] is the seam the extractor calls once per embedded image.
//! The default [`VisionOcr`] hands the image to the configured vision LLM
//! with a transcription prompt, the same way the page images are read in a
//! VLM conversion pipeline.

use crate::config::PipelineConfig;
use crate::error::OcrError;
use crate::pipeline::encode::encode_for_ocr;
use crate::pipeline::llm::{build_options, chat_with_retry, RetryPolicy};
use crate::prompts::{OCR_NO_TEXT, OCR_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, LLMProvider};
use image::DynamicImage;
use std::sync::Arc;

/// Recognises text in a single image.
///
/// An `Ok` with an empty string means "no text", not failure.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &DynamicImage, location: &str) -> Result<String, OcrError>;
}

/// OCR backed by a vision-capable LLM provider.
pub struct VisionOcr {
    provider: Arc<dyn LLMProvider>,
    policy: RetryPolicy,
    max_tokens: usize,
}

impl VisionOcr {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            policy: RetryPolicy::from_config(config),
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    async fn recognize(&self, image: &DynamicImage, location: &str) -> Result<String, OcrError> {
        let data = encode_for_ocr(image).map_err(|e| OcrError::Decode {
            location: location.to_string(),
            detail: e.to_string(),
        })?;

        let messages = vec![
            ChatMessage::system(OCR_SYSTEM_PROMPT),
            ChatMessage::user_with_images("", vec![data]),
        ];
        // Transcription wants the most literal reading available.
        let options = build_options(0.0, self.max_tokens);

        let label = format!("ocr {location}");
        let reply = chat_with_retry(&self.provider, &messages, &options, self.policy, &label)
            .await
            .map_err(|detail| OcrError::Engine {
                retries: self.policy.max_retries,
                detail,
            })?;

        Ok(normalise_ocr_reply(&reply.content))
    }
}

/// Trim the reply and map the no-text marker to an empty string.
pub fn normalise_ocr_reply(reply: &str) -> String {
    let trimmed = reply.trim();
    if trimmed == OCR_NO_TEXT {
        String::new()
    } else {
        trimmed.to_string()
    }
}
