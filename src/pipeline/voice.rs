//! Voice synthesis: one segment → one audio chunk, with a fallback provider.
//!
//! Each speaker has a fixed voice on each provider:
//!
//! | Speaker | StreamElements | ResponsiveVoice     |
//! |---------|----------------|---------------------|
//! | Host    | `Brian`        | `UK English Male`   |
//! | Guest   | `Amy`          | `US English Female` |
//!
//! The primary is asked first. A transport error, timeout, non-2xx status or
//! a payload of at most `min_audio_bytes` sends the segment to the fallback,
//! which is held to the same checks. A segment neither provider can voice
//! becomes [`SynthesisOutcome::Skipped`]; [`VoiceSynthesizer::synthesize`]
//! itself never fails.

use crate::config::SpeedHint;
use crate::error::{Doc2CastError, ProviderError, SegmentError};
use crate::pipeline::segment::{Segment, Speaker};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Provider-specific voice names for one speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceProfile {
    pub primary: &'static str,
    pub fallback: &'static str,
}

/// The fixed speaker → voice table.
pub fn voice_profile(speaker: Speaker) -> VoiceProfile {
    match speaker {
        Speaker::Host => VoiceProfile {
            primary: "Brian",
            fallback: "UK English Male",
        },
        Speaker::Guest => VoiceProfile {
            primary: "Amy",
            fallback: "US English Female",
        },
    }
}

/// A text-to-speech backend.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Synthesize `text` in `speaker`'s voice. Returns encoded audio (mp3).
    async fn speak(
        &self,
        text: &str,
        speaker: Speaker,
        speed: SpeedHint,
    ) -> Result<Vec<u8>, ProviderError>;
}

/// StreamElements `kappa/v2/speech`. Has no rate control; `speed` is ignored.
pub struct StreamElementsProvider {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl StreamElementsProvider {
    pub const NAME: &'static str = "streamelements";

    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, Doc2CastError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            base_url: base_url.into(),
            timeout_secs,
        })
    }

    /// Query string for one request.
    pub fn query(text: &str, speaker: Speaker) -> Vec<(&'static str, String)> {
        vec![
            ("voice", voice_profile(speaker).primary.to_string()),
            ("text", text.to_string()),
        ]
    }
}

#[async_trait]
impl SpeechProvider for StreamElementsProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn speak(
        &self,
        text: &str,
        speaker: Speaker,
        _speed: SpeedHint,
    ) -> Result<Vec<u8>, ProviderError> {
        let params = Self::query(text, speaker);
        fetch_audio(&self.client, Self::NAME, &self.base_url, &params, self.timeout_secs).await
    }
}

/// ResponsiveVoice `getvoice.php`.
pub struct ResponsiveVoiceProvider {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl ResponsiveVoiceProvider {
    pub const NAME: &'static str = "responsivevoice";

    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, Doc2CastError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            base_url: base_url.into(),
            timeout_secs,
        })
    }

    pub fn query(text: &str, speaker: Speaker, speed: SpeedHint) -> Vec<(&'static str, String)> {
        vec![
            ("t", text.to_string()),
            ("tl", "en".to_string()),
            ("sv", voice_profile(speaker).fallback.to_string()),
            ("pitch", "0.5".to_string()),
            ("rate", speed.value().to_string()),
            ("vol", "1".to_string()),
        ]
    }
}

#[async_trait]
impl SpeechProvider for ResponsiveVoiceProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn speak(
        &self,
        text: &str,
        speaker: Speaker,
        speed: SpeedHint,
    ) -> Result<Vec<u8>, ProviderError> {
        let params = Self::query(text, speaker, speed);
        fetch_audio(&self.client, Self::NAME, &self.base_url, &params, self.timeout_secs).await
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, Doc2CastError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Doc2CastError::InvalidConfig(format!("HTTP client: {}", e)))
}

async fn fetch_audio(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
    params: &[(&'static str, String)],
    timeout_secs: u64,
) -> Result<Vec<u8>, ProviderError> {
    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            ProviderError::Timeout {
                provider: provider.to_string(),
                secs: timeout_secs,
            }
        } else {
            ProviderError::Transport {
                provider: provider.to_string(),
                detail: e.to_string(),
            }
        }
    };

    let response = client.get(url).query(params).send().await.map_err(map_err)?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
        });
    }
    let body = response.bytes().await.map_err(map_err)?;
    Ok(body.to_vec())
}

/// Which provider produced a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedBy {
    Primary,
    Fallback,
}

/// Audio bytes for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub bytes: Vec<u8>,
    pub served_by: ServedBy,
}

/// Result of synthesizing one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    Audio(AudioChunk),
    Skipped(SegmentError),
}

/// Primary + optional fallback provider with the payload-size check.
pub struct VoiceSynthesizer {
    primary: Arc<dyn SpeechProvider>,
    fallback: Option<Arc<dyn SpeechProvider>>,
    min_audio_bytes: usize,
}

impl VoiceSynthesizer {
    pub fn new(
        primary: Arc<dyn SpeechProvider>,
        fallback: Option<Arc<dyn SpeechProvider>>,
        min_audio_bytes: usize,
    ) -> Self {
        Self {
            primary,
            fallback,
            min_audio_bytes,
        }
    }

    /// Synthesize segment number `index` (0-based).
    pub async fn synthesize(
        &self,
        index: usize,
        segment: &Segment,
        speed: SpeedHint,
    ) -> SynthesisOutcome {
        let primary = match self.attempt(&self.primary, segment, speed).await {
            Ok(bytes) => {
                return SynthesisOutcome::Audio(AudioChunk {
                    bytes,
                    served_by: ServedBy::Primary,
                })
            }
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            warn!("Segment {}: {}; no fallback configured", index, primary);
            return SynthesisOutcome::Skipped(SegmentError::PrimaryFailed { index, primary });
        };

        warn!("Segment {}: {}; trying {}", index, primary, fallback.name());
        match self.attempt(fallback, segment, speed).await {
            Ok(bytes) => SynthesisOutcome::Audio(AudioChunk {
                bytes,
                served_by: ServedBy::Fallback,
            }),
            Err(fallback) => {
                warn!("Segment {}: fallback {}", index, fallback);
                SynthesisOutcome::Skipped(SegmentError::AllProvidersFailed {
                    index,
                    primary,
                    fallback,
                })
            }
        }
    }

    async fn attempt(
        &self,
        provider: &Arc<dyn SpeechProvider>,
        segment: &Segment,
        speed: SpeedHint,
    ) -> Result<Vec<u8>, ProviderError> {
        let bytes = provider.speak(&segment.text, segment.speaker, speed).await?;
        if bytes.len() <= self.min_audio_bytes {
            return Err(ProviderError::ShortPayload {
                provider: provider.name().to_string(),
                len: bytes.len(),
                min: self.min_audio_bytes,
            });
        }
        debug!(
            "{} voiced {} chars as {} → {} bytes",
            provider.name(),
            segment.text.chars().count(),
            segment.speaker,
            bytes.len()
        );
        Ok(bytes)
    }
}
