//! Configuration types for the document-to-podcast pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Components receive the config (or the
//! fields they need) at construction time; nothing below the CLI reads
//! process environment on its own.

use crate::error::Doc2CastError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Default StreamElements speech endpoint (primary provider).
pub const DEFAULT_PRIMARY_TTS_URL: &str = "https://api.streamelements.com/kappa/v2/speech";

/// Default ResponsiveVoice endpoint (fallback provider).
pub const DEFAULT_FALLBACK_TTS_URL: &str =
    "https://responsivevoice.org/responsivevoice/getvoice.php";

/// Configuration for the pipeline.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_doc2cast::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .ocr_enabled(false)
///     .tts_timeout_secs(10)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// LLM model identifier used for script, quiz and OCR calls.
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "gemini", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for script and quiz generation. Default: 0.7.
    ///
    /// OCR calls always run at temperature 0.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 8192.
    pub max_tokens: usize,

    /// Maximum retry attempts on a failed LLM call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Run OCR over embedded images. Default: true.
    pub ocr_enabled: bool,

    /// Explicit pdfium library location. If None, the platform library next
    /// to the working directory is tried, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Largest accepted document in bytes. Default: 10 MiB.
    pub max_document_bytes: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Primary TTS endpoint. Default: StreamElements.
    pub tts_primary_url: String,

    /// Fallback TTS endpoint. Default: ResponsiveVoice.
    pub tts_fallback_url: String,

    /// Whether the fallback provider is consulted at all. Default: true.
    pub tts_fallback_enabled: bool,

    /// Per-TTS-call timeout in seconds. Default: 15.
    pub tts_timeout_secs: u64,

    /// Payloads at or below this size are treated as failed synthesis.
    /// Default: 100 bytes.
    pub min_audio_bytes: usize,

    /// Characters of extracted text sent to the script generator. Default: 20 000.
    pub script_char_limit: usize,

    /// Characters of extracted text sent to the quiz generator. Default: 15 000.
    pub quiz_char_limit: usize,

    /// Number of quiz questions requested. Default: 5.
    pub quiz_questions: usize,

    /// Characters kept in the ingest preview. Default: 1000.
    pub preview_chars: usize,

    /// Root directory of the default filesystem artifact store.
    pub artifact_dir: PathBuf,

    /// Optional per-segment progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.7,
            max_tokens: 8192,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            ocr_enabled: true,
            pdfium_lib_path: None,
            max_document_bytes: 10 * 1024 * 1024,
            download_timeout_secs: 120,
            tts_primary_url: DEFAULT_PRIMARY_TTS_URL.to_string(),
            tts_fallback_url: DEFAULT_FALLBACK_TTS_URL.to_string(),
            tts_fallback_enabled: true,
            tts_timeout_secs: 15,
            min_audio_bytes: 100,
            script_char_limit: 20_000,
            quiz_char_limit: 15_000,
            quiz_questions: 5,
            preview_chars: 1000,
            artifact_dir: PathBuf::from("artifacts"),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("ocr_enabled", &self.ocr_enabled)
            .field("max_document_bytes", &self.max_document_bytes)
            .field("tts_primary_url", &self.tts_primary_url)
            .field("tts_fallback_url", &self.tts_fallback_url)
            .field("tts_fallback_enabled", &self.tts_fallback_enabled)
            .field("tts_timeout_secs", &self.tts_timeout_secs)
            .field("min_audio_bytes", &self.min_audio_bytes)
            .field("artifact_dir", &self.artifact_dir)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn ocr_enabled(mut self, v: bool) -> Self {
        self.config.ocr_enabled = v;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn max_document_bytes(mut self, n: u64) -> Self {
        self.config.max_document_bytes = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn tts_primary_url(mut self, url: impl Into<String>) -> Self {
        self.config.tts_primary_url = url.into();
        self
    }

    pub fn tts_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.config.tts_fallback_url = url.into();
        self
    }

    pub fn tts_fallback_enabled(mut self, v: bool) -> Self {
        self.config.tts_fallback_enabled = v;
        self
    }

    pub fn tts_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tts_timeout_secs = secs.max(1);
        self
    }

    pub fn min_audio_bytes(mut self, n: usize) -> Self {
        self.config.min_audio_bytes = n;
        self
    }

    pub fn script_char_limit(mut self, n: usize) -> Self {
        self.config.script_char_limit = n;
        self
    }

    pub fn quiz_char_limit(mut self, n: usize) -> Self {
        self.config.quiz_char_limit = n;
        self
    }

    pub fn quiz_questions(mut self, n: usize) -> Self {
        self.config.quiz_questions = n.clamp(1, 20);
        self
    }

    pub fn preview_chars(mut self, n: usize) -> Self {
        self.config.preview_chars = n;
        self
    }

    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.artifact_dir = dir.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Doc2CastError> {
        let c = &self.config;
        if c.max_document_bytes == 0 {
            return Err(Doc2CastError::InvalidConfig(
                "max_document_bytes must be ≥ 1".into(),
            ));
        }
        for (name, url) in [
            ("tts_primary_url", &c.tts_primary_url),
            ("tts_fallback_url", &c.tts_fallback_url),
        ] {
            if reqwest::Url::parse(url).is_err() {
                return Err(Doc2CastError::InvalidConfig(format!(
                    "{name} is not a valid URL: '{url}'"
                )));
            }
        }
        if c.script_char_limit == 0 || c.quiz_char_limit == 0 {
            return Err(Doc2CastError::InvalidConfig(
                "generator character limits must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Speed hint ───────────────────────────────────────────────────────────

/// Requested playback-rate multiplier for synthesis.
///
/// Only the fallback provider passes it on (as its `rate` parameter); the
/// primary provider has no rate control and ignores it.
///
/// Values are held to two decimals, the precision of [`SpeedHint::key_fragment`],
/// so two hints that share a cache key are always the same hint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct SpeedHint(f32);

impl SpeedHint {
    pub const SLOW: SpeedHint = SpeedHint(0.8);
    pub const NORMAL: SpeedHint = SpeedHint(1.0);
    pub const FAST: SpeedHint = SpeedHint(1.25);

    pub const MIN: f32 = 0.5;
    pub const MAX: f32 = 2.0;

    /// Validate a raw multiplier and round it to two decimals.
    pub fn new(value: f32) -> Result<Self, Doc2CastError> {
        if !value.is_finite() || !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(Doc2CastError::InvalidConfig(format!(
                "speed must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )));
        }
        Ok(SpeedHint((value * 100.0).round() / 100.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Fixed two-decimal form used in artifact keys (`1.00`, `0.80`, `1.25`).
    pub fn key_fragment(self) -> String {
        format!("{:.2}", self.0)
    }
}

impl Default for SpeedHint {
    fn default() -> Self {
        SpeedHint::NORMAL
    }
}

impl TryFrom<f32> for SpeedHint {
    type Error = Doc2CastError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        SpeedHint::new(value)
    }
}

impl From<SpeedHint> for f32 {
    fn from(speed: SpeedHint) -> f32 {
        speed.0
    }
}

impl fmt::Display for SpeedHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

impl FromStr for SpeedHint {
    type Err = Doc2CastError;

    /// Accepts `slow`, `normal`, `fast`, or a number such as `1.1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow" => Ok(SpeedHint::SLOW),
            "normal" => Ok(SpeedHint::NORMAL),
            "fast" => Ok(SpeedHint::FAST),
            other => {
                let v: f32 = other.trim_end_matches('x').parse().map_err(|_| {
                    Doc2CastError::InvalidConfig(format!("invalid speed '{s}'"))
                })?;
                SpeedHint::new(v)
            }
        }
    }
}
