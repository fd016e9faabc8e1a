//! The podcast pipeline: document → text → script → multi-voice audio.
//!
//! [`PodcastPipeline`] owns one instance of every stage and the artifact
//! store, and handles each request start to finish:
//!
//! ```text
//! Document ─ingest─▶ text/{hash}.txt
//!             │
//!             ├─quiz──▶ quiz/{hash}.json
//!             │
//!             └─script─▶ segments ─▶ providers ─▶ audio/{hash}_{voice}_{speed}.mp3
//!                                                 script/{hash}_{voice}_{speed}.txt
//! ```
//!
//! Keys built from layer-only text (OCR disabled) carry a `.layer` marker, so
//! a no-OCR run never satisfies a later run that has OCR enabled.
//!
//! Every stage consults the store first. The probe and the later write are
//! not atomic: two identical requests racing each other both generate, and
//! the last write wins.

use crate::config::{PipelineConfig, SpeedHint};
use crate::document::Document;
use crate::error::{Doc2CastError, StoreError};
use crate::output::{IngestOutput, PodcastOutput, QuizQuestion};
use crate::pipeline::assemble::AudioAssembler;
use crate::pipeline::extract::TextExtractor;
use crate::pipeline::generate::{ContentGenerator, LlmGenerator};
use crate::pipeline::input;
use crate::pipeline::ocr::{OcrEngine, VisionOcr};
use crate::pipeline::voice::{
    ResponsiveVoiceProvider, SpeechProvider, StreamElementsProvider, VoiceSynthesizer,
};
use crate::prompts::truncate_chars;
use crate::store::{ArtifactKey, ArtifactStore, FsArtifactStore};
use async_trait::async_trait;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default cache label for [`PodcastRequest::voice`].
pub const DEFAULT_VOICE_LABEL: &str = "host";

/// Which rendition of a document's podcast to produce.
///
/// `voice` only partitions the cache; the two speakers always use the fixed
/// voice table.
#[derive(Debug, Clone, PartialEq)]
pub struct PodcastRequest {
    pub voice: String,
    pub speed: SpeedHint,
}

impl Default for PodcastRequest {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE_LABEL.to_string(),
            speed: SpeedHint::NORMAL,
        }
    }
}

impl PodcastRequest {
    pub fn new(voice: impl Into<String>, speed: SpeedHint) -> Self {
        Self {
            voice: voice.into(),
            speed,
        }
    }

    fn validate(&self) -> Result<(), Doc2CastError> {
        let ok = !self.voice.is_empty()
            && self
                .voice
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if ok {
            Ok(())
        } else {
            Err(Doc2CastError::InvalidConfig(format!(
                "voice label must be non-empty ASCII letters, digits, '-' or '_', got '{}'",
                self.voice
            )))
        }
    }
}

/// Builder for [`PodcastPipeline`]. Any stage left unset is built from the
/// config.
pub struct PodcastPipelineBuilder {
    config: PipelineConfig,
    ocr: Option<Arc<dyn OcrEngine>>,
    generator: Option<Arc<dyn ContentGenerator>>,
    primary: Option<Arc<dyn SpeechProvider>>,
    fallback: Option<Arc<dyn SpeechProvider>>,
    store: Option<Arc<dyn ArtifactStore>>,
}

impl PodcastPipelineBuilder {
    pub fn ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn primary_speech(mut self, provider: Arc<dyn SpeechProvider>) -> Self {
        self.primary = Some(provider);
        self
    }

    pub fn fallback_speech(mut self, provider: Arc<dyn SpeechProvider>) -> Self {
        self.fallback = Some(provider);
        self
    }

    pub fn store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Assemble the pipeline.
    ///
    /// An LLM provider is resolved only if a stage that needs one (generator,
    /// or OCR while enabled) was not injected. OCR without a provider fails
    /// here; a generator without one fails when first called, so text
    /// extraction keeps working without API keys when OCR is off.
    pub fn build(self) -> Result<PodcastPipeline, Doc2CastError> {
        let config = self.config;

        let needs_llm = self.generator.is_none() || (config.ocr_enabled && self.ocr.is_none());
        let (llm, llm_error) = if needs_llm {
            match resolve_provider(&config) {
                Ok(p) => (Some(p), None),
                Err(e) => (None, Some(e)),
            }
        } else {
            (None, None)
        };

        let ocr: Option<Arc<dyn OcrEngine>> = match (config.ocr_enabled, self.ocr, &llm) {
            (false, _, _) => None,
            (true, Some(ocr), _) => Some(ocr),
            (true, None, Some(llm)) => Some(Arc::new(VisionOcr::new(Arc::clone(llm), &config))),
            (true, None, None) => {
                return Err(llm_error.unwrap_or_else(|| {
                    Doc2CastError::Internal("OCR enabled without an LLM provider".into())
                }))
            }
        };

        let generator: Arc<dyn ContentGenerator> = match (self.generator, &llm) {
            (Some(g), _) => g,
            (None, Some(llm)) => Arc::new(LlmGenerator::new(Arc::clone(llm), &config)),
            (None, None) => Arc::new(UnconfiguredGenerator::from(llm_error)),
        };

        let primary: Arc<dyn SpeechProvider> = match self.primary {
            Some(p) => p,
            None => Arc::new(StreamElementsProvider::new(
                config.tts_primary_url.clone(),
                config.tts_timeout_secs,
            )?),
        };
        let fallback: Option<Arc<dyn SpeechProvider>> =
            match (config.tts_fallback_enabled, self.fallback) {
                (false, _) => None,
                (true, Some(f)) => Some(f),
                (true, None) => Some(Arc::new(ResponsiveVoiceProvider::new(
                    config.tts_fallback_url.clone(),
                    config.tts_timeout_secs,
                )?)),
            };
        let synthesizer = VoiceSynthesizer::new(primary, fallback, config.min_audio_bytes);

        let store: Arc<dyn ArtifactStore> = match self.store {
            Some(s) => s,
            None => Arc::new(FsArtifactStore::new(config.artifact_dir.clone())),
        };

        Ok(PodcastPipeline {
            extractor: TextExtractor::new(ocr, config.pdfium_lib_path.clone()),
            assembler: AudioAssembler::new(synthesizer, config.progress_callback.clone()),
            generator,
            store,
            config,
        })
    }
}

/// End-to-end document → podcast pipeline.
pub struct PodcastPipeline {
    config: PipelineConfig,
    extractor: TextExtractor,
    generator: Arc<dyn ContentGenerator>,
    assembler: AudioAssembler,
    store: Arc<dyn ArtifactStore>,
}

impl PodcastPipeline {
    pub fn builder(config: PipelineConfig) -> PodcastPipelineBuilder {
        PodcastPipelineBuilder {
            config,
            ocr: None,
            generator: None,
            primary: None,
            fallback: None,
            store: None,
        }
    }

    /// Pipeline with every stage built from `config`.
    pub fn new(config: PipelineConfig) -> Result<Self, Doc2CastError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load a local path or URL, honouring the size and download limits.
    pub async fn load(&self, input: &str) -> Result<Document, Doc2CastError> {
        input::resolve_input(
            input,
            self.config.download_timeout_secs,
            self.config.max_document_bytes,
        )
        .await
    }

    /// Extract (or recall) the document's text.
    pub async fn ingest(&self, document: &Document) -> Result<IngestOutput, Doc2CastError> {
        let hash = document.content_hash().clone();
        let key = ArtifactKey::text(&hash, self.extractor.mode());

        if let Some(bytes) = self.cached(&key).await? {
            info!("Text cache hit for '{}' ({})", document.name(), key);
            let text = String::from_utf8_lossy(&bytes).into_owned();
            return Ok(IngestOutput {
                preview: self.preview(&text),
                content_hash: hash,
                text,
                stats: None,
                from_cache: true,
            });
        }

        let extracted = self.extractor.extract(document).await?;
        self.store.put(&key, extracted.text.as_bytes()).await?;

        Ok(IngestOutput {
            preview: self.preview(&extracted.text),
            content_hash: hash,
            text: extracted.text,
            stats: Some(extracted.stats),
            from_cache: false,
        })
    }

    /// Generate a fresh podcast script. Scripts are not cached on their own.
    pub async fn script(&self, document: &Document) -> Result<String, Doc2CastError> {
        let ingested = self.ingest(document).await?;
        self.generator.generate_script(&ingested.text).await
    }

    /// Produce (or recall) the podcast audio for `request`.
    ///
    /// A cache hit returns the stored audio without touching the generator
    /// or any speech provider.
    pub async fn podcast(
        &self,
        document: &Document,
        request: &PodcastRequest,
    ) -> Result<PodcastOutput, Doc2CastError> {
        request.validate()?;
        let start = Instant::now();
        let hash = document.content_hash().clone();
        let mode = self.extractor.mode();
        let audio_key = ArtifactKey::audio(&hash, mode, &request.voice, request.speed);
        let script_key = ArtifactKey::script(&hash, mode, &request.voice, request.speed);

        if let Some(audio) = self.cached(&audio_key).await? {
            info!("Audio cache hit: {} ({} bytes)", audio_key, audio.len());
            let script = self
                .cached(&script_key)
                .await?
                .map(|b| String::from_utf8_lossy(&b).into_owned());
            return Ok(PodcastOutput {
                content_hash: hash,
                audio_key: audio_key.to_string(),
                voice: request.voice.clone(),
                speed: request.speed,
                audio,
                script,
                stats: None,
                skipped: Vec::new(),
                from_cache: true,
            });
        }

        let ingested = self.ingest(document).await?;
        let script = self.generator.generate_script(&ingested.text).await?;
        debug!("Script: {} lines", script.lines().count());

        let assembled = self.assembler.assemble(&script, request.speed).await?;

        // Audio last: its presence is the cache hit, so the script must
        // already be there.
        self.store.put(&script_key, script.as_bytes()).await?;
        self.store.put(&audio_key, &assembled.bytes).await?;

        info!(
            "Podcast for '{}' ready: {} bytes in {}ms",
            document.name(),
            assembled.bytes.len(),
            start.elapsed().as_millis()
        );

        Ok(PodcastOutput {
            content_hash: hash,
            audio_key: audio_key.to_string(),
            voice: request.voice.clone(),
            speed: request.speed,
            audio: assembled.bytes,
            script: Some(script),
            stats: Some(assembled.stats),
            skipped: assembled.skipped,
            from_cache: false,
        })
    }

    /// Produce (or recall) the quiz.
    pub async fn quiz(&self, document: &Document) -> Result<Vec<QuizQuestion>, Doc2CastError> {
        let key = ArtifactKey::quiz(document.content_hash(), self.extractor.mode());

        if let Some(bytes) = self.cached(&key).await? {
            match serde_json::from_slice::<Vec<QuizQuestion>>(&bytes) {
                Ok(quiz) => {
                    info!("Quiz cache hit: {}", key);
                    return Ok(quiz);
                }
                Err(e) => warn!("Cached quiz {} unreadable ({}); regenerating", key, e),
            }
        }

        let ingested = self.ingest(document).await?;
        let quiz = self.generator.generate_quiz(&ingested.text).await?;
        let json = serde_json::to_vec_pretty(&quiz)
            .map_err(|e| Doc2CastError::Internal(format!("quiz serialisation: {}", e)))?;
        self.store.put(&key, &json).await?;
        Ok(quiz)
    }

    /// Produce the podcast and write its audio to `output_path`.
    pub async fn podcast_to_file(
        &self,
        document: &Document,
        request: &PodcastRequest,
        output_path: impl AsRef<Path>,
    ) -> Result<PodcastOutput, Doc2CastError> {
        let output = self.podcast(document, request).await?;
        write_audio(output_path.as_ref(), &output.audio).await?;
        Ok(output)
    }

    /// Synchronous wrapper around [`PodcastPipeline::ingest`].
    pub fn ingest_sync(&self, document: &Document) -> Result<IngestOutput, Doc2CastError> {
        runtime()?.block_on(self.ingest(document))
    }

    /// Synchronous wrapper around [`PodcastPipeline::podcast`].
    pub fn podcast_sync(
        &self,
        document: &Document,
        request: &PodcastRequest,
    ) -> Result<PodcastOutput, Doc2CastError> {
        runtime()?.block_on(self.podcast(document, request))
    }

    /// Synchronous wrapper around [`PodcastPipeline::quiz`].
    pub fn quiz_sync(&self, document: &Document) -> Result<Vec<QuizQuestion>, Doc2CastError> {
        runtime()?.block_on(self.quiz(document))
    }

    /// Exists-then-get. An entry evicted between the two calls is a miss.
    async fn cached(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>, Doc2CastError> {
        if !self.store.exists(key).await? {
            return Ok(None);
        }
        match self.store.get(key).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(StoreError::NotFound { .. }) => {
                debug!("{} disappeared between exists and get", key);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn preview(&self, text: &str) -> String {
        truncate_chars(text, self.config.preview_chars).to_string()
    }
}

/// Stands in for the generator when no LLM provider could be resolved.
struct UnconfiguredGenerator {
    provider: String,
    hint: String,
}

impl From<Option<Doc2CastError>> for UnconfiguredGenerator {
    fn from(error: Option<Doc2CastError>) -> Self {
        match error {
            Some(Doc2CastError::ProviderNotConfigured { provider, hint }) => {
                Self { provider, hint }
            }
            Some(other) => Self {
                provider: "auto".into(),
                hint: other.to_string(),
            },
            None => Self {
                provider: "auto".into(),
                hint: "no LLM provider configured".into(),
            },
        }
    }
}

impl UnconfiguredGenerator {
    fn error(&self) -> Doc2CastError {
        Doc2CastError::ProviderNotConfigured {
            provider: self.provider.clone(),
            hint: self.hint.clone(),
        }
    }
}

#[async_trait]
impl ContentGenerator for UnconfiguredGenerator {
    async fn generate_script(&self, _text: &str) -> Result<String, Doc2CastError> {
        Err(self.error())
    }

    async fn generate_quiz(&self, _text: &str) -> Result<Vec<QuizQuestion>, Doc2CastError> {
        Err(self.error())
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, Doc2CastError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Doc2CastError::Internal(format!("Failed to create tokio runtime: {}", e)))
}

/// Write audio bytes atomically (temp file + rename).
pub async fn write_audio(path: &Path, bytes: &[u8]) -> Result<(), Doc2CastError> {
    let write_err = |source| Doc2CastError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Instantiate a named provider with the given model.
fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Doc2CastError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Doc2CastError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. a pre-built provider in the config;
/// 2. `provider_name` + `model` (model defaults to `gpt-4.1-nano`);
/// 3. [`ProviderFactory::from_env`] auto-detection from API key variables.
fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, Doc2CastError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_provider(name, model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Doc2CastError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let r = PodcastRequest::default();
        assert_eq!(r.voice, "host");
        assert_eq!(r.speed, SpeedHint::NORMAL);
    }

    #[test]
    fn voice_labels_are_key_safe() {
        assert!(PodcastRequest::new("host", SpeedHint::FAST).validate().is_ok());
        assert!(PodcastRequest::new("guest_2", SpeedHint::FAST).validate().is_ok());
        for bad in ["", "../x", "a/b", "host voice"] {
            assert!(PodcastRequest::new(bad, SpeedHint::NORMAL).validate().is_err());
        }
    }

    #[tokio::test]
    async fn unconfigured_generator_reports_provider() {
        let g = UnconfiguredGenerator::from(Some(Doc2CastError::ProviderNotConfigured {
            provider: "openai".into(),
            hint: "set OPENAI_API_KEY".into(),
        }));
        match g.generate_script("text").await.unwrap_err() {
            Doc2CastError::ProviderNotConfigured { provider, .. } => assert_eq!(provider, "openai"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(g.generate_quiz("text").await.is_err());
    }

    #[tokio::test]
    async fn write_audio_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("episode.mp3");
        write_audio(&path, b"one").await.unwrap();
        write_audio(&path, b"two").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
        assert!(!dir.path().join("nested").join("episode.mp3.tmp").exists());
    }
}
