//! # edgequake-doc2cast
//!
//! Turn PDF and PowerPoint documents into two-voice podcast audio, and into
//! multiple-choice quizzes.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / PPTX
//!  │
//!  ├─ 1. Input     local file or URL, size-checked, content-hashed
//!  ├─ 2. Extract   text layer first, then OCR over embedded images
//!  ├─ 3. Script    LLM writes a Host / Guest dialogue
//!  ├─ 4. Segment   one speaker-tagged segment per script line
//!  ├─ 5. Voice     StreamElements, falling back to ResponsiveVoice
//!  └─ 6. Assemble  chunks concatenated in order, stored by (hash, voice, speed)
//! ```
//!
//! Extracted text, quizzes, scripts and audio are kept in an
//! [`ArtifactStore`] keyed by the document's SHA-256, so re-uploading the
//! same bytes under another name costs nothing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2cast::{PipelineConfig, PodcastPipeline, PodcastRequest, SpeedHint};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let pipeline = PodcastPipeline::new(PipelineConfig::default())?;
//!     let document = pipeline.load("lecture.pptx").await?;
//!     let request = PodcastRequest::new("host", SpeedHint::FAST);
//!     let episode = pipeline.podcast_to_file(&document, &request, "lecture.mp3").await?;
//!     eprintln!("{} bytes, cached: {}", episode.audio.len(), episode.from_cache);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2cast` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-doc2cast = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod podcast;
pub mod progress;
pub mod prompts;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, SpeedHint};
pub use document::{ContentHash, Document, DocumentKind};
pub use error::{Doc2CastError, OcrError, ProviderError, SegmentError, StoreError};
pub use output::{
    AssembledAudio, ExtractedText, ExtractionStats, IngestOutput, PodcastOutput, QuizQuestion,
    SkippedSegment, SynthesisStats,
};
pub use pipeline::extract::{ExtractionMode, TextExtractor};
pub use pipeline::generate::{ContentGenerator, LlmGenerator};
pub use pipeline::ocr::{OcrEngine, VisionOcr};
pub use pipeline::segment::{segment, Segment, Speaker};
pub use pipeline::voice::{
    ResponsiveVoiceProvider, SpeechProvider, StreamElementsProvider, SynthesisOutcome,
    VoiceSynthesizer,
};
pub use podcast::{PodcastPipeline, PodcastPipelineBuilder, PodcastRequest};
pub use progress::{NoopProgressCallback, ProgressCallback, SynthesisProgressCallback};
pub use store::{ArtifactKey, ArtifactStore, FsArtifactStore, MemoryArtifactStore};
