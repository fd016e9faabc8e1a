//! Result types returned by the pipeline entry points.
//!
//! All of them are `Serialize` so the CLI can print them with `--json` and
//! embedding applications can forward them as-is.

use crate::config::SpeedHint;
use crate::document::ContentHash;
use crate::error::SegmentError;
use serde::{Deserialize, Serialize};

/// Counters for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages (pdf) or slides (pptx) in the document.
    pub units: usize,
    /// Non-empty text-layer / shape-text fragments.
    pub text_fragments: usize,
    /// Embedded images found.
    pub images_found: usize,
    /// Images whose OCR output was appended.
    pub images_recognised: usize,
    /// Images that failed to decode or OCR, or produced no text.
    pub images_skipped: usize,
}

/// Plain text extracted from a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedText {
    /// Text-layer fragments first, then OCR fragments, joined with `\n`.
    pub text: String,
    pub stats: ExtractionStats,
}

/// Output of [`crate::PodcastPipeline::ingest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutput {
    pub content_hash: ContentHash,
    pub text: String,
    /// First `preview_chars` characters of `text`.
    pub preview: String,
    /// None when the text came from the artifact store.
    pub stats: Option<ExtractionStats>,
    pub from_cache: bool,
}

/// A segment the assembler had to leave out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedSegment {
    pub index: usize,
    pub error: SegmentError,
}

/// Counters for one assembly run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisStats {
    pub total_segments: usize,
    pub synthesized: usize,
    pub skipped: usize,
    /// Segments served by the primary provider.
    pub primary_hits: usize,
    /// Segments served by the fallback provider.
    pub fallback_hits: usize,
    pub total_bytes: usize,
    pub duration_ms: u64,
}

/// Concatenated audio for a whole script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledAudio {
    /// Produced chunks in segment order. Skipped segments contribute nothing.
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub skipped: Vec<SkippedSegment>,
    pub stats: SynthesisStats,
}

/// Output of [`crate::PodcastPipeline::podcast`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastOutput {
    pub content_hash: ContentHash,
    /// Artifact key the audio is stored under.
    pub audio_key: String,
    pub voice: String,
    pub speed: SpeedHint,
    #[serde(skip)]
    pub audio: Vec<u8>,
    /// Script the audio was generated from, when known.
    pub script: Option<String>,
    /// None on a cache hit.
    pub stats: Option<SynthesisStats>,
    pub skipped: Vec<SkippedSegment>,
    pub from_cache: bool,
}

/// One multiple-choice quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    /// 1-based position in the quiz.
    #[serde(default)]
    pub id: usize,
    pub question: String,
    pub options: Vec<String>,
    /// 0-based index into `options`.
    pub correct_answer: usize,
    #[serde(default)]
    pub explanation: String,
}
