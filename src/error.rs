//! Error types for the edgequake-doc2cast library.
//!
//! Fatal and non-fatal failures are kept apart:
//!
//! * [`Doc2CastError`] — **Fatal**: the request cannot produce its artifact
//!   (unreadable input, unsupported format, no text, no segments, no audio at
//!   all). Returned as `Err(Doc2CastError)` from the pipeline entry points.
//!
//! * [`SegmentError`], [`ProviderError`], [`OcrError`] — **Non-fatal**: one
//!   segment, one provider call or one embedded image failed. They are
//!   recovered locally (skip or fall back) and only show up in stats and
//!   logs, never as an aborted request.
//!
//! [`StoreError`] sits in between: the artifact store reports it, and the
//! pipeline decides whether it is a cache miss or a fatal write failure.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-doc2cast library.
#[derive(Debug, Error)]
pub enum Doc2CastError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The document is larger than the configured limit.
    #[error("Document '{name}' is {size} bytes, limit is {limit} bytes")]
    DocumentTooLarge { name: String, size: u64, limit: u64 },

    // ── Format errors ─────────────────────────────────────────────────────
    /// Extension is neither `pdf` nor `pptx`.
    #[error("Unsupported document format '{extension}' (expected pdf or pptx)")]
    UnsupportedFormat { extension: String },

    /// Extension is supported but the bytes do not match it.
    #[error("'{name}' is not a valid {kind} file\nFirst bytes: {magic:?}")]
    NotADocument {
        name: String,
        kind: &'static str,
        magic: Vec<u8>,
    },

    /// The container could be identified but not parsed.
    #[error("{kind} '{name}' is corrupt: {detail}")]
    CorruptDocument {
        name: String,
        kind: &'static str,
        detail: String,
    },

    /// Every extraction strategy ran and produced nothing.
    #[error("No text found in '{name}' (text layer and OCR both empty)")]
    NoTextFound { name: String },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// The script produced zero dialogue segments.
    #[error("Script contains no dialogue segments")]
    NoSegments,

    /// Every segment was skipped by the synthesis adapter.
    #[error("No audio produced: all {segments} segments failed synthesis.\nFirst error: {first_error}")]
    NoAudioProduced { segments: usize, first_error: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API kept failing after all retries.
    #[error("LLM API error after {retries} retries: {message}")]
    LlmApiError { retries: u32, message: String },

    /// The generator answered, but not with something usable.
    #[error("Generator returned unusable {artifact}: {detail}")]
    InvalidGeneratorOutput {
        artifact: &'static str,
        detail: String,
    },

    // ── Storage / I/O errors ──────────────────────────────────────────────
    /// The artifact store failed in a way the pipeline cannot recover from.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, or place the platform library\n\
next to the binary / in the system library path.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of a single call to one text-to-speech provider.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProviderError {
    /// Connection, TLS or body-read failure.
    #[error("{provider}: request failed: {detail}")]
    Transport { provider: String, detail: String },

    /// The call exceeded its timeout budget.
    #[error("{provider}: timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    /// Non-2xx HTTP status.
    #[error("{provider}: HTTP {status}")]
    Status { provider: String, status: u16 },

    /// 2xx, but the payload is too small to be real audio.
    #[error("{provider}: payload of {len} bytes is below the {min} byte minimum")]
    ShortPayload {
        provider: String,
        len: usize,
        min: usize,
    },
}

/// Why a segment contributed no audio. Never propagated as a fatal error.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SegmentError {
    /// Primary failed and no fallback is configured.
    #[error("Segment {index}: {primary}")]
    PrimaryFailed {
        index: usize,
        primary: ProviderError,
    },

    /// Primary and fallback both failed.
    #[error("Segment {index}: {primary}; fallback {fallback}")]
    AllProvidersFailed {
        index: usize,
        primary: ProviderError,
        fallback: ProviderError,
    },
}

impl SegmentError {
    /// 0-based segment index the error belongs to.
    pub fn index(&self) -> usize {
        match self {
            SegmentError::PrimaryFailed { index, .. } => *index,
            SegmentError::AllProvidersFailed { index, .. } => *index,
        }
    }
}

/// Failure to recognise text in one embedded image.
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    /// Image bytes could not be decoded or re-encoded.
    #[error("image {location}: decode failed: {detail}")]
    Decode { location: String, detail: String },

    /// The OCR backend kept failing.
    #[error("OCR failed after {retries} retries: {detail}")]
    Engine { retries: u32, detail: String },
}

/// Errors reported by an [`crate::store::ArtifactStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No artifact under that key.
    #[error("Artifact '{key}' not found")]
    NotFound { key: String },

    /// The key cannot be mapped to a storage location.
    #[error("Invalid artifact key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Backend I/O failure.
    #[error("Artifact store I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}
