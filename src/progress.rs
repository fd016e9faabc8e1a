//! Progress-callback trait for per-segment synthesis events.
//!
//! Inject an [`Arc<dyn SynthesisProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events while the assembler walks the script.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2cast::{SynthesisProgressCallback, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     bytes: AtomicUsize,
//! }
//!
//! impl SynthesisProgressCallback for CountingCallback {
//!     fn on_segment_complete(&self, index: usize, total: usize, audio_len: usize) {
//!         self.bytes.fetch_add(audio_len, Ordering::SeqCst);
//!         eprintln!("Segment {}/{} done", index + 1, total);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { bytes: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn SynthesisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the assembler as it processes each segment.
///
/// Segments are processed strictly in order, so events for segment `n`
/// always arrive before events for segment `n + 1`. All methods have
/// default no-op implementations.
pub trait SynthesisProgressCallback: Send + Sync {
    /// Called once after segmentation, before any synthesis call.
    fn on_synthesis_start(&self, total_segments: usize) {
        let _ = total_segments;
    }

    /// Called just before the providers are asked for a segment.
    ///
    /// # Arguments
    /// * `index`   — 0-based segment index
    /// * `total`   — number of segments
    /// * `speaker` — `"host"` or `"guest"`
    fn on_segment_start(&self, index: usize, total: usize, speaker: &str) {
        let _ = (index, total, speaker);
    }

    /// Called when a segment produced audio.
    fn on_segment_complete(&self, index: usize, total: usize, audio_len: usize) {
        let _ = (index, total, audio_len);
    }

    /// Called when every provider failed for a segment.
    fn on_segment_skipped(&self, index: usize, total: usize, reason: &str) {
        let _ = (index, total, reason);
    }

    /// Called once after the last segment.
    fn on_synthesis_complete(&self, total_segments: usize, synthesized: usize) {
        let _ = (total_segments, synthesized);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SynthesisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn SynthesisProgressCallback>;
