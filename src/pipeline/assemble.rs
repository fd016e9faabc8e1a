//! Audio assembly: script → segments → one synthesis call per segment →
//! concatenated audio.
//!
//! Segments are voiced strictly one after another; the next request is not
//! sent until the previous one has resolved. Chunks are appended in segment
//! order. A skipped segment leaves a gap in the dialogue rather than silence.
//!
//! MP3 frames are self-delimiting, so plain byte concatenation of the
//! providers' mp3 responses plays back as one stream.

use crate::config::SpeedHint;
use crate::error::Doc2CastError;
use crate::output::{AssembledAudio, SkippedSegment, SynthesisStats};
use crate::pipeline::segment::segment;
use crate::pipeline::voice::{ServedBy, SynthesisOutcome, VoiceSynthesizer};
use crate::progress::ProgressCallback;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drives the segmenter and the synthesizer over a whole script.
pub struct AudioAssembler {
    synthesizer: VoiceSynthesizer,
    progress: Option<ProgressCallback>,
}

impl AudioAssembler {
    pub fn new(synthesizer: VoiceSynthesizer, progress: Option<ProgressCallback>) -> Self {
        Self {
            synthesizer,
            progress,
        }
    }

    /// Voice `script` at `speed`.
    ///
    /// # Errors
    /// - `NoSegments` if the script holds no dialogue lines
    /// - `NoAudioProduced` if every segment was skipped
    pub async fn assemble(
        &self,
        script: &str,
        speed: SpeedHint,
    ) -> Result<AssembledAudio, Doc2CastError> {
        let start = Instant::now();
        let segments = segment(script);
        let total = segments.len();
        if total == 0 {
            return Err(Doc2CastError::NoSegments);
        }
        info!("Synthesizing {} segments at {}", total, speed);

        if let Some(cb) = &self.progress {
            cb.on_synthesis_start(total);
        }

        let mut bytes = Vec::new();
        let mut skipped = Vec::new();
        let mut stats = SynthesisStats {
            total_segments: total,
            ..Default::default()
        };

        for (index, seg) in segments.iter().enumerate() {
            if let Some(cb) = &self.progress {
                cb.on_segment_start(index, total, seg.voice_id);
            }
            debug!("Segment {}/{} ({})", index + 1, total, seg.speaker);

            match self.synthesizer.synthesize(index, seg, speed).await {
                SynthesisOutcome::Audio(chunk) => {
                    stats.synthesized += 1;
                    match chunk.served_by {
                        ServedBy::Primary => stats.primary_hits += 1,
                        ServedBy::Fallback => stats.fallback_hits += 1,
                    }
                    if let Some(cb) = &self.progress {
                        cb.on_segment_complete(index, total, chunk.bytes.len());
                    }
                    bytes.extend_from_slice(&chunk.bytes);
                }
                SynthesisOutcome::Skipped(error) => {
                    stats.skipped += 1;
                    if let Some(cb) = &self.progress {
                        cb.on_segment_skipped(index, total, &error.to_string());
                    }
                    skipped.push(SkippedSegment { index, error });
                }
            }
        }

        if let Some(cb) = &self.progress {
            cb.on_synthesis_complete(total, stats.synthesized);
        }

        if stats.synthesized == 0 {
            let first_error = skipped
                .first()
                .map(|s| s.error.to_string())
                .unwrap_or_default();
            return Err(Doc2CastError::NoAudioProduced {
                segments: total,
                first_error,
            });
        }

        stats.total_bytes = bytes.len();
        stats.duration_ms = start.elapsed().as_millis() as u64;

        if stats.skipped > 0 {
            warn!(
                "{} of {} segments produced no audio and were left out",
                stats.skipped, total
            );
        }
        info!(
            "Assembled {} bytes from {}/{} segments ({} primary, {} fallback) in {}ms",
            stats.total_bytes,
            stats.synthesized,
            total,
            stats.primary_hits,
            stats.fallback_hits,
            stats.duration_ms
        );

        Ok(AssembledAudio {
            bytes,
            skipped,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::pipeline::segment::Speaker;
    use crate::pipeline::voice::SpeechProvider;
    use crate::progress::SynthesisProgressCallback;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Voices each line as its own text repeated to 200 bytes; fails on "FAIL".
    struct Echo {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn speak(
            &self,
            text: &str,
            _: Speaker,
            _: SpeedHint,
        ) -> Result<Vec<u8>, ProviderError> {
            self.calls.lock().unwrap().push(text.to_string());
            if text.contains("FAIL") {
                return Err(ProviderError::Transport {
                    provider: "echo".into(),
                    detail: "refused".into(),
                });
            }
            Ok(text.bytes().cycle().take(200).collect())
        }
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl SynthesisProgressCallback for Events {
        fn on_synthesis_start(&self, total: usize) {
            self.0.lock().unwrap().push(format!("start {total}"));
        }
        fn on_segment_start(&self, index: usize, _: usize, speaker: &str) {
            self.0.lock().unwrap().push(format!("seg {index} {speaker}"));
        }
        fn on_segment_complete(&self, index: usize, _: usize, len: usize) {
            self.0.lock().unwrap().push(format!("done {index} {len}"));
        }
        fn on_segment_skipped(&self, index: usize, _: usize, _: &str) {
            self.0.lock().unwrap().push(format!("skip {index}"));
        }
        fn on_synthesis_complete(&self, total: usize, ok: usize) {
            self.0.lock().unwrap().push(format!("end {ok}/{total}"));
        }
    }

    fn assembler(progress: Option<ProgressCallback>) -> (AudioAssembler, Arc<Echo>) {
        let echo = Arc::new(Echo {
            calls: Mutex::new(Vec::new()),
        });
        let synth = VoiceSynthesizer::new(echo.clone(), None, 100);
        (AudioAssembler::new(synth, progress), echo)
    }

    #[tokio::test]
    async fn chunks_concatenate_in_segment_order() {
        let (asm, echo) = assembler(None);
        let out = asm
            .assemble("Host: aaa\nGuest: bbb\nccc", SpeedHint::NORMAL)
            .await
            .unwrap();
        assert_eq!(out.bytes.len(), 600);
        assert!(out.bytes[..200].iter().all(|&b| b == b'a'));
        assert!(out.bytes[200..400].iter().all(|&b| b == b'b'));
        assert!(out.bytes[400..].iter().all(|&b| b == b'c'));
        assert_eq!(*echo.calls.lock().unwrap(), vec!["aaa", "bbb", "ccc"]);
        assert_eq!(out.stats.primary_hits, 3);
        assert_eq!(out.stats.total_bytes, 600);
    }

    #[tokio::test]
    async fn skipped_segments_are_dropped_and_reported() {
        let events = Arc::new(Events::default());
        let (asm, _) = assembler(Some(events.clone()));
        let out = asm
            .assemble("Host: one\nGuest: FAIL\nHost: three", SpeedHint::NORMAL)
            .await
            .unwrap();
        assert_eq!(out.bytes.len(), 400);
        assert_eq!(out.stats.skipped, 1);
        assert_eq!(out.skipped[0].index, 1);
        assert_eq!(
            *events.0.lock().unwrap(),
            vec![
                "start 3",
                "seg 0 host",
                "done 0 200",
                "seg 1 guest",
                "skip 1",
                "seg 2 host",
                "done 2 200",
                "end 2/3",
            ]
        );
    }

    #[tokio::test]
    async fn empty_script_has_no_segments() {
        let (asm, echo) = assembler(None);
        let err = asm.assemble("\n  \nHost:\n", SpeedHint::NORMAL).await.unwrap_err();
        assert!(matches!(err, Doc2CastError::NoSegments));
        assert!(echo.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn all_skipped_is_no_audio() {
        let (asm, _) = assembler(None);
        let err = asm
            .assemble("Host: FAIL one\nGuest: FAIL two", SpeedHint::NORMAL)
            .await
            .unwrap_err();
        match err {
            Doc2CastError::NoAudioProduced { segments, first_error } => {
                assert_eq!(segments, 2);
                assert!(first_error.contains("Segment 0"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
