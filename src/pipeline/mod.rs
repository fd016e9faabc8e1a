//! Pipeline stages for document-to-podcast generation.
//!
//! Each submodule implements one step and can be driven on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pdf / pptx ──▶ extract ──▶ generate ──▶ segment ──▶ voice ──▶ assemble
//! (path/URL)  (scan)      (+ ocr)     (LLM)       (lines)     (TTS)     (concat)
//! ```
//!
//! 1. [`input`]    — load a path or URL into a [`crate::Document`]
//! 2. [`pdf`], [`pptx`] — pull text-layer fragments and embedded images
//! 3. [`extract`]  — order layer text before OCR text; [`ocr`] and [`encode`]
//!    turn images into text via a vision model
//! 4. [`generate`] — script and quiz prompts over [`llm`]'s retry driver
//! 5. [`segment`]  — split the script into speaker-tagged lines
//! 6. [`voice`]    — synthesize one line, primary then fallback provider
//! 7. [`assemble`] — voice every line in order and concatenate the audio

pub mod assemble;
pub mod encode;
pub mod extract;
pub mod generate;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod pdf;
pub mod pptx;
pub mod segment;
pub mod voice;
