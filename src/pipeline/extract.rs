//! Text extraction: text layer first, OCR over embedded images second.
//!
//! Extraction runs in two passes over a [`DocumentScan`]:
//!
//! 1. every non-empty text-layer fragment (PDF page text, PPTX shape text)
//!    in page / slide order;
//! 2. every embedded image, OCR'd in page / slide then image order.
//!
//! All pass-1 output precedes all pass-2 output. The two passes are not
//! interleaved by page: OCR text from page 1 lands after layer text from the
//! last page.
//!
//! A failure on one image (decode error, OCR error) is logged and skipped.

use crate::document::{Document, DocumentKind};
use crate::error::Doc2CastError;
use crate::output::{ExtractedText, ExtractionStats};
use crate::pipeline::encode::is_ocr_candidate;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::{pdf, pptx};
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One image found inside a page or slide.
#[derive(Debug)]
pub struct EmbeddedImage {
    /// 1-based page or slide number.
    pub unit: usize,
    /// 1-based image number within the unit.
    pub index: usize,
    /// The decoded image, or why it could not be decoded.
    pub image: Result<DynamicImage, String>,
}

impl EmbeddedImage {
    pub fn location(&self, kind: DocumentKind) -> String {
        let unit = match kind {
            DocumentKind::Pdf => "page",
            DocumentKind::Pptx => "slide",
        };
        format!("{} {} image {}", unit, self.unit, self.index)
    }
}

/// Everything a format scanner found, before OCR.
#[derive(Debug)]
pub struct DocumentScan {
    pub kind: DocumentKind,
    /// Pages or slides.
    pub units: usize,
    /// Text-layer fragments in encounter order.
    pub text_fragments: Vec<String>,
    /// Embedded images in encounter order. Empty when OCR is disabled.
    pub images: Vec<EmbeddedImage>,
}

/// Which passes produced a piece of text.
///
/// Layer-only text is missing whatever the images carried, so it is cached
/// apart from full text and never served in its place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExtractionMode {
    /// Text layer plus OCR over embedded images.
    #[default]
    Full,
    /// Text layer only.
    LayerOnly,
}

/// Extracts plain text from PDF and PPTX documents.
pub struct TextExtractor {
    ocr: Option<Arc<dyn OcrEngine>>,
    pdfium_lib_path: Option<PathBuf>,
}

impl TextExtractor {
    /// `ocr = None` disables the image pass entirely.
    pub fn new(ocr: Option<Arc<dyn OcrEngine>>, pdfium_lib_path: Option<PathBuf>) -> Self {
        Self {
            ocr,
            pdfium_lib_path,
        }
    }

    pub fn mode(&self) -> ExtractionMode {
        match self.ocr {
            Some(_) => ExtractionMode::Full,
            None => ExtractionMode::LayerOnly,
        }
    }

    /// Extract the text of `document`.
    ///
    /// # Errors
    /// - `CorruptDocument` if the container cannot be opened
    /// - `PdfiumBindingFailed` if no pdfium library is available (PDF only)
    /// - `NoTextFound` if both passes produced nothing
    pub async fn extract(&self, document: &Document) -> Result<ExtractedText, Doc2CastError> {
        let start = Instant::now();
        let collect_images = self.ocr.is_some();
        info!(
            "Extracting text from {} '{}' ({} bytes, ocr={})",
            document.kind(),
            document.name(),
            document.len(),
            collect_images
        );

        let bytes = document.bytes().to_vec();
        let name = document.name().to_string();
        let scan = match document.kind() {
            DocumentKind::Pdf => {
                pdf::scan_pdf(bytes, name, self.pdfium_lib_path.clone(), collect_images).await?
            }
            DocumentKind::Pptx => pptx::scan_pptx(bytes, name, collect_images).await?,
        };

        let extracted = self.extract_from_scan(scan, document.name()).await?;
        info!(
            "Extracted {} chars from '{}' in {}ms ({} fragments, {}/{} images recognised)",
            extracted.text.chars().count(),
            document.name(),
            start.elapsed().as_millis(),
            extracted.stats.text_fragments,
            extracted.stats.images_recognised,
            extracted.stats.images_found
        );
        Ok(extracted)
    }

    /// Run both passes over an existing scan.
    pub async fn extract_from_scan(
        &self,
        scan: DocumentScan,
        name: &str,
    ) -> Result<ExtractedText, Doc2CastError> {
        let mut stats = ExtractionStats {
            units: scan.units,
            images_found: scan.images.len(),
            ..Default::default()
        };
        let mut parts: Vec<String> = Vec::new();

        // ── Pass 1: text layer ───────────────────────────────────────────
        for fragment in scan.text_fragments {
            if !fragment.trim().is_empty() {
                parts.push(fragment);
                stats.text_fragments += 1;
            }
        }

        // ── Pass 2: OCR ──────────────────────────────────────────────────
        if let Some(ocr) = &self.ocr {
            for embedded in &scan.images {
                let location = embedded.location(scan.kind);
                let image = match &embedded.image {
                    Ok(img) => img,
                    Err(e) => {
                        warn!("Skipping {}: {}", location, e);
                        stats.images_skipped += 1;
                        continue;
                    }
                };
                if !is_ocr_candidate(image) {
                    debug!("Skipping {}: {}x{} too small", location, image.width(), image.height());
                    stats.images_skipped += 1;
                    continue;
                }
                match ocr.recognize(image, &location).await {
                    Ok(text) if !text.trim().is_empty() => {
                        debug!("OCR {}: {} chars", location, text.len());
                        parts.push(text);
                        stats.images_recognised += 1;
                    }
                    Ok(_) => {
                        debug!("OCR {}: no text", location);
                        stats.images_skipped += 1;
                    }
                    Err(e) => {
                        warn!("Skipping {}: {}", location, e);
                        stats.images_skipped += 1;
                    }
                }
            }
        }

        let text = parts.join("\n");
        if text.trim().is_empty() {
            return Err(Doc2CastError::NoTextFound {
                name: name.to_string(),
            });
        }

        Ok(ExtractedText { text, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns the image width as text, or fails for width 13.
    struct WidthOcr {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl OcrEngine for WidthOcr {
        async fn recognize(
            &self,
            image: &DynamicImage,
            location: &str,
        ) -> Result<String, OcrError> {
            self.seen.lock().unwrap().push(location.to_string());
            if image.width() == 13 {
                return Err(OcrError::Engine {
                    retries: 0,
                    detail: "boom".into(),
                });
            }
            Ok(format!("ocr-{}", image.width()))
        }
    }

    fn img(width: u32) -> Result<DynamicImage, String> {
        Ok(DynamicImage::new_rgb8(width, 16))
    }

    fn extractor() -> (TextExtractor, Arc<WidthOcr>) {
        let ocr = Arc::new(WidthOcr {
            seen: Mutex::new(Vec::new()),
        });
        (TextExtractor::new(Some(ocr.clone()), None), ocr)
    }

    #[test]
    fn mode_follows_ocr_engine() {
        let (ex, _) = extractor();
        assert_eq!(ex.mode(), ExtractionMode::Full);
        assert_eq!(TextExtractor::new(None, None).mode(), ExtractionMode::LayerOnly);
    }

    #[tokio::test]
    async fn layer_text_precedes_ocr_text_across_pages() {
        let (ex, _) = extractor();
        let scan = DocumentScan {
            kind: DocumentKind::Pdf,
            units: 2,
            text_fragments: vec!["page one".into(), "page two".into()],
            images: vec![
                EmbeddedImage { unit: 1, index: 1, image: img(20) },
                EmbeddedImage { unit: 2, index: 1, image: img(30) },
            ],
        };
        let out = ex.extract_from_scan(scan, "doc.pdf").await.unwrap();
        assert_eq!(out.text, "page one\npage two\nocr-20\nocr-30");
        assert_eq!(out.stats.text_fragments, 2);
        assert_eq!(out.stats.images_recognised, 2);
    }

    #[tokio::test]
    async fn image_only_pdf_yields_exactly_ocr_text() {
        let (ex, _) = extractor();
        let scan = DocumentScan {
            kind: DocumentKind::Pdf,
            units: 1,
            text_fragments: vec![String::new()],
            images: vec![EmbeddedImage { unit: 1, index: 1, image: img(40) }],
        };
        let out = ex.extract_from_scan(scan, "scan.pdf").await.unwrap();
        assert_eq!(out.text, "ocr-40");
        assert_eq!(out.stats.text_fragments, 0);
    }

    #[tokio::test]
    async fn failing_images_are_skipped_not_fatal() {
        let (ex, ocr) = extractor();
        let scan = DocumentScan {
            kind: DocumentKind::Pptx,
            units: 3,
            text_fragments: vec!["title".into()],
            images: vec![
                EmbeddedImage { unit: 1, index: 1, image: Err("unsupported emf".into()) },
                EmbeddedImage { unit: 2, index: 1, image: img(13) },
                EmbeddedImage { unit: 3, index: 2, image: img(50) },
            ],
        };
        let out = ex.extract_from_scan(scan, "deck.pptx").await.unwrap();
        assert_eq!(out.text, "title\nocr-50");
        assert_eq!(out.stats.images_skipped, 2);
        assert_eq!(
            *ocr.seen.lock().unwrap(),
            vec!["slide 2 image 1".to_string(), "slide 3 image 2".to_string()]
        );
    }

    #[tokio::test]
    async fn nothing_found_is_an_error() {
        let (ex, _) = extractor();
        let scan = DocumentScan {
            kind: DocumentKind::Pdf,
            units: 1,
            text_fragments: vec!["  \n ".into()],
            images: vec![],
        };
        let err = ex.extract_from_scan(scan, "blank.pdf").await.unwrap_err();
        assert!(matches!(err, Doc2CastError::NoTextFound { .. }));
    }

    #[tokio::test]
    async fn ocr_disabled_ignores_images() {
        let ex = TextExtractor::new(None, None);
        let scan = DocumentScan {
            kind: DocumentKind::Pdf,
            units: 1,
            text_fragments: vec!["layer".into()],
            images: vec![EmbeddedImage { unit: 1, index: 1, image: img(40) }],
        };
        let out = ex.extract_from_scan(scan, "doc.pdf").await.unwrap();
        assert_eq!(out.text, "layer");
        assert_eq!(out.stats.images_recognised, 0);
    }
}
