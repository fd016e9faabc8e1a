//! Image encoding for OCR: `DynamicImage` → base64 PNG `ImageData`.
//!
//! Embedded images come in whatever size the author pasted, from icons to
//! full-resolution photos. Very large images are scaled down so their longest
//! edge fits [`MAX_OCR_EDGE`] before encoding; PNG keeps glyph edges crisp.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{imageops::FilterType, DynamicImage};
use std::io::Cursor;
use tracing::debug;

/// Longest edge, in pixels, of an image sent to the OCR model.
pub const MAX_OCR_EDGE: u32 = 2000;

/// Images smaller than this on either edge cannot hold legible text.
pub const MIN_OCR_EDGE: u32 = 8;

/// Whether an image is worth an OCR call at all.
pub fn is_ocr_candidate(img: &DynamicImage) -> bool {
    img.width() >= MIN_OCR_EDGE && img.height() >= MIN_OCR_EDGE
}

/// Encode an embedded image as a base64 PNG ready for the vision API.
pub fn encode_for_ocr(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let scaled;
    let img = if img.width().max(img.height()) > MAX_OCR_EDGE {
        scaled = img.resize(MAX_OCR_EDGE, MAX_OCR_EDGE, FilterType::Triangle);
        debug!(
            "Scaled {}x{} image to {}x{} for OCR",
            img.width(),
            img.height(),
            scaled.width(),
            scaled.height()
        );
        &scaled
    } else {
        img
    };

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
