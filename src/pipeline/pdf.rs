//! PDF scanning via pdfium: per-page text layer plus embedded image objects.
//!
//! pdfium keeps thread-local state and every call is blocking, so the whole
//! scan runs inside `tokio::task::spawn_blocking`.
//!
//! ## Library binding
//!
//! The pdfium shared library is bound in this order:
//!
//! 1. the explicit `pdfium_lib_path` from the config, if set;
//! 2. the platform library name in the working directory (`./libpdfium.so`, …);
//! 3. the system library search path.
//!
//! Images drawn through form XObjects are collected too, in content order,
//! and numbered together with the page's direct images.

use crate::document::DocumentKind;
use crate::error::Doc2CastError;
use crate::pipeline::extract::{DocumentScan, EmbeddedImage};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Form XObjects nested deeper than this are not searched for images.
const MAX_FORM_DEPTH: usize = 8;

/// Scan a PDF held in memory.
///
/// `collect_images = false` skips decoding image objects entirely.
pub async fn scan_pdf(
    bytes: Vec<u8>,
    name: String,
    lib_path: Option<PathBuf>,
    collect_images: bool,
) -> Result<DocumentScan, Doc2CastError> {
    tokio::task::spawn_blocking(move || {
        scan_pdf_blocking(&bytes, &name, lib_path.as_deref(), collect_images)
    })
    .await
    .map_err(|e| Doc2CastError::Internal(format!("PDF scan task panicked: {}", e)))?
}

/// Bind the pdfium library, trying each location in turn.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, Doc2CastError> {
    let bindings = match lib_path {
        Some(path) => Pdfium::bind_to_library(path).map_err(|e| {
            Doc2CastError::PdfiumBindingFailed(format!("{}: {:?}", path.display(), e))
        })?,
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| Doc2CastError::PdfiumBindingFailed(format!("{:?}", e)))?,
    };
    Ok(Pdfium::new(bindings))
}

fn scan_pdf_blocking(
    bytes: &[u8],
    name: &str,
    lib_path: Option<&Path>,
    collect_images: bool,
) -> Result<DocumentScan, Doc2CastError> {
    let pdfium = bind_pdfium(lib_path)?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| Doc2CastError::CorruptDocument {
            name: name.to_string(),
            kind: DocumentKind::Pdf.as_str(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut text_fragments = Vec::with_capacity(total_pages);
    let mut images = Vec::new();

    for (idx, page) in pages.iter().enumerate() {
        let page_no = idx + 1;

        match page.text() {
            Ok(text) => text_fragments.push(text.all()),
            Err(e) => warn!("Page {}: text layer unreadable: {:?}", page_no, e),
        }

        if !collect_images {
            continue;
        }

        let mut found = Vec::new();
        for object in page.objects().iter() {
            self::collect_images(&object, 0, &mut found);
        }
        for (idx, image) in found.into_iter().enumerate() {
            let image_no = idx + 1;
            if let Ok(img) = &image {
                debug!(
                    "Page {} image {}: {}x{} px",
                    page_no,
                    image_no,
                    img.width(),
                    img.height()
                );
            }
            images.push(EmbeddedImage {
                unit: page_no,
                index: image_no,
                image,
            });
        }
    }

    Ok(DocumentScan {
        kind: DocumentKind::Pdf,
        units: total_pages,
        text_fragments,
        images,
    })
}

/// Push every image under `object`, descending into form XObjects.
fn collect_images(
    object: &PdfPageObject<'_>,
    depth: usize,
    found: &mut Vec<Result<image::DynamicImage, String>>,
) {
    if let Some(image_object) = object.as_image_object() {
        found.push(image_object.get_raw_image().map_err(|e| format!("{:?}", e)));
    } else if let Some(form) = object.as_x_object_form_object() {
        if depth >= MAX_FORM_DEPTH {
            warn!("Form XObject nested over {} levels; not descending", MAX_FORM_DEPTH);
            return;
        }
        for child in form.iter() {
            collect_images(&child, depth + 1, found);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_library_fails_to_bind() {
        match bind_pdfium(Some(Path::new("/nonexistent/libpdfium.so"))) {
            Err(Doc2CastError::PdfiumBindingFailed(msg)) => assert!(msg.contains("/nonexistent")),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("bound a library that does not exist"),
        }
    }

    fn stream(dict: &str, data: &str) -> String {
        format!("<< {dict} /Length {} >>\nstream\n{data}\nendstream", data.len())
    }

    /// Serialise numbered objects (1-based, object 1 is the catalog) with a
    /// valid xref table.
    fn build_pdf(objects: &[String]) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = out.len();
        let size = objects.len() + 1;
        out.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        let trailer =
            format!("trailer\n<< /Size {size} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n");
        out.extend_from_slice(trailer.as_bytes());
        out
    }

    /// One page: a form XObject wrapping a 2x2 image, then a 3x1 image
    /// drawn directly.
    fn page_with_form_image() -> Vec<u8> {
        let objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] \
             /Resources << /XObject << /Fm1 5 0 R /Im2 7 0 R >> >> /Contents 4 0 R >>"
                .to_string(),
            stream("", "q /Fm1 Do Q q 30 0 0 10 60 60 cm /Im2 Do Q"),
            stream(
                "/Type /XObject /Subtype /Form /BBox [0 0 100 100] \
                 /Resources << /XObject << /Im1 6 0 R >> >>",
                "q 50 0 0 50 10 10 cm /Im1 Do Q",
            ),
            stream(
                "/Type /XObject /Subtype /Image /Width 2 /Height 2 /ColorSpace /DeviceRGB \
                 /BitsPerComponent 8 /Filter /ASCIIHexDecode",
                "FF000000FF000000FFFFFFFF>",
            ),
            stream(
                "/Type /XObject /Subtype /Image /Width 3 /Height 1 /ColorSpace /DeviceRGB \
                 /BitsPerComponent 8 /Filter /ASCIIHexDecode",
                "000000808080FFFFFF>",
            ),
        ];
        build_pdf(&objects)
    }

    #[test]
    fn images_inside_form_xobjects_are_collected() {
        let scan = match scan_pdf_blocking(&page_with_form_image(), "forms.pdf", None, true) {
            Err(Doc2CastError::PdfiumBindingFailed(_)) => {
                println!("SKIP — no pdfium library available");
                return;
            }
            other => other.unwrap(),
        };
        assert_eq!(scan.units, 1);
        assert_eq!(scan.images.len(), 2);

        let nested = scan.images[0].image.as_ref().unwrap();
        assert_eq!((nested.width(), nested.height()), (2, 2));
        let direct = scan.images[1].image.as_ref().unwrap();
        assert_eq!((direct.width(), direct.height()), (3, 1));
        assert_eq!(
            scan.images.iter().map(|i| (i.unit, i.index)).collect::<Vec<_>>(),
            vec![(1, 1), (1, 2)]
        );
    }

    #[test]
    fn form_images_skipped_when_not_collected() {
        match scan_pdf_blocking(&page_with_form_image(), "forms.pdf", None, false) {
            Err(Doc2CastError::PdfiumBindingFailed(_)) => println!("SKIP — no pdfium library"),
            other => assert!(other.unwrap().images.is_empty()),
        }
    }
}
