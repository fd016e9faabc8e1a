//! PPTX scanning: shape text and picture bytes straight out of the OOXML zip.
//!
//! A `.pptx` is a zip of XML parts. Only a handful matter here:
//!
//! ```text
//! ppt/presentation.xml             <p:sldId r:id="rId2"/> … (slide order)
//! ppt/_rels/presentation.xml.rels  rId2 → slides/slide1.xml
//! ppt/slides/slideN.xml            <p:sp> text shapes, <p:pic> pictures
//! ppt/slides/_rels/slideN.xml.rels rId3 → ../media/image1.png
//! ```
//!
//! Shapes nested in groups are read like top-level shapes. Content inside
//! `mc:AlternateContent` is read from its `mc:Choice` only; the
//! `mc:Fallback` copy is dropped before scanning. If the
//! presentation part is missing or unusable, slides are taken in numeric
//! file order.

use crate::document::DocumentKind;
use crate::error::Doc2CastError;
use crate::pipeline::extract::{DocumentScan, EmbeddedImage};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tracing::{debug, info, warn};
use zip::ZipArchive;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";

static RE_SLIDE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<p:sldId\b[^>]*\br:id="([^"]+)""#).unwrap());
static RE_RELATIONSHIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<Relationship\b[^>]*>").unwrap());
static RE_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\b(Id|Target)="([^"]*)""#).unwrap());
static RE_SLIDE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").unwrap());
static RE_MC_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<mc:Fallback\b[^>]*?(?:/>|>.*?</mc:Fallback>)").unwrap()
});
static RE_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<p:sp\b.*?</p:sp>").unwrap());
static RE_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<a:p(?:\s[^>]*)?(?:/>|>(.*?)</a:p>)").unwrap());
static RE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<a:br\b[^>]*>|<a:t(?:\s[^>]*)?>(.*?)</a:t>").unwrap());
static RE_PICTURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<p:pic\b.*?</p:pic>").unwrap());
static RE_EMBED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\br:embed="([^"]+)""#).unwrap());
static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(lt|gt|amp|quot|apos|#[0-9]+|#x[0-9a-fA-F]+);").unwrap());

/// Scan a PPTX held in memory.
pub async fn scan_pptx(
    bytes: Vec<u8>,
    name: String,
    collect_images: bool,
) -> Result<DocumentScan, Doc2CastError> {
    tokio::task::spawn_blocking(move || scan_pptx_blocking(bytes, &name, collect_images))
        .await
        .map_err(|e| Doc2CastError::Internal(format!("PPTX scan task panicked: {}", e)))?
}

/// Blocking PPTX scan.
pub fn scan_pptx_blocking(
    bytes: Vec<u8>,
    name: &str,
    collect_images: bool,
) -> Result<DocumentScan, Doc2CastError> {
    let corrupt = |detail: String| Doc2CastError::CorruptDocument {
        name: name.to_string(),
        kind: DocumentKind::Pptx.as_str(),
        detail,
    };

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| corrupt(e.to_string()))?;

    let slides = slide_parts(&mut archive);
    if slides.is_empty() && read_entry(&mut archive, PRESENTATION_PART).is_none() {
        return Err(corrupt("no ppt/presentation.xml and no slides".into()));
    }
    info!("PPTX loaded: {} slides", slides.len());

    let mut text_fragments = Vec::new();
    let mut images = Vec::new();

    for (idx, part) in slides.iter().enumerate() {
        let slide_no = idx + 1;
        let Some(xml) = read_entry(&mut archive, part) else {
            warn!("Slide {}: part {} missing", slide_no, part);
            continue;
        };
        let xml = RE_MC_FALLBACK.replace_all(&xml, "");

        for shape in RE_SHAPE.find_iter(&xml) {
            let text = shape_text(shape.as_str());
            if !text.trim().is_empty() {
                text_fragments.push(text);
            }
        }

        if !collect_images {
            continue;
        }

        let rels = read_entry(&mut archive, &rels_part_for(part))
            .map(|r| relationships(&r))
            .unwrap_or_default();
        let base_dir = parent_dir(part);

        for (pic_idx, picture) in RE_PICTURE.find_iter(&xml).enumerate() {
            let image = match RE_EMBED.captures(picture.as_str()) {
                None => Err("picture has no embedded image".to_string()),
                Some(caps) => match rels.get(&caps[1]) {
                    None => Err(format!("unresolved relationship {}", &caps[1])),
                    Some(target) => {
                        let media = resolve_part(base_dir, target);
                        read_bytes(&mut archive, &media)
                            .ok_or_else(|| format!("missing media part {}", media))
                            .and_then(|b| image::load_from_memory(&b).map_err(|e| e.to_string()))
                    }
                },
            };
            if let Ok(img) = &image {
                debug!(
                    "Slide {} image {}: {}x{} px",
                    slide_no,
                    pic_idx + 1,
                    img.width(),
                    img.height()
                );
            }
            images.push(EmbeddedImage {
                unit: slide_no,
                index: pic_idx + 1,
                image,
            });
        }
    }

    Ok(DocumentScan {
        kind: DocumentKind::Pptx,
        units: slides.len(),
        text_fragments,
        images,
    })
}

/// Slide part names in presentation order.
fn slide_parts<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> Vec<String> {
    if let (Some(pres), Some(rels)) = (
        read_entry(archive, PRESENTATION_PART),
        read_entry(archive, PRESENTATION_RELS),
    ) {
        let rels = relationships(&rels);
        let ordered: Vec<String> = RE_SLIDE_ID
            .captures_iter(&pres)
            .filter_map(|c| rels.get(&c[1]))
            .map(|target| resolve_part("ppt", target))
            .collect();
        if !ordered.is_empty() {
            return ordered;
        }
        debug!("presentation.xml lists no slides; falling back to file order");
    }

    let mut numbered: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|n| {
            let num = RE_SLIDE_FILE.captures(n)?.get(1)?.as_str().parse().ok()?;
            Some((num, n.to_string()))
        })
        .collect();
    numbered.sort();
    numbered.into_iter().map(|(_, n)| n).collect()
}

/// `Id → Target` map of a `.rels` part.
fn relationships(xml: &str) -> HashMap<String, String> {
    RE_RELATIONSHIP
        .find_iter(xml)
        .filter_map(|m| {
            let mut id = None;
            let mut target = None;
            for caps in RE_ATTR.captures_iter(m.as_str()) {
                match &caps[1] {
                    "Id" => id = Some(caps[2].to_string()),
                    _ => target = Some(caps[2].to_string()),
                }
            }
            Some((id?, target?))
        })
        .collect()
}

/// Text of one `<p:sp>`: paragraphs joined by newlines, runs concatenated.
fn shape_text(shape_xml: &str) -> String {
    RE_PARAGRAPH
        .captures_iter(shape_xml)
        .map(|p| {
            let Some(body) = p.get(1) else {
                return String::new();
            };
            let mut line = String::new();
            for run in RE_RUN.captures_iter(body.as_str()) {
                match run.get(1) {
                    Some(t) => line.push_str(&unescape_xml(t.as_str())),
                    None => line.push('\n'),
                }
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode the predefined XML entities and numeric character references.
fn unescape_xml(s: &str) -> String {
    RE_ENTITY
        .replace_all(s, |caps: &Captures| match &caps[1] {
            "lt" => "<".to_string(),
            "gt" => ">".to_string(),
            "amp" => "&".to_string(),
            "quot" => "\"".to_string(),
            "apos" => "'".to_string(),
            num => {
                let code = match num.strip_prefix("#x") {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num[1..].parse().ok(),
                };
                code.and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string())
            }
        })
        .into_owned()
}

fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

fn parent_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_part(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn read_bytes<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<Vec<u8>> {
    let mut entry = archive.by_name(name).ok()?;
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf).ok()?;
    Some(buf)
}

fn read_entry<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<String> {
    read_bytes(archive, name).map(|b| String::from_utf8_lossy(&b).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn build_zip(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, data) in entries {
            zip.start_file(*name, opts).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn slide_xml(body: &str) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0"?><p:sld xmlns:a="a" xmlns:p="p" xmlns:r="r"><p:cSld><p:spTree>{body}</p:spTree></p:cSld></p:sld>"#
        )
        .into_bytes()
    }

    fn text_shape(paragraphs: &[&str]) -> String {
        let paras: String = paragraphs
            .iter()
            .map(|p| format!("<a:p><a:pPr/><a:r><a:rPr lang=\"en\"/><a:t>{p}</a:t></a:r></a:p>"))
            .collect();
        format!("<p:sp><p:nvSpPr/><p:spPr/><p:txBody><a:bodyPr/>{paras}</p:txBody></p:sp>")
    }

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(32, 32, Rgba([1, 2, 3, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn presentation(order: &[&str]) -> Vec<(&'static str, Vec<u8>)> {
        let ids: String = order
            .iter()
            .enumerate()
            .map(|(i, _)| format!(r#"<p:sldId id="{}" r:id="rIdS{}"/>"#, 256 + i, i))
            .collect();
        let rels: String = order
            .iter()
            .enumerate()
            .map(|(i, target)| {
                format!(r#"<Relationship Id="rIdS{i}" Type="slide" Target="{target}"/>"#)
            })
            .collect();
        vec![
            (
                PRESENTATION_PART,
                format!("<p:presentation><p:sldIdLst>{ids}</p:sldIdLst></p:presentation>")
                    .into_bytes(),
            ),
            (
                PRESENTATION_RELS,
                format!("<Relationships>{rels}</Relationships>").into_bytes(),
            ),
        ]
    }

    #[test]
    fn slides_follow_presentation_order() {
        let mut entries = presentation(&["slides/slide2.xml", "slides/slide1.xml"]);
        entries.push(("ppt/slides/slide1.xml", slide_xml(&text_shape(&["second"]))));
        entries.push(("ppt/slides/slide2.xml", slide_xml(&text_shape(&["first"]))));

        let scan = scan_pptx_blocking(build_zip(&entries), "deck.pptx", false).unwrap();
        assert_eq!(scan.units, 2);
        assert_eq!(scan.text_fragments, vec!["first", "second"]);
    }

    #[test]
    fn numeric_file_order_without_presentation_part() {
        let entries = vec![
            ("ppt/slides/slide10.xml", slide_xml(&text_shape(&["ten"]))),
            ("ppt/slides/slide2.xml", slide_xml(&text_shape(&["two"]))),
        ];
        let scan = scan_pptx_blocking(build_zip(&entries), "deck.pptx", false).unwrap();
        assert_eq!(scan.text_fragments, vec!["two", "ten"]);
    }

    #[test]
    fn shape_paragraphs_and_entities() {
        let xml = text_shape(&["Q&amp;A &lt;live&gt;", "caf&#233; &#x263A;"]);
        assert_eq!(shape_text(&xml), "Q&A <live>\ncafé ☺");
    }

    #[test]
    fn runs_concatenate_and_breaks_become_newlines() {
        let xml = "<p:sp><p:txBody><a:p><a:r><a:t>Hel</a:t></a:r><a:r><a:t xml:space=\"preserve\">lo </a:t></a:r><a:br/><a:r><a:t>world</a:t></a:r></a:p><a:p/></p:txBody></p:sp>";
        assert_eq!(shape_text(xml), "Hello \nworld\n");
    }

    #[test]
    fn grouped_shapes_are_read() {
        let body = format!("<p:grpSp><p:grpSpPr/>{}</p:grpSp>", text_shape(&["inside group"]));
        let mut entries = presentation(&["slides/slide1.xml"]);
        entries.push(("ppt/slides/slide1.xml", slide_xml(&body)));
        let scan = scan_pptx_blocking(build_zip(&entries), "deck.pptx", false).unwrap();
        assert_eq!(scan.text_fragments, vec!["inside group"]);
    }

    #[test]
    fn pictures_resolve_through_slide_rels() {
        let pic = r#"<p:pic><p:nvPicPr/><p:blipFill><a:blip r:embed="rId7"/></p:blipFill></p:pic>"#;
        let broken = r#"<p:pic><p:blipFill><a:blip r:embed="rId9"/></p:blipFill></p:pic>"#;
        let mut entries = presentation(&["slides/slide1.xml"]);
        entries.push((
            "ppt/slides/slide1.xml",
            slide_xml(&format!("{}{}{}", text_shape(&["chart"]), pic, broken)),
        ));
        entries.push((
            "ppt/slides/_rels/slide1.xml.rels",
            br#"<Relationships><Relationship Target="../media/image1.png" Id="rId7" Type="image"/></Relationships>"#
                .to_vec(),
        ));
        entries.push(("ppt/media/image1.png", png_bytes()));

        let scan = scan_pptx_blocking(build_zip(&entries), "deck.pptx", true).unwrap();
        assert_eq!(scan.images.len(), 2);
        let first = scan.images[0].image.as_ref().unwrap();
        assert_eq!((first.width(), first.height()), (32, 32));
        assert!(scan.images[1].image.is_err());
        assert_eq!(scan.images[1].index, 2);
    }

    #[test]
    fn alternate_content_is_read_once() {
        let pic = r#"<p:pic><p:blipFill><a:blip r:embed="rId7"/></p:blipFill></p:pic>"#;
        let shape = text_shape(&["Formula"]);
        let body = format!(
            "<mc:AlternateContent xmlns:mc=\"mc\">\
             <mc:Choice Requires=\"a14\">{shape}{pic}</mc:Choice>\
             <mc:Fallback>{shape}{pic}</mc:Fallback>\
             </mc:AlternateContent>{}",
            text_shape(&["after"])
        );
        let mut entries = presentation(&["slides/slide1.xml"]);
        entries.push(("ppt/slides/slide1.xml", slide_xml(&body)));
        entries.push((
            "ppt/slides/_rels/slide1.xml.rels",
            br#"<Relationships><Relationship Id="rId7" Type="image" Target="../media/image1.png"/></Relationships>"#
                .to_vec(),
        ));
        entries.push(("ppt/media/image1.png", png_bytes()));

        let scan = scan_pptx_blocking(build_zip(&entries), "deck.pptx", true).unwrap();
        assert_eq!(scan.text_fragments, vec!["Formula", "after"]);
        assert_eq!(scan.images.len(), 1);
    }

    #[test]
    fn empty_fallback_is_dropped() {
        let xml = "<mc:Fallback/><p:sp>kept</p:sp><mc:Fallback><p:sp>gone</p:sp></mc:Fallback>";
        assert_eq!(RE_MC_FALLBACK.replace_all(xml, ""), "<p:sp>kept</p:sp>");
    }

    #[test]
    fn images_ignored_when_not_collected() {
        let pic = r#"<p:pic><p:blipFill><a:blip r:embed="rId7"/></p:blipFill></p:pic>"#;
        let mut entries = presentation(&["slides/slide1.xml"]);
        entries.push(("ppt/slides/slide1.xml", slide_xml(pic)));
        let scan = scan_pptx_blocking(build_zip(&entries), "deck.pptx", false).unwrap();
        assert!(scan.images.is_empty());
        assert!(scan.text_fragments.is_empty());
    }

    #[test]
    fn non_zip_is_corrupt() {
        let err = scan_pptx_blocking(b"PK\x03\x04garbage".to_vec(), "bad.pptx", false).unwrap_err();
        assert!(matches!(err, Doc2CastError::CorruptDocument { .. }));
    }

    #[test]
    fn part_resolution() {
        assert_eq!(resolve_part("ppt/slides", "../media/image1.png"), "ppt/media/image1.png");
        assert_eq!(resolve_part("ppt", "slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(resolve_part("ppt/slides", "/ppt/media/a.png"), "ppt/media/a.png");
        assert_eq!(rels_part_for("ppt/slides/slide4.xml"), "ppt/slides/_rels/slide4.xml.rels");
    }
}
