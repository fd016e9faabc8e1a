//! The immutable input unit: document bytes, declared kind, content hash.

use crate::error::Doc2CastError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// The two document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Pptx,
}

impl DocumentKind {
    /// Parse a declared extension (`"pdf"`, `".PPTX"`, …).
    pub fn from_extension(ext: &str) -> Result<Self, Doc2CastError> {
        match ext.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "pptx" => Ok(DocumentKind::Pptx),
            other => Err(Doc2CastError::UnsupportedFormat {
                extension: other.to_string(),
            }),
        }
    }

    /// Infer the kind from a file name or URL path.
    pub fn from_path(path: &Path) -> Result<Self, Doc2CastError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Pptx => "pptx",
        }
    }

    fn magic(self) -> &'static [u8] {
        match self {
            DocumentKind::Pdf => b"%PDF",
            DocumentKind::Pptx => b"PK\x03\x04",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SHA-256 of the document bytes, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        ContentHash(format!("{:x}", Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An uploaded document. Immutable once constructed.
#[derive(Clone)]
pub struct Document {
    name: String,
    kind: DocumentKind,
    bytes: Vec<u8>,
    hash: ContentHash,
}

impl Document {
    /// Build a document from in-memory bytes and a declared extension.
    ///
    /// Fails with `UnsupportedFormat` for anything but pdf/pptx and with
    /// `NotADocument` when the bytes do not carry the format's signature.
    pub fn from_bytes(
        name: impl Into<String>,
        extension: &str,
        bytes: Vec<u8>,
    ) -> Result<Self, Doc2CastError> {
        let kind = DocumentKind::from_extension(extension)?;
        Self::with_kind(name, kind, bytes)
    }

    pub(crate) fn with_kind(
        name: impl Into<String>,
        kind: DocumentKind,
        bytes: Vec<u8>,
    ) -> Result<Self, Doc2CastError> {
        let name = name.into();
        if !bytes.starts_with(kind.magic()) {
            return Err(Doc2CastError::NotADocument {
                name,
                kind: kind.as_str(),
                magic: bytes.iter().take(4).copied().collect(),
            });
        }
        let hash = ContentHash::of(&bytes);
        Ok(Self {
            name,
            kind,
            bytes,
            hash,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_hash(&self) -> &ContentHash {
        &self.hash
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .field("hash", &self.hash)
            .finish()
    }
}
