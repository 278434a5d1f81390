//! Source documents and the render cache key.
//!
//! A document is identified by the SHA-256 of its bytes, not by its file
//! name or upload slot: the same PDF uploaded twice under two names shares
//! one cache entry, and two different PDFs called `scan.pdf` never collide.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Fallback stem for output file names when the document has no name.
pub const DEFAULT_BASE_NAME: &str = "document";

/// Stable content identifier of a [`SourceDocument`] (lower-case hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Hash `bytes` into an identifier.
    pub fn from_content(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An uploaded PDF: immutable bytes plus their identity.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    id: DocumentId,
    name: Option<String>,
    bytes: Arc<[u8]>,
}

impl SourceDocument {
    /// Wrap raw bytes. `name` is the original file name, if any.
    pub fn new(bytes: impl Into<Arc<[u8]>>, name: Option<String>) -> Self {
        let bytes = bytes.into();
        Self {
            id: DocumentId::from_content(&bytes),
            name: name.filter(|n| !n.trim().is_empty()),
            bytes,
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File stem used to prefix output names (`report.pdf` → `report`).
    pub fn base_name(&self) -> &str {
        self.name
            .as_deref()
            .and_then(|n| Path::new(n).file_stem())
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_BASE_NAME)
    }

    /// The cache key for rendering this document at `dpi`.
    pub fn request(&self, dpi: u32) -> RenderRequest {
        RenderRequest::new(self.id.clone(), dpi)
    }
}

/// One rendering job: a document at a resolution. Two requests are equal
/// iff both fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RenderRequest {
    pub document_id: DocumentId,
    pub dpi: u32,
}

impl RenderRequest {
    pub fn new(document_id: DocumentId, dpi: u32) -> Self {
        Self { document_id, dpi }
    }
}

impl fmt::Display for RenderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}dpi", self.document_id.short(), self.dpi)
    }
}
