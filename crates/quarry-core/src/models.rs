//! Core data models used throughout Quarry.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the ingestion and query pipelines.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Namespace for deterministic document and chunk identifiers.
const ID_NAMESPACE: Uuid = Uuid::NAMESPACE_URL;

/// Format of a loaded source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Text,
    Pdf,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Text => "text",
            DocumentKind::Pdf => "pdf",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of loader output: the whole file for text, one page for PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    /// 1-based page number, for paginated formats.
    pub page: Option<u32>,
}

impl Segment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page: None,
        }
    }

    pub fn page(text: impl Into<String>, page: u32) -> Self {
        Self {
            text: text.into(),
            page: Some(page),
        }
    }
}

/// A loaded source document.
///
/// The `id` is derived from the source path and a SHA-256 of the content, so
/// loading the same unchanged file twice yields the same identifier.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub source: String,
    pub kind: DocumentKind,
    pub segments: Vec<Segment>,
}

impl Document {
    pub fn new(source: impl Into<String>, kind: DocumentKind, segments: Vec<Segment>) -> Self {
        let source = source.into();
        let mut hasher = Sha256::new();
        for segment in &segments {
            hasher.update(segment.text.as_bytes());
            hasher.update([0u8]);
        }
        let content_hash = format!("{:x}", hasher.finalize());
        let id = Uuid::new_v5(
            &ID_NAMESPACE,
            format!("quarry:doc:{}:{}", source, content_hash).as_bytes(),
        )
        .to_string();

        Self {
            id,
            source,
            kind,
            segments,
        }
    }

    /// The raw text of the document: all segments joined by blank lines.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Provenance carried by every chunk into the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the document the chunk was cut from.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// A bounded slice of a document's text, sized for embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: u32,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    /// Character offset of the chunk within its segment.
    pub offset: usize,
    /// Number of leading characters shared with the previous chunk.
    pub overlap: usize,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(
        document: &Document,
        chunk_index: u32,
        text: &str,
        offset: usize,
        overlap: usize,
        page: Option<u32>,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        let id = Uuid::new_v5(
            &ID_NAMESPACE,
            format!("quarry:chunk:{}:{}", document.id, chunk_index).as_bytes(),
        )
        .to_string();

        Self {
            id,
            document_id: document.id.clone(),
            chunk_index,
            text: text.to_string(),
            hash,
            offset,
            overlap,
            metadata: ChunkMetadata {
                source: document.source.clone(),
                page,
            },
        }
    }

    /// Human-readable citation: the source path, plus the page if known.
    pub fn citation(&self) -> String {
        match self.metadata.page {
            Some(page) => format!("{} (page {})", self.metadata.source, page),
            None => self.metadata.source.clone(),
        }
    }
}

/// A chunk together with its embedding, as persisted in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A ranked retrieval result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// 1-based rank.
    pub rank: usize,
    pub score: f32,
    pub chunk: Chunk,
}

/// The outcome of a successful query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SearchHit>,
}
