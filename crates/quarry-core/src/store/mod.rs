//! Storage abstraction for the vector index.
//!
//! The [`VectorStore`] trait is the seam between the query pipeline and
//! index persistence, so the pipeline runs unchanged against the
//! in-memory store (tests, embedding in other programs) or the file-backed
//! store in the `quarry` app crate.
//!
//! Implementations must be `Send + Sync`. Searches may run concurrently;
//! upserts are serialized against each other and against searches.

pub mod memory;

use crate::error::IndexError;
use crate::index::IndexStats;
use crate::models::{Chunk, SearchHit};

/// Abstract vector index backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Append chunks with their embeddings |
/// | [`search`](VectorStore::search) | Top-k similarity search |
/// | [`contains`](VectorStore::contains) | Whether a chunk id is indexed |
/// | [`stats`](VectorStore::stats) | Entry and document counts |
pub trait VectorStore: Send + Sync {
    /// Append new entries; chunks already present are skipped.
    ///
    /// Either every new entry becomes visible or none does. Returns the
    /// number of entries added.
    fn upsert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize, IndexError>;

    /// Return the `k` most similar entries, best first, ties in insertion
    /// order. Fails with [`IndexError::Empty`] on an empty index.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError>;

    fn contains(&self, chunk_id: &str) -> bool;

    fn stats(&self) -> IndexStats;
}
