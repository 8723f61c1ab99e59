//! In-memory [`VectorStore`] implementation.
//!
//! Wraps a [`FlatIndex`] in a `std::sync::RwLock`: searches share the read
//! side, upserts take the write side. Nothing is persisted.

use std::sync::{PoisonError, RwLock};

use crate::error::IndexError;
use crate::index::{FlatIndex, IndexStats, Metric};
use crate::models::{Chunk, SearchHit};

use super::VectorStore;

/// Volatile vector store for tests and embedding in other programs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: RwLock<FlatIndex>,
}

impl MemoryStore {
    pub fn new(metric: Metric) -> Self {
        Self::from_index(FlatIndex::new(metric))
    }

    pub fn from_index(index: FlatIndex) -> Self {
        Self {
            index: RwLock::new(index),
        }
    }

    /// A copy of the current index contents.
    pub fn snapshot(&self) -> FlatIndex {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl VectorStore for MemoryStore {
    fn upsert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize, IndexError> {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        index.append(chunks, embeddings)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index.search(query, k)
    }

    fn contains(&self, chunk_id: &str) -> bool {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(chunk_id)
    }

    fn stats(&self) -> IndexStats {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .stats()
    }
}
