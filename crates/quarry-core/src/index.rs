//! Flat (brute-force) vector index.
//!
//! [`FlatIndex`] holds chunks and their embeddings in insertion order and
//! answers nearest-neighbour queries by scoring every entry. It is a plain
//! value with no locking or I/O; the [`store`](crate::store) implementations
//! wrap it with a reader/writer lock and, for the file-backed store,
//! durable snapshots.
//!
//! # Ranking
//!
//! Entries are scored with the configured [`Metric`] and sorted by score
//! descending. The sort is stable, so equal scores keep insertion order
//! (earliest first) and repeated searches return identical rankings.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::embedding::{cosine_similarity, dot_product};
use crate::error::IndexError;
use crate::models::{Chunk, IndexEntry, SearchHit};

/// Similarity function used for ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    #[serde(alias = "inner_product")]
    Dot,
}

impl Metric {
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::Dot => dot_product(a, b),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Dot => "dot",
        }
    }
}

/// Summary counts for an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub entries: usize,
    pub documents: usize,
    pub sources: usize,
    pub dims: Option<usize>,
    pub metric: Metric,
}

/// In-memory, append-only collection of [`IndexEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    metric: Metric,
    dims: Option<usize>,
    entries: Vec<IndexEntry>,
    ids: HashSet<String>,
}

impl FlatIndex {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            ..Self::default()
        }
    }

    /// Rebuild an index from previously stored entries, in order.
    pub fn from_entries(metric: Metric, entries: Vec<IndexEntry>) -> Result<Self, IndexError> {
        let mut index = Self::new(metric);
        let (chunks, embeddings): (Vec<Chunk>, Vec<Vec<f32>>) =
            entries.into_iter().map(|e| (e.chunk, e.embedding)).unzip();
        index.append(&chunks, &embeddings)?;
        Ok(index)
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Dimensionality of the stored vectors; `None` until the first append.
    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.ids.contains(chunk_id)
    }

    /// Append chunks with their embeddings.
    ///
    /// The whole batch is validated before anything is added, so a failed
    /// append leaves the index unchanged. Chunks whose id is already present
    /// are skipped. Returns the number of entries added.
    pub fn append(&mut self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize, IndexError> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::LengthMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        let Some(first) = embeddings.first() else {
            return Ok(0);
        };

        let expected = self.dims.unwrap_or(first.len());
        if expected == 0 {
            return Err(IndexError::ZeroDimensions);
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            return Err(IndexError::DimensionMismatch {
                expected,
                got: bad.len(),
            });
        }

        let mut added = 0;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            if !self.ids.insert(chunk.id.clone()) {
                continue;
            }
            self.entries.push(IndexEntry {
                chunk: chunk.clone(),
                embedding: embedding.clone(),
            });
            added += 1;
        }
        if added > 0 {
            self.dims = Some(expected);
        }

        Ok(added)
    }

    /// Return the `k` entries most similar to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if self.entries.is_empty() {
            return Err(IndexError::Empty);
        }
        if let Some(dims) = self.dims {
            if query.len() != dims {
                return Err(IndexError::DimensionMismatch {
                    expected: dims,
                    got: query.len(),
                });
            }
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, self.metric.score(query, &e.embedding)))
            .collect();
        scored.sort_by(|a, b| rank_key(b.1).total_cmp(&rank_key(a.1)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, (i, score))| SearchHit {
                rank: rank + 1,
                score,
                chunk: self.entries[i].chunk.clone(),
            })
            .collect())
    }

    pub fn stats(&self) -> IndexStats {
        let documents: HashSet<&str> = self
            .entries
            .iter()
            .map(|e| e.chunk.document_id.as_str())
            .collect();
        let sources: HashSet<&str> = self
            .entries
            .iter()
            .map(|e| e.chunk.metadata.source.as_str())
            .collect();

        IndexStats {
            entries: self.entries.len(),
            documents: documents.len(),
            sources: sources.len(),
            dims: self.dims,
            metric: self.metric,
        }
    }
}

/// Sort key: NaN ranks last and `-0.0` ties with `0.0`.
fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else if score == 0.0 {
        0.0
    } else {
        score
    }
}
