//! Error types for the Quarry core.
//!
//! Storage faults, provider failures, and query failures are distinct
//! types so that front-ends can decide how to present each one.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::QueryState;

/// Errors raised by a vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Search was attempted on an index with no entries.
    #[error("vector index is empty; ingest documents first")]
    Empty,

    #[error("embedding has {got} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embeddings must have at least one dimension")]
    ZeroDimensions,

    #[error("got {chunks} chunks but {embeddings} embeddings")]
    LengthMismatch { chunks: usize, embeddings: usize },

    /// A storage-layer fault (disk full, permission denied, ...).
    #[error("index I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index snapshot {} is corrupt: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    /// Another writer holds the index lock.
    #[error("index is locked by another writer ({}); remove the lock file if no ingestion is running", path.display())]
    Locked { path: PathBuf },
}

impl IndexError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by an embedding provider.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("cannot embed empty text")]
    EmptyInput,

    #[error("embedding provider {provider} failed: {message}")]
    Provider { provider: String, message: String },
}

impl EmbeddingError {
    pub fn provider(provider: impl Into<String>, message: impl std::fmt::Display) -> Self {
        EmbeddingError::Provider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }
}

/// Errors raised by a generation provider.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation provider {provider} failed: {message}")]
    Provider { provider: String, message: String },
}

impl GenerationError {
    pub fn provider(provider: impl Into<String>, message: impl std::fmt::Display) -> Self {
        GenerationError::Provider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }
}

/// A failed query, tagged with the pipeline stage that failed.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("embedding failed: {0}")]
    Embedding(#[source] EmbeddingError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[source] IndexError),

    #[error("generation failed: {0}")]
    Generation(#[source] GenerationError),
}

impl QueryError {
    /// The state the query was in when it failed.
    pub fn state(&self) -> QueryState {
        match self {
            QueryError::Embedding(_) => QueryState::Received,
            QueryError::Retrieval(_) => QueryState::Embedded,
            QueryError::Generation(_) => QueryState::Retrieved,
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Embedding(_) => "embedding_error",
            QueryError::Retrieval(IndexError::Empty) => "empty_index",
            QueryError::Retrieval(_) => "retrieval_error",
            QueryError::Generation(_) => "generation_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_state_and_kind() {
        let e = QueryError::Embedding(EmbeddingError::EmptyInput);
        assert_eq!(e.state(), QueryState::Received);
        assert_eq!(e.kind(), "embedding_error");

        let e = QueryError::Retrieval(IndexError::Empty);
        assert_eq!(e.state(), QueryState::Embedded);
        assert_eq!(e.kind(), "empty_index");

        let e = QueryError::Generation(GenerationError::provider("echo", "boom"));
        assert_eq!(e.state(), QueryState::Retrieved);
        assert!(e.to_string().contains("boom"));
    }
}
