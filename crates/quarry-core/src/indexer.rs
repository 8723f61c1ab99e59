//! Document indexing: chunk → embed → upsert.
//!
//! [`DocumentIndexer`] turns one loaded [`Document`] into index entries.
//! Chunks already present in the store are not re-embedded, embeddings are
//! requested in batches, and all of a document's new entries are upserted
//! together so a document is either fully indexed or not at all.
//!
//! Whitespace-only chunks (cut from long runs of blank space) carry nothing
//! to embed and are left out of the index.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::chunk::Chunker;
use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, IndexError};
use crate::models::{Chunk, Document};
use crate::store::VectorStore;

#[derive(Debug, Error)]
pub enum IndexDocumentError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Counts for one indexed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedDocument {
    pub chunks: usize,
    /// Entries appended to the store.
    pub added: usize,
    /// Chunks that were already indexed.
    pub skipped: usize,
    /// Whitespace-only chunks left out of the index.
    pub blank: usize,
}

pub struct DocumentIndexer {
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl DocumentIndexer {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            chunker,
            embedder,
            store,
            batch_size: 64,
        }
    }

    /// Set the number of texts sent to the provider per call (at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub fn index(&self, document: &Document) -> Result<IndexedDocument, IndexDocumentError> {
        let chunks = self.chunker.chunk_document(document);
        let total = chunks.len();
        let (chunks, blank): (Vec<Chunk>, Vec<Chunk>) = chunks
            .into_iter()
            .partition(|c| !c.text.trim().is_empty());
        let blank = blank.len();
        let candidates = chunks.len();
        let pending: Vec<Chunk> = chunks
            .into_iter()
            .filter(|c| !self.store.contains(&c.id))
            .collect();
        let skipped = candidates - pending.len();

        if pending.is_empty() {
            return Ok(IndexedDocument {
                chunks: total,
                added: 0,
                skipped,
                blank,
            });
        }

        let mut embeddings = Vec::with_capacity(pending.len());
        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;
            if vectors.len() != texts.len() {
                return Err(EmbeddingError::provider(
                    self.embedder.model_name(),
                    format!(
                        "returned {} embeddings for {} texts",
                        vectors.len(),
                        texts.len()
                    ),
                )
                .into());
            }
            embeddings.extend(vectors);
        }

        let added = self.store.upsert(&pending, &embeddings)?;
        debug!(
            source = %document.source,
            chunks = total,
            added,
            skipped,
            blank,
            "document indexed"
        );

        Ok(IndexedDocument {
            chunks: total,
            added,
            skipped: skipped + (pending.len() - added),
            blank,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkConfig;
    use crate::index::Metric;
    use crate::models::{DocumentKind, Segment};
    use crate::store::memory::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
        texts: AtomicUsize,
    }

    impl EmbeddingProvider for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            2
        }
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.trim().is_empty() {
                return Err(EmbeddingError::EmptyInput);
            }
            Ok(vec![text.len() as f32, 1.0])
        }
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts.fetch_add(texts.len(), Ordering::SeqCst);
            texts.iter().map(|t| self.embed(t)).collect()
        }
    }

    struct ShortEmbedder;

    impl EmbeddingProvider for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            2
        }
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0, 0.0])
        }
        fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(vec![vec![1.0, 0.0]])
        }
    }

    fn long_document() -> Document {
        let text = (0..40)
            .map(|i| format!("Sentence number {} talks about topic {}.", i, i % 7))
            .collect::<Vec<_>>()
            .join(" ");
        Document::new("long.txt", DocumentKind::Text, vec![Segment::new(text)])
    }

    fn chunker() -> Chunker {
        Chunker::new(ChunkConfig::new(200, 40)).unwrap()
    }

    #[test]
    fn test_index_batches_embeddings() {
        let embedder = Arc::new(CountingEmbedder::default());
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        let indexer = DocumentIndexer::new(chunker(), embedder.clone(), store.clone())
            .with_batch_size(3);

        let outcome = indexer.index(&long_document()).unwrap();
        assert!(outcome.chunks > 3);
        assert_eq!(outcome.added, outcome.chunks);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(
            embedder.calls.load(Ordering::SeqCst),
            outcome.chunks.div_ceil(3)
        );
        assert_eq!(store.stats().entries, outcome.chunks);
    }

    #[test]
    fn test_reindex_skips_without_embedding() {
        let embedder = Arc::new(CountingEmbedder::default());
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        let indexer = DocumentIndexer::new(chunker(), embedder.clone(), store.clone());

        let first = indexer.index(&long_document()).unwrap();
        let embedded = embedder.texts.load(Ordering::SeqCst);
        let second = indexer.index(&long_document()).unwrap();

        assert_eq!(second.added, 0);
        assert_eq!(second.skipped, first.chunks);
        assert_eq!(embedder.texts.load(Ordering::SeqCst), embedded);
        assert_eq!(store.stats().entries, first.chunks);
    }

    #[test]
    fn test_short_batch_response_is_an_error() {
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        let indexer = DocumentIndexer::new(chunker(), Arc::new(ShortEmbedder), store.clone());
        let err = indexer.index(&long_document()).unwrap_err();
        assert!(matches!(err, IndexDocumentError::Embedding(_)));
        assert_eq!(store.stats().entries, 0);
    }

    #[test]
    fn test_blank_document_indexes_nothing() {
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        let indexer = DocumentIndexer::new(
            chunker(),
            Arc::new(CountingEmbedder::default()),
            store.clone(),
        );
        let doc = Document::new("blank.txt", DocumentKind::Text, vec![Segment::new("  ")]);
        assert_eq!(indexer.index(&doc).unwrap(), IndexedDocument::default());
    }

    #[test]
    fn test_whitespace_gap_chunks_are_left_out() {
        let embedder = Arc::new(CountingEmbedder::default());
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        let indexer = DocumentIndexer::new(chunker(), embedder.clone(), store.clone());
        let text = format!("alpha{}omega", " ".repeat(600));
        let doc = Document::new("gap.txt", DocumentKind::Text, vec![Segment::new(text)]);

        let outcome = indexer.index(&doc).unwrap();
        assert!(outcome.blank > 0);
        assert_eq!(outcome.added, outcome.chunks - outcome.blank);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(embedder.texts.load(Ordering::SeqCst), outcome.added);
        assert_eq!(store.stats().entries, outcome.added);

        let again = indexer.index(&doc).unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(again.skipped, outcome.added);
        assert_eq!(again.blank, outcome.blank);
    }
}
