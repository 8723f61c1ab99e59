//! Query pipeline: embed → retrieve → generate.
//!
//! A [`QueryPipeline`] is built from explicitly injected collaborators (an
//! [`EmbeddingProvider`], a [`VectorStore`], and a [`GenerationProvider`])
//! and processes one question at a time as a single pass through a small
//! state machine:
//!
//! ```text
//! received ──embed──▶ embedded ──search(k)──▶ retrieved ──generate──▶ answered
//!     │                  │                        │
//!     └──────────────────┴────────────────────────┴──────▶ failed
//! ```
//!
//! A failure in any state ends the query with a [`QueryError`] that records
//! the state it failed in and the underlying cause. There is no partial or
//! default answer, and the pipeline stays usable for the next question.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, GenerationError, QueryError};
use crate::generation::GenerationProvider;
use crate::models::{QueryResult, SearchHit};
use crate::prompt::PromptTemplate;
use crate::store::VectorStore;

/// Number of chunks retrieved per question unless configured otherwise.
pub const DEFAULT_K: usize = 3;

/// Lifecycle of a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryState {
    Received,
    Embedded,
    Retrieved,
    Answered,
    Failed,
}

impl QueryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryState::Received => "received",
            QueryState::Embedded => "embedded",
            QueryState::Retrieved => "retrieved",
            QueryState::Answered => "answered",
            QueryState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for QueryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retrieval-augmented question answering over a [`VectorStore`].
pub struct QueryPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn GenerationProvider>,
    k: usize,
    template: PromptTemplate,
}

impl QueryPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
            k: DEFAULT_K,
            template: PromptTemplate::default(),
        }
    }

    /// Set the number of chunks retrieved per question (at least 1).
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Run the `received → embedded → retrieved` half of the pipeline.
    pub fn retrieve(&self, question: &str) -> Result<Vec<SearchHit>, QueryError> {
        self.run_retrieval(question).map_err(log_failure)
    }

    /// Answer `question` from the indexed documents.
    pub fn query(&self, question: &str) -> Result<QueryResult, QueryError> {
        let hits = self.retrieve(question)?;

        let prompt = self.template.render(&hits, question);
        let answer = self
            .generator
            .complete(&prompt)
            .and_then(|answer| {
                let answer = answer.trim();
                if answer.is_empty() {
                    Err(GenerationError::provider(
                        self.generator.model_name(),
                        "empty completion",
                    ))
                } else {
                    Ok(answer.to_string())
                }
            })
            .map_err(|e| log_failure(QueryError::Generation(e)))?;
        debug!(
            state = %QueryState::Answered,
            model = self.generator.model_name(),
            answer_chars = answer.chars().count(),
            "query answered"
        );

        Ok(QueryResult {
            question: question.to_string(),
            answer,
            sources: hits,
        })
    }

    fn run_retrieval(&self, question: &str) -> Result<Vec<SearchHit>, QueryError> {
        debug!(state = %QueryState::Received, question, "query received");

        if question.trim().is_empty() {
            return Err(QueryError::Embedding(EmbeddingError::EmptyInput));
        }
        let vector = self
            .embedder
            .embed(question)
            .map_err(QueryError::Embedding)?;
        debug!(
            state = %QueryState::Embedded,
            model = self.embedder.model_name(),
            dims = vector.len(),
            "query embedded"
        );

        let hits = self
            .store
            .search(&vector, self.k)
            .map_err(QueryError::Retrieval)?;
        debug!(state = %QueryState::Retrieved, hits = hits.len(), k = self.k, "chunks retrieved");

        Ok(hits)
    }
}

fn log_failure(err: QueryError) -> QueryError {
    warn!(
        state = %QueryState::Failed,
        failed_in = %err.state(),
        kind = err.kind(),
        error = %err,
        "query failed"
    );
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkConfig, Chunker};
    use crate::error::IndexError;
    use crate::index::Metric;
    use crate::models::{Document, DocumentKind, Segment};
    use crate::store::memory::MemoryStore;

    /// Embeds by keyword presence so that retrieval is predictable.
    struct KeywordEmbedder;

    impl EmbeddingProvider for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keywords"
        }
        fn dims(&self) -> usize {
            3
        }
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let t = text.to_lowercase();
            Ok(vec![
                t.contains("sky") as u8 as f32,
                t.contains("grass") as u8 as f32,
                0.01,
            ])
        }
    }

    struct FailingEmbedder;

    impl EmbeddingProvider for FailingEmbedder {
        fn model_name(&self) -> &str {
            "down"
        }
        fn dims(&self) -> usize {
            3
        }
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::provider("down", "connection refused"))
        }
    }

    /// Echoes the prompt back, standing in for a model.
    struct Echo;

    impl GenerationProvider for Echo {
        fn model_name(&self) -> &str {
            "echo"
        }
        fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
            Ok(prompt.to_string())
        }
    }

    struct Fixed(&'static str);

    impl GenerationProvider for Fixed {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            if self.0 == "fail" {
                Err(GenerationError::provider("fixed", "timed out"))
            } else {
                Ok(self.0.to_string())
            }
        }
    }

    fn ingest(store: &MemoryStore, source: &str, text: &str) {
        let doc = Document::new(source, DocumentKind::Text, vec![Segment::new(text)]);
        let chunks = Chunker::new(ChunkConfig::default())
            .unwrap()
            .chunk_document(&doc);
        let vectors: Vec<Vec<f32>> = chunks
            .iter()
            .map(|c| KeywordEmbedder.embed(&c.text).unwrap())
            .collect();
        store.upsert(&chunks, &vectors).unwrap();
    }

    fn pipeline(
        store: Arc<MemoryStore>,
        generator: Arc<dyn GenerationProvider>,
    ) -> QueryPipeline {
        QueryPipeline::new(Arc::new(KeywordEmbedder), store, generator)
    }

    #[test]
    fn test_end_to_end_sky() {
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        ingest(&store, "docs/sky.txt", "The sky is blue. Grass is green.");
        assert_eq!(store.stats().entries, 1);

        let result = pipeline(store, Arc::new(Echo))
            .query("What color is the sky?")
            .unwrap();
        assert!(result.answer.contains("blue"));
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].chunk.metadata.source, "docs/sky.txt");
        assert_eq!(result.question, "What color is the sky?");
    }

    #[test]
    fn test_sources_ranked_and_bounded_by_k() {
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        ingest(&store, "grass.txt", "Grass is green.");
        ingest(&store, "sky.txt", "The sky is blue.");
        ingest(&store, "other.txt", "Nothing relevant here.");

        let p = pipeline(store, Arc::new(Fixed("blue"))).with_k(2);
        let result = p.query("sky?").unwrap();
        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.sources[0].chunk.metadata.source, "sky.txt");
        assert_eq!(result.sources[0].rank, 1);
        assert_eq!(result.answer, "blue");
    }

    #[test]
    fn test_empty_question_fails_in_received() {
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        ingest(&store, "sky.txt", "The sky is blue.");
        let err = pipeline(store, Arc::new(Echo)).query("   ").unwrap_err();
        assert_eq!(err.state(), QueryState::Received);
        assert!(matches!(err, QueryError::Embedding(EmbeddingError::EmptyInput)));
    }

    #[test]
    fn test_provider_failure_fails_in_received() {
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        let p = QueryPipeline::new(Arc::new(FailingEmbedder), store, Arc::new(Echo));
        let err = p.query("sky?").unwrap_err();
        assert_eq!(err.state(), QueryState::Received);
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_empty_index_fails_in_embedded() {
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        let err = pipeline(store, Arc::new(Echo)).query("sky?").unwrap_err();
        assert_eq!(err.state(), QueryState::Embedded);
        assert!(matches!(err, QueryError::Retrieval(IndexError::Empty)));
        assert_eq!(err.kind(), "empty_index");
    }

    #[test]
    fn test_generation_failure_fails_in_retrieved() {
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        ingest(&store, "sky.txt", "The sky is blue.");
        let err = pipeline(store, Arc::new(Fixed("fail")))
            .query("sky?")
            .unwrap_err();
        assert_eq!(err.state(), QueryState::Retrieved);
        assert_eq!(err.kind(), "generation_error");
    }

    #[test]
    fn test_empty_completion_is_an_error() {
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        ingest(&store, "sky.txt", "The sky is blue.");
        let err = pipeline(store, Arc::new(Fixed("  \n")))
            .query("sky?")
            .unwrap_err();
        assert!(matches!(err, QueryError::Generation(_)));
    }

    #[test]
    fn test_pipeline_usable_after_failure() {
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        ingest(&store, "sky.txt", "The sky is blue.");
        let p = pipeline(store, Arc::new(Echo));
        assert!(p.query("").is_err());
        assert!(p.query("sky?").is_ok());
    }

    #[test]
    fn test_retrieve_skips_generation() {
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        ingest(&store, "sky.txt", "The sky is blue.");
        let hits = pipeline(store, Arc::new(Fixed("fail")))
            .retrieve("sky?")
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_with_k_minimum_one() {
        let store = Arc::new(MemoryStore::new(Metric::Cosine));
        assert_eq!(pipeline(store, Arc::new(Echo)).with_k(0).k(), 1);
    }
}
