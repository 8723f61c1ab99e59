//! In-process embeddings via fastembed.
//!
//! Models are downloaded from Hugging Face on first use and cached; after
//! that no network calls are made. The model is loaded lazily so commands
//! that never embed (e.g. `stats`) do not pay for it.

use std::sync::Mutex;

use anyhow::{bail, Result};

use quarry_core::embedding::EmbeddingProvider;
use quarry_core::error::EmbeddingError;

use crate::config::EmbeddingConfig;

const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

pub struct LocalProvider {
    model_name: String,
    model: fastembed::EmbeddingModel,
    dims: usize,
    batch_size: usize,
    engine: Mutex<Option<fastembed::TextEmbedding>>,
}

impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
        let (model, default_dims) = resolve_model(&model_name)?;

        Ok(Self {
            model_name,
            model,
            dims: config.dims.unwrap_or(default_dims),
            batch_size: config.batch_size,
            engine: Mutex::new(None),
        })
    }
}

fn resolve_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    use fastembed::EmbeddingModel as M;
    Ok(match name {
        "all-minilm-l6-v2" => (M::AllMiniLML6V2, 384),
        "bge-small-en-v1.5" => (M::BGESmallENV15, 384),
        "bge-base-en-v1.5" => (M::BGEBaseENV15, 768),
        "bge-large-en-v1.5" => (M::BGELargeENV15, 1024),
        "nomic-embed-text-v1.5" => (M::NomicEmbedTextV15, 768),
        "multilingual-e5-small" => (M::MultilingualE5Small, 384),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5, multilingual-e5-small",
            other
        ),
    })
}

impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::provider("local", "empty embedding response"))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut guard = self
            .engine
            .lock()
            .map_err(|_| EmbeddingError::provider("local", "model lock poisoned"))?;
        if guard.is_none() {
            let engine = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(self.model.clone())
                    .with_show_download_progress(false),
            )
            .map_err(|e| {
                EmbeddingError::provider("local", format!("failed to load model: {}", e))
            })?;
            *guard = Some(engine);
        }
        let engine = guard
            .as_mut()
            .ok_or_else(|| EmbeddingError::provider("local", "model not loaded"))?;
        engine
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| EmbeddingError::provider("local", e))
    }
}
