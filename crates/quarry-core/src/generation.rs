//! Generation provider trait.
//!
//! Concrete backends (OpenAI chat, Ollama, echo) live in the `quarry` app
//! crate and are injected into the [`QueryPipeline`](crate::pipeline::QueryPipeline).

use crate::error::GenerationError;

/// Maps a prompt to a natural-language completion.
///
/// Determinism is controlled by the provider's configured temperature;
/// `0.0` gives the most reproducible answers.
pub trait GenerationProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;

    /// Complete `prompt`, blocking until the provider answers or times out.
    fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}
