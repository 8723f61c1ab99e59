//! Generation provider implementations.
//!
//! | Config Value | Provider | Endpoint |
//! |-------------|----------|----------|
//! | `"echo"` | [`EchoProvider`] | none; returns the prompt |
//! | `"openai"` | [`OpenAIChatProvider`] | `POST /v1/chat/completions` |
//! | `"ollama"` | [`OllamaGenerateProvider`] | `POST /api/generate` |
//!
//! Calls block until the model answers or `generation.timeout_secs`
//! elapses. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use quarry_core::error::GenerationError;
use quarry_core::generation::GenerationProvider;

use crate::config::GenerationConfig;

const OPENAI_URL: &str = "https://api.openai.com";
const OLLAMA_URL: &str = "http://localhost:11434";

/// Offline stand-in for a model: the completion is the prompt itself.
pub struct EchoProvider;

impl GenerationProvider for EchoProvider {
    fn model_name(&self) -> &str {
        "echo"
    }

    fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        Ok(prompt.to_string())
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn send(
    provider: &str,
    request: reqwest::blocking::RequestBuilder,
    body: &serde_json::Value,
) -> Result<serde_json::Value, GenerationError> {
    let response = request.json(body).send().map_err(|e| {
        if e.is_timeout() {
            GenerationError::provider(provider, format!("request timed out: {}", e))
        } else {
            GenerationError::provider(provider, e)
        }
    })?;
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().unwrap_or_default();
        return Err(GenerationError::provider(
            provider,
            format!("API error {}: {}", status, body_text),
        ));
    }
    response
        .json()
        .map_err(|e| GenerationError::provider(provider, e))
}

// ============ OpenAI ============

/// Chat completions against the OpenAI API (or a compatible server via
/// `generation.url`). Requires `OPENAI_API_KEY`.
pub struct OpenAIChatProvider {
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl OpenAIChatProvider {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("generation.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let url = config.url.clone().unwrap_or_else(|| OPENAI_URL.to_string());

        Ok(Self {
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            url: url.trim_end_matches('/').to_string(),
            api_key,
            client: http_client(config.timeout_secs)?,
        })
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }
}

impl GenerationProvider for OpenAIChatProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = self
            .client
            .post(format!("{}/v1/chat/completions", self.url))
            .bearer_auth(&self.api_key);
        let json = send("openai", request, &self.request_body(prompt))?;
        parse_chat_response(&json).map_err(|e| GenerationError::provider("openai", e))
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|c| c.to_string())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

// ============ Ollama ============

/// Non-streaming completion on a local Ollama instance.
pub struct OllamaGenerateProvider {
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    url: String,
    client: reqwest::blocking::Client,
}

impl OllamaGenerateProvider {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("generation.model required for Ollama provider"))?;
        let url = config.url.clone().unwrap_or_else(|| OLLAMA_URL.to_string());

        Ok(Self {
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            url: url.trim_end_matches('/').to_string(),
            client: http_client(config.timeout_secs)?,
        })
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut options = serde_json::json!({ "temperature": self.temperature });
        if let Some(max_tokens) = self.max_tokens {
            options["num_predict"] = serde_json::json!(max_tokens);
        }
        serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": options,
        })
    }
}

impl GenerationProvider for OllamaGenerateProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = self.client.post(format!("{}/api/generate", self.url));
        let json = send("ollama", request, &self.request_body(prompt)).map_err(|e| match e {
            GenerationError::Provider { message, .. } => GenerationError::provider(
                "ollama",
                format!("{} (is Ollama running at {}?)", message, self.url),
            ),
        })?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(|r| r.to_string())
            .ok_or_else(|| {
                GenerationError::provider("ollama", "Invalid Ollama response: missing response")
            })
    }
}

/// Create the configured [`GenerationProvider`].
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn GenerationProvider>> {
    match config.provider.as_str() {
        "echo" => Ok(Arc::new(EchoProvider)),
        "openai" => Ok(Arc::new(OpenAIChatProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerateProvider::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> GenerationConfig {
        GenerationConfig {
            provider: provider.to_string(),
            model: Some("m".to_string()),
            url: Some("http://127.0.0.1:9/".to_string()),
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn test_echo_returns_prompt() {
        assert_eq!(EchoProvider.complete("hello {x}").unwrap(), "hello {x}");
    }

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Blue."}}]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "Blue.");
        assert!(parse_chat_response(&serde_json::json!({"choices": []})).is_err());
    }

    #[test]
    fn test_ollama_request_body() {
        let mut cfg = config("ollama");
        cfg.temperature = 0.3;
        cfg.max_tokens = Some(128);
        let provider = OllamaGenerateProvider::new(&cfg).unwrap();
        assert_eq!(provider.url, "http://127.0.0.1:9");
        let body = provider.request_body("p");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 128);
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_unreachable_ollama_is_generation_error() {
        let mut cfg = config("ollama");
        cfg.timeout_secs = 2;
        let provider = OllamaGenerateProvider::new(&cfg).unwrap();
        let err = provider.complete("hi").unwrap_err();
        assert!(err.to_string().contains("is Ollama running"));
    }

    #[test]
    fn test_create_generator() {
        assert_eq!(
            create_generator(&GenerationConfig::default())
                .unwrap()
                .model_name(),
            "echo"
        );
        assert!(create_generator(&config("ollama")).is_ok());
        assert!(create_generator(&config("magic")).is_err());
    }
}
