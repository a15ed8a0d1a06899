//! Embedding and generation providers.
//!
//! Engines depend on the [`EmbeddingProvider`] and [`GenerationProvider`]
//! traits; [`HttpLlm`] implements both against Ollama, OpenAI-compatible and
//! Gemini HTTP APIs.

pub mod embeddings;
pub mod generate;
pub mod prompt;

use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{EngineError, Result};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Declared length of every vector returned by [`embed`](Self::embed).
    fn dimension(&self) -> usize;

    fn model(&self) -> &str;

    /// Embed one text. The caller validates the returned length.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// HTTP client for the configured LLM provider.
pub struct HttpLlm {
    client: reqwest::Client,
    config: LlmConfig,
    request_timeout: Duration,
}

impl HttpLlm {
    pub fn new(config: LlmConfig, request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            request_timeout,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn transport_error(&self, operation: &str, e: reqwest::Error) -> EngineError {
        if e.is_timeout() {
            EngineError::UpstreamTimeout {
                operation: operation.to_string(),
                timeout_ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            EngineError::provider(format!("{operation}: {e}"))
        }
    }

    /// POST `body` as JSON and decode a JSON response.
    async fn post_json<Req, Resp>(&self, operation: &str, url: &str, body: &Req) -> Result<Resp>
    where
        Req: serde::Serialize + ?Sized + Sync,
        Resp: serde::de::DeserializeOwned,
    {
        let mut req = self.client.post(url).json(body);
        match self.config.provider.as_str() {
            "openai" => {
                let api_key = self.config.api_key.as_deref().unwrap_or_default();
                req = req.header("Authorization", format!("Bearer {api_key}"));
            }
            "gemini" => {
                let api_key = self.config.api_key.as_deref().unwrap_or_default();
                req = req.header("x-goog-api-key", api_key);
            }
            _ => {}
        }

        let resp = req
            .send()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::provider(format!(
                "{operation} returned {status}: {body}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| EngineError::provider(format!("{operation}: failed to parse response: {e}")))
    }

    fn unknown_provider(&self) -> EngineError {
        EngineError::provider(format!("Unknown LLM provider: {}", self.config.provider))
    }
}
