use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

use super::{EmbeddingProvider, HttpLlm};

/// Maximum characters sent per text to the embedding API. Campus documents
/// are a few hundred words; this only trims pathological inputs so they stay
/// inside an 8k-token context.
const MAX_EMBED_CHARS: usize = 6_000;

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[async_trait]
impl EmbeddingProvider for HttpLlm {
    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }

    fn model(&self) -> &str {
        &self.config.embedding_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = truncate_for_embedding(text);
        match self.config.provider.as_str() {
            "ollama" => embed_ollama(self, text).await,
            "openai" => embed_openai(self, text).await,
            "gemini" => embed_gemini(self, text).await,
            _ => Err(self.unknown_provider()),
        }
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    /// Ask Ollama to truncate over-long inputs instead of returning 400.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(llm: &HttpLlm, text: &str) -> Result<Vec<f32>> {
    let req = OllamaEmbedRequest {
        model: &llm.config.embedding_model,
        input: vec![text],
        truncate: true,
    };
    let body: OllamaEmbedResponse = llm
        .post_json("Ollama embed API", &llm.url("/api/embed"), &req)
        .await?;
    first_embedding(body.embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(llm: &HttpLlm, text: &str) -> Result<Vec<f32>> {
    let req = OpenAiEmbedRequest {
        model: &llm.config.embedding_model,
        input: vec![text],
    };
    let body: OpenAiEmbedResponse = llm
        .post_json("OpenAI embed API", &llm.url("/v1/embeddings"), &req)
        .await?;
    first_embedding(body.data.into_iter().map(|d| d.embedding).collect())
}

// ─── Gemini ──────────────────────────────────────────────

#[derive(Serialize)]
struct GeminiEmbedRequest<'a> {
    model: String,
    content: GeminiContent<'a>,
}

#[derive(Serialize)]
pub(super) struct GeminiContent<'a> {
    pub(super) parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
pub(super) struct GeminiPart<'a> {
    pub(super) text: &'a str,
}

#[derive(Deserialize)]
struct GeminiEmbedResponse {
    embedding: GeminiValues,
}

#[derive(Deserialize)]
struct GeminiValues {
    values: Vec<f32>,
}

async fn embed_gemini(llm: &HttpLlm, text: &str) -> Result<Vec<f32>> {
    let model = &llm.config.embedding_model;
    let req = GeminiEmbedRequest {
        model: format!("models/{model}"),
        content: GeminiContent {
            parts: vec![GeminiPart { text }],
        },
    };
    let url = llm.url(&format!("/v1beta/models/{model}:embedContent"));
    let body: GeminiEmbedResponse = llm.post_json("Gemini embed API", &url, &req).await?;
    Ok(body.embedding.values)
}

fn first_embedding(embeddings: Vec<Vec<f32>>) -> Result<Vec<f32>> {
    embeddings
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::provider("No embedding returned"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_for_embedding("library hours"), "library hours");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "é".repeat(MAX_EMBED_CHARS);
        let cut = truncate_for_embedding(&text);
        assert!(cut.len() <= MAX_EMBED_CHARS);
        assert!(text.is_char_boundary(cut.len()));
    }

    #[test]
    fn test_parse_ollama_response() {
        let body: OllamaEmbedResponse =
            serde_json::from_str(r#"{"model":"nomic","embeddings":[[0.1,0.2,0.3]]}"#).unwrap();
        assert_eq!(first_embedding(body.embeddings).unwrap(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_parse_openai_response() {
        let body: OpenAiEmbedResponse = serde_json::from_str(
            r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[1.0,0.5]}]}"#,
        )
        .unwrap();
        assert_eq!(body.data[0].embedding, vec![1.0, 0.5]);
    }

    #[test]
    fn test_parse_gemini_response() {
        let body: GeminiEmbedResponse =
            serde_json::from_str(r#"{"embedding":{"values":[0.25,-0.5]}}"#).unwrap();
        assert_eq!(body.embedding.values, vec![0.25, -0.5]);
    }

    #[test]
    fn test_empty_embedding_list_is_provider_error() {
        assert!(matches!(
            first_embedding(Vec::new()),
            Err(EngineError::Provider { .. })
        ));
    }

    #[test]
    fn test_gemini_request_shape() {
        let req = GeminiEmbedRequest {
            model: "models/text-embedding-004".to_string(),
            content: GeminiContent {
                parts: vec![GeminiPart { text: "hi" }],
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["content"]["parts"][0]["text"], "hi");
        assert_eq!(json["model"], "models/text-embedding-004");
    }
}
