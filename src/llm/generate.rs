use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

use super::embeddings::{GeminiContent, GeminiPart};
use super::{GenerationProvider, HttpLlm};

#[async_trait]
impl GenerationProvider for HttpLlm {
    fn model(&self) -> &str {
        &self.config.chat_model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let text = match self.config.provider.as_str() {
            "ollama" => call_ollama(self, prompt).await?,
            "openai" => call_openai(self, prompt).await?,
            "gemini" => call_gemini(self, prompt).await?,
            _ => return Err(self.unknown_provider()),
        };
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(EngineError::provider("empty completion"));
        }
        Ok(text)
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

async fn call_ollama(llm: &HttpLlm, prompt: &str) -> Result<String> {
    let req = OllamaChatRequest {
        model: &llm.config.chat_model,
        messages: vec![Message {
            role: "user",
            content: prompt,
        }],
        stream: false,
    };
    let body: OllamaChatResponse = llm
        .post_json("Ollama chat API", &llm.url("/api/chat"), &req)
        .await?;
    Ok(body.message.content)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

async fn call_openai(llm: &HttpLlm, prompt: &str) -> Result<String> {
    let req = OpenAiChatRequest {
        model: &llm.config.chat_model,
        messages: vec![Message {
            role: "user",
            content: prompt,
        }],
        temperature: 0.3,
    };
    let body: OpenAiChatResponse = llm
        .post_json("OpenAI chat API", &llm.url("/v1/chat/completions"), &req)
        .await?;
    Ok(body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default())
}

// ─── Gemini ──────────────────────────────────────────────

#[derive(Serialize)]
struct GeminiGenerateRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Deserialize)]
struct GeminiGenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiTextPart>,
}

#[derive(Deserialize)]
struct GeminiTextPart {
    #[serde(default)]
    text: String,
}

async fn call_gemini(llm: &HttpLlm, prompt: &str) -> Result<String> {
    let req = GeminiGenerateRequest {
        contents: vec![GeminiContent {
            parts: vec![GeminiPart { text: prompt }],
        }],
    };
    let url = llm.url(&format!(
        "/v1beta/models/{}:generateContent",
        llm.config.chat_model
    ));
    let body: GeminiGenerateResponse = llm.post_json("Gemini generate API", &url, &req).await?;
    Ok(gemini_text(body))
}

fn gemini_text(body: GeminiGenerateResponse) -> String {
    body.candidates
        .into_iter()
        .next()
        .map(|c| {
            c.content
                .parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}
