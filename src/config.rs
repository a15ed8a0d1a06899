use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::answer::AnswerOptions;
use crate::ingest::IngestOptions;
use crate::upstream::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the catalog snapshot is stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Seed catalog ingested at startup
    pub seed_file: Option<PathBuf>,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Per-attempt timeout for store and provider calls
    pub upstream_timeout_secs: u64,
    /// Pause before the single retry of a failed upstream call
    pub upstream_retry_backoff_ms: u64,
    pub cache: CacheConfig,
    pub rag: RagConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama", "openai" or "gemini"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for answer generation
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
}

/// Engine result caches. `max_entries = 0` disables caching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub documents_ttl_secs: u64,
    pub nearby_ttl_secs: u64,
    pub routes_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub context_docs: usize,
    pub min_similarity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub delay_ms: u64,
    pub replace_existing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:4000".to_string(),
            seed_file: None,
            llm: LlmConfig::default(),
            upstream_timeout_secs: 20,
            upstream_retry_backoff_ms: 500,
            cache: CacheConfig::default(),
            rag: RagConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            embedding_dim: 768,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            documents_ttl_secs: 600,
            nearby_ttl_secs: 300,
            routes_ttl_secs: 3600,
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        let defaults = AnswerOptions::default();
        Self {
            context_docs: defaults.context_docs,
            min_similarity: defaults.min_similarity,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            delay_ms: 500,
            replace_existing: true,
        }
    }
}

/// Overwrite `target` with the parsed value of `key`, if set and valid.
fn parse_env<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = std::env::var(key) {
        if let Ok(v) = val.trim().parse() {
            *target = v;
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("CAMPUS_ROUTE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("CAMPUS_ROUTE_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(path) = std::env::var("CAMPUS_ROUTE_SEED_FILE") {
            config.seed_file = Some(PathBuf::from(path));
        }

        // LLM provider
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider.to_lowercase();
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        parse_env("LLM_EMBEDDING_DIM", &mut config.llm.embedding_dim);

        parse_env("UPSTREAM_TIMEOUT_SECS", &mut config.upstream_timeout_secs);
        parse_env("UPSTREAM_RETRY_BACKOFF_MS", &mut config.upstream_retry_backoff_ms);

        parse_env("CACHE_MAX_ENTRIES", &mut config.cache.max_entries);
        parse_env("CACHE_DOCUMENTS_TTL_SECS", &mut config.cache.documents_ttl_secs);
        parse_env("CACHE_NEARBY_TTL_SECS", &mut config.cache.nearby_ttl_secs);
        parse_env("CACHE_ROUTES_TTL_SECS", &mut config.cache.routes_ttl_secs);

        parse_env("RAG_CONTEXT_DOCS", &mut config.rag.context_docs);
        parse_env("RAG_MIN_SIMILARITY", &mut config.rag.min_similarity);

        parse_env("INGEST_DELAY_MS", &mut config.ingest.delay_ms);
        parse_env("INGEST_REPLACE_EXISTING", &mut config.ingest.replace_existing);

        config
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("catalog.json")
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(self.upstream_timeout_secs),
            Duration::from_millis(self.upstream_retry_backoff_ms),
        )
    }

    pub fn answer_options(&self) -> AnswerOptions {
        AnswerOptions {
            context_docs: self.rag.context_docs.max(1),
            min_similarity: self.rag.min_similarity,
        }
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            replace_existing: self.ingest.replace_existing,
            delay: Duration::from_millis(self.ingest.delay_ms),
        }
    }
}
