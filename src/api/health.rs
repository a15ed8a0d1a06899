use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::cache::ResultCache;
use crate::llm::{EmbeddingProvider, GenerationProvider};
use crate::state::AppState;
use crate::store::snapshot::CatalogCounts;
use crate::store::Store;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct StoreHealth {
    status: &'static str,
    catalog: CatalogCounts,
}

/// GET /health/db
pub async fn store(
    State(state): State<AppState>,
) -> Result<Json<StoreHealth>, (StatusCode, String)> {
    if !state.store.test_connection().await {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Store connection failed".to_string(),
        ));
    }
    Ok(Json(StoreHealth {
        status: "ok",
        catalog: state.store.counts(),
    }))
}

#[derive(Serialize)]
pub struct AiHealth {
    status: &'static str,
    provider: String,
    chat_model: String,
    embedding_model: String,
    embedding_dim: usize,
}

/// GET /health/ai - Reports provider configuration; makes no upstream call.
pub async fn ai(State(state): State<AppState>) -> Json<AiHealth> {
    Json(AiHealth {
        status: "ok",
        provider: state.config.llm.provider.clone(),
        chat_model: state.generator.model().to_string(),
        embedding_model: state.embedder.model().to_string(),
        embedding_dim: state.embedder.dimension(),
    })
}

#[derive(Serialize)]
pub struct CacheStats {
    name: &'static str,
    enabled: bool,
    entries: u64,
    hits: u64,
    misses: u64,
    hit_rate: f64,
}

impl CacheStats {
    fn of<V: Clone + Send + Sync + 'static>(cache: &ResultCache<V>) -> Self {
        Self {
            name: cache.name(),
            enabled: cache.is_enabled(),
            entries: cache.entry_count(),
            hits: cache.hits(),
            misses: cache.misses(),
            hit_rate: cache.hit_rate(),
        }
    }
}

#[derive(Serialize)]
pub struct CacheHealth {
    status: &'static str,
    caches: Vec<CacheStats>,
}

/// GET /health/cache
pub async fn cache(State(state): State<AppState>) -> Json<CacheHealth> {
    Json(CacheHealth {
        status: "ok",
        caches: vec![
            CacheStats::of(state.documents.cache()),
            CacheStats::of(state.nearby.cache()),
            CacheStats::of(state.routes.cache()),
        ],
    })
}
