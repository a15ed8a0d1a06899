use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use campus_route::api;
use campus_route::config::Config;
use campus_route::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Catalog snapshot: {}", config.snapshot_path().display());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);

    let state = AppState::new(config.clone())?;

    if let Some(seed) = &config.seed_file {
        match state.ingest_seed(seed).await {
            Ok(report) => tracing::info!("Seed ingested: {:?}", report),
            Err(e) => tracing::error!("Seed ingestion failed: {e:#}"),
        }
    }

    let app = Router::new()
        .route("/health", get(api::health::health))
        .route("/health/db", get(api::health::store))
        .route("/health/ai", get(api::health::ai))
        .route("/health/cache", get(api::health::cache))
        .route("/api/query", post(api::query::query))
        .route("/api/search", post(api::query::search))
        .route("/api/nearby", get(api::geo::nearby))
        .route("/api/route", get(api::geo::route))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown()?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
