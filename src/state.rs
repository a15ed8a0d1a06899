use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::answer::QueryOrchestrator;
use crate::cache::ResultCache;
use crate::config::Config;
use crate::ingest::{ingest_file, IngestReport, Ingestor};
use crate::llm::{EmbeddingProvider, GenerationProvider, HttpLlm};
use crate::search::{DocumentIndex, NearbyEngine, RouteEngine};
use crate::store::SnapshotStore;

/// Shared application state. Every engine is built here with its
/// dependencies passed in.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<SnapshotStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn GenerationProvider>,
    pub documents: Arc<DocumentIndex>,
    pub nearby: Arc<NearbyEngine>,
    pub routes: Arc<RouteEngine>,
    pub orchestrator: Arc<QueryOrchestrator>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(SnapshotStore::open_or_create(&config.snapshot_path())?);
        let llm = Arc::new(HttpLlm::new(
            config.llm.clone(),
            Duration::from_secs(config.upstream_timeout_secs),
        )?);
        Ok(Self::with_providers(config, store, llm.clone(), llm))
    }

    /// Compose the engines over an existing store and providers.
    pub fn with_providers(
        config: Config,
        store: Arc<SnapshotStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Self {
        let retry = config.retry_policy();
        let caches = &config.cache;

        let documents = Arc::new(DocumentIndex::new(
            store.clone(),
            embedder.clone(),
            ResultCache::new(
                "documents",
                caches.max_entries,
                Duration::from_secs(caches.documents_ttl_secs),
            ),
            retry.clone(),
        ));
        let nearby = Arc::new(NearbyEngine::new(
            store.clone(),
            ResultCache::new(
                "nearby",
                caches.max_entries,
                Duration::from_secs(caches.nearby_ttl_secs),
            ),
            retry.clone(),
        ));
        let routes = Arc::new(RouteEngine::new(
            store.clone(),
            ResultCache::new(
                "routes",
                caches.max_entries,
                Duration::from_secs(caches.routes_ttl_secs),
            ),
            retry.clone(),
        ));
        let orchestrator = Arc::new(QueryOrchestrator::new(
            documents.clone(),
            generator.clone(),
            retry,
            config.answer_options(),
        ));

        Self {
            config,
            store,
            embedder,
            generator,
            documents,
            nearby,
            routes,
            orchestrator,
        }
    }

    /// Clear every engine cache. Must run after any catalog mutation.
    pub fn invalidate_caches(&self) {
        self.documents.invalidate_cache();
        self.nearby.invalidate_cache();
        self.routes.invalidate_cache();
        tracing::info!("Engine caches invalidated");
    }

    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(
            self.store.clone(),
            self.embedder.clone(),
            self.config.retry_policy(),
        )
    }

    /// Ingest a seed file, persist the snapshot and drop stale results.
    pub async fn ingest_seed(&self, path: &Path) -> anyhow::Result<IngestReport> {
        let report = ingest_file(&self.ingestor(), path, &self.config.ingest_options()).await?;
        if report.changed() {
            self.invalidate_caches();
            self.store.persist()?;
        }
        Ok(report)
    }

    /// Flush the catalog snapshot to disk.
    pub fn shutdown(&self) -> anyhow::Result<()> {
        self.store.persist()?;
        tracing::info!("Catalog snapshot persisted");
        Ok(())
    }
}
