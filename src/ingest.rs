//! Seeding the catalog from a JSON seed file.
//!
//! Documents are embedded one at a time behind a fixed-delay pacer so a
//! rate-limited provider is not flooded. A failure on one item is logged and
//! counted; it never aborts the batch.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::error::Result;
use crate::llm::EmbeddingProvider;
use crate::math::vector::validate_embedding;
use crate::models::{normalize_tags, Category, Coordinate, GraphEdge, PoiId};
use crate::store::{CatalogWriter, DocumentWrite, NewDocument, NewPoi};
use crate::upstream::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedCatalog {
    #[serde(default)]
    pub pois: Vec<SeedPoi>,
    #[serde(default)]
    pub edges: Vec<SeedEdge>,
    #[serde(default)]
    pub documents: Vec<SeedDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPoi {
    pub name: String,
    pub category: Category,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A walkable connection between two POIs, referenced by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedEdge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub weight_meters: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedDocument {
    pub title: String,
    pub content: String,
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SeedCatalog {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse seed file {}", path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Overwrite documents sharing a (title, source) key and reuse POIs that
    /// already exist by name, instead of inserting duplicates.
    pub replace_existing: bool,
    /// Pause between consecutive embedding calls.
    pub delay: Duration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            replace_existing: true,
            delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestCounts {
    pub succeeded: usize,
    pub replaced: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub pois: IngestCounts,
    pub edges: IngestCounts,
    pub documents: IngestCounts,
}

impl IngestReport {
    /// Whether anything in the catalog changed.
    pub fn changed(&self) -> bool {
        [self.pois, self.edges, self.documents]
            .iter()
            .any(|c| c.succeeded + c.replaced > 0)
    }
}

pub struct Ingestor {
    writer: Arc<dyn CatalogWriter>,
    embedder: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
}

impl Ingestor {
    pub fn new(
        writer: Arc<dyn CatalogWriter>,
        embedder: Arc<dyn EmbeddingProvider>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            writer,
            embedder,
            retry,
        }
    }

    /// Ingest POIs, then edges, then documents.
    pub async fn ingest(&self, catalog: &SeedCatalog, options: &IngestOptions) -> Result<IngestReport> {
        tracing::info!(
            "Ingesting {} POIs, {} edges, {} documents",
            catalog.pois.len(),
            catalog.edges.len(),
            catalog.documents.len()
        );

        let mut names = self.poi_names().await?;
        let pois = self.ingest_pois(&catalog.pois, options, &mut names).await;
        let edges = self.ingest_edges(&catalog.edges, &names).await;
        let documents = self.ingest_documents(&catalog.documents, options).await;

        let report = IngestReport {
            pois,
            edges,
            documents,
        };
        tracing::info!(
            "Ingestion finished: POIs {}/{} ok, edges {}/{} ok, documents {} new + {} replaced, {} failed",
            report.pois.succeeded + report.pois.skipped,
            catalog.pois.len(),
            report.edges.succeeded,
            catalog.edges.len(),
            report.documents.succeeded,
            report.documents.replaced,
            report.documents.failed
        );
        Ok(report)
    }

    async fn poi_names(&self) -> Result<HashMap<String, PoiId>> {
        let existing = self.writer.load_pois(None).await?;
        let mut names = HashMap::with_capacity(existing.len());
        for poi in existing {
            names.entry(poi.name.to_lowercase()).or_insert(poi.id);
        }
        Ok(names)
    }

    async fn ingest_pois(
        &self,
        seeds: &[SeedPoi],
        options: &IngestOptions,
        names: &mut HashMap<String, PoiId>,
    ) -> IngestCounts {
        let mut counts = IngestCounts::default();
        for seed in seeds {
            let key = seed.name.trim().to_lowercase();
            if options.replace_existing && names.contains_key(&key) {
                counts.skipped += 1;
                continue;
            }
            let coordinate = match Coordinate::new(seed.latitude, seed.longitude) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!("Skipping POI {}: {e}", seed.name);
                    counts.failed += 1;
                    continue;
                }
            };
            let poi = NewPoi {
                name: seed.name.trim().to_string(),
                category: seed.category.clone(),
                coordinate,
                description: seed.description.clone(),
                tags: normalize_tags(&seed.tags),
            };
            match self.writer.add_poi(poi).await {
                Ok(id) => {
                    names.entry(key).or_insert(id);
                    counts.succeeded += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to add POI {}: {e}", seed.name);
                    counts.failed += 1;
                }
            }
        }
        counts
    }

    async fn ingest_edges(&self, seeds: &[SeedEdge], names: &HashMap<String, PoiId>) -> IngestCounts {
        let mut counts = IngestCounts::default();
        for seed in seeds {
            let lookup = |name: &str| names.get(&name.trim().to_lowercase()).copied();
            let (Some(a), Some(b)) = (lookup(&seed.from), lookup(&seed.to)) else {
                tracing::warn!("Skipping edge {} - {}: unknown POI name", seed.from, seed.to);
                counts.failed += 1;
                continue;
            };
            let edge = GraphEdge {
                poi_a: a,
                poi_b: b,
                weight_meters: seed.weight_meters,
            };
            match self.writer.add_edge(edge).await {
                Ok(()) => counts.succeeded += 1,
                Err(e) => {
                    tracing::warn!("Skipping edge {} - {}: {e}", seed.from, seed.to);
                    counts.failed += 1;
                }
            }
        }
        counts
    }

    async fn ingest_documents(&self, seeds: &[SeedDocument], options: &IngestOptions) -> IngestCounts {
        let mut counts = IngestCounts::default();
        let mut pacer = pacer(options.delay);

        for (idx, seed) in seeds.iter().enumerate() {
            if let Some(p) = pacer.as_mut() {
                p.tick().await;
            }
            tracing::info!("[{}/{}] Embedding {}", idx + 1, seeds.len(), seed.title);

            let embedding = match self.embed_document(&seed.content).await {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to embed {}: {e}", seed.title);
                    counts.failed += 1;
                    continue;
                }
            };
            let doc = NewDocument {
                title: seed.title.trim().to_string(),
                content: seed.content.clone(),
                source: seed.source.trim().to_string(),
                tags: normalize_tags(&seed.tags),
                embedding,
            };
            match self.writer.add_document(doc, options.replace_existing).await {
                Ok(DocumentWrite::Inserted(_)) => counts.succeeded += 1,
                Ok(DocumentWrite::Replaced(_)) => counts.replaced += 1,
                Err(e) => {
                    tracing::warn!("Failed to store {}: {e}", seed.title);
                    counts.failed += 1;
                }
            }
        }
        counts
    }

    async fn embed_document(&self, content: &str) -> Result<Vec<f32>> {
        let embedding = self
            .retry
            .run("embed document", || self.embedder.embed(content))
            .await?;
        validate_embedding(&embedding, self.embedder.dimension())?;
        Ok(embedding)
    }
}

fn pacer(delay: Duration) -> Option<Interval> {
    if delay.is_zero() {
        return None;
    }
    let mut pacer = interval(delay);
    pacer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(pacer)
}

/// Read and ingest a seed file.
pub async fn ingest_file(
    ingestor: &Ingestor,
    path: &Path,
    options: &IngestOptions,
) -> anyhow::Result<IngestReport> {
    let catalog = SeedCatalog::load(path)?;
    ingestor
        .ingest(&catalog, options)
        .await
        .with_context(|| format!("Failed to ingest {}", path.display()))
}
