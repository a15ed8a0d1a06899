use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::models::{normalize_tags, Category, Document, GraphEdge, PointOfInterest, PoiId};

use super::{CatalogWriter, DocumentWrite, NewDocument, NewPoi, Store};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Catalog {
    #[serde(default)]
    pois: Vec<PointOfInterest>,
    #[serde(default)]
    edges: Vec<GraphEdge>,
    #[serde(default)]
    documents: Vec<Document>,
}

/// Row counts, reported by the health probe.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CatalogCounts {
    pub pois: usize,
    pub edges: usize,
    pub documents: usize,
}

/// In-memory catalog with optional JSON snapshot persistence.
pub struct SnapshotStore {
    catalog: RwLock<Catalog>,
    persist_path: Option<PathBuf>,
}

impl SnapshotStore {
    pub fn in_memory() -> Self {
        Self {
            catalog: RwLock::new(Catalog::default()),
            persist_path: None,
        }
    }

    /// Open the snapshot at `path`, or start empty if it does not exist yet.
    pub fn open_or_create(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let catalog = if path.exists() {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read catalog {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("Failed to parse catalog {}", path.display()))?
        } else {
            Catalog::default()
        };

        Ok(Self {
            catalog: RwLock::new(catalog),
            persist_path: Some(path.to_path_buf()),
        })
    }

    /// Write the snapshot to disk (atomic write via temp file + rename).
    pub fn persist(&self) -> anyhow::Result<()> {
        let catalog = self.catalog.read();
        self.write_snapshot(&catalog)
    }

    fn write_snapshot(&self, catalog: &Catalog) -> anyhow::Result<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let data = serde_json::to_string(catalog)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    pub fn counts(&self) -> CatalogCounts {
        let catalog = self.catalog.read();
        CatalogCounts {
            pois: catalog.pois.len(),
            edges: catalog.edges.len(),
            documents: catalog.documents.len(),
        }
    }

    /// Persist a mutation already applied to `catalog`. On failure `undo`
    /// reverts it, so memory never holds a write the snapshot lacks.
    fn commit<T>(
        &self,
        catalog: &mut Catalog,
        value: T,
        undo: impl FnOnce(&mut Catalog),
    ) -> Result<T> {
        match self.write_snapshot(catalog) {
            Ok(()) => Ok(value),
            Err(e) => {
                undo(catalog);
                tracing::error!("Catalog write rolled back: {e:#}");
                Err(EngineError::store(format!("{e:#}")))
            }
        }
    }
}

#[async_trait]
impl Store for SnapshotStore {
    async fn test_connection(&self) -> bool {
        match &self.persist_path {
            Some(path) => path.parent().map_or(true, |dir| dir.is_dir()),
            None => true,
        }
    }

    async fn load_pois(&self, category: Option<&Category>) -> Result<Vec<PointOfInterest>> {
        let catalog = self.catalog.read();
        let mut pois: Vec<PointOfInterest> = catalog
            .pois
            .iter()
            .filter(|p| category.map_or(true, |c| &p.category == c))
            .cloned()
            .collect();
        pois.sort_by_key(|p| p.id);
        Ok(pois)
    }

    async fn load_edges(&self) -> Result<Vec<GraphEdge>> {
        let mut edges = self.catalog.read().edges.clone();
        edges.sort_by_key(|e| (e.poi_a, e.poi_b));
        Ok(edges)
    }

    async fn load_documents(&self, tags: Option<&[String]>) -> Result<Vec<Document>> {
        let wanted = tags
            .map(|t| normalize_tags(t.iter()))
            .filter(|w| !w.is_empty());
        let catalog = self.catalog.read();
        let mut docs: Vec<Document> = catalog
            .documents
            .iter()
            .filter(|d| match &wanted {
                Some(w) => w.iter().any(|t| d.tags.contains(t)),
                None => true,
            })
            .cloned()
            .collect();
        docs.sort_by_key(|d| d.id);
        Ok(docs)
    }
}

#[async_trait]
impl CatalogWriter for SnapshotStore {
    async fn add_poi(&self, poi: NewPoi) -> Result<PoiId> {
        poi.coordinate.validate()?;
        let mut catalog = self.catalog.write();
        let id = catalog.pois.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        catalog.pois.push(PointOfInterest {
            id,
            name: poi.name,
            category: poi.category,
            latitude: poi.coordinate.lat,
            longitude: poi.coordinate.lon,
            description: poi.description,
            tags: poi.tags,
            created_at: Utc::now(),
        });
        self.commit(&mut catalog, id, |c| {
            c.pois.pop();
        })
    }

    async fn add_edge(&self, edge: GraphEdge) -> Result<()> {
        if edge.poi_a == edge.poi_b {
            return Err(EngineError::invalid(format!(
                "self-loop on poi {}",
                edge.poi_a
            )));
        }
        if let Some(w) = edge.weight_meters {
            if !w.is_finite() || w < 0.0 {
                return Err(EngineError::invalid(format!("edge weight {w} must be >= 0")));
            }
        }
        let (a, b) = if edge.poi_a < edge.poi_b {
            (edge.poi_a, edge.poi_b)
        } else {
            (edge.poi_b, edge.poi_a)
        };

        let mut catalog = self.catalog.write();
        for id in [a, b] {
            if !catalog.pois.iter().any(|p| p.id == id) {
                return Err(EngineError::UnknownPoi(id));
            }
        }
        let existing = catalog
            .edges
            .iter()
            .position(|e| e.poi_a == a && e.poi_b == b);
        match existing {
            Some(i) => {
                let previous =
                    std::mem::replace(&mut catalog.edges[i].weight_meters, edge.weight_meters);
                self.commit(&mut catalog, (), |c| c.edges[i].weight_meters = previous)
            }
            None => {
                catalog.edges.push(GraphEdge {
                    poi_a: a,
                    poi_b: b,
                    weight_meters: edge.weight_meters,
                });
                self.commit(&mut catalog, (), |c| {
                    c.edges.pop();
                })
            }
        }
    }

    async fn add_document(&self, doc: NewDocument, replace_existing: bool) -> Result<DocumentWrite> {
        let mut catalog = self.catalog.write();
        let position = if replace_existing {
            catalog
                .documents
                .iter()
                .position(|d| d.title == doc.title && d.source == doc.source)
        } else {
            None
        };

        match position {
            Some(i) => {
                let previous = catalog.documents[i].clone();
                let row = &mut catalog.documents[i];
                row.content = doc.content;
                row.tags = doc.tags;
                row.embedding = doc.embedding;
                row.created_at = Utc::now();
                let id = row.id;
                self.commit(&mut catalog, DocumentWrite::Replaced(id), |c| {
                    c.documents[i] = previous;
                })
            }
            None => {
                let id = catalog.documents.iter().map(|d| d.id).max().unwrap_or(0) + 1;
                catalog.documents.push(Document {
                    id,
                    title: doc.title,
                    content: doc.content,
                    source: doc.source,
                    tags: doc.tags,
                    embedding: doc.embedding,
                    created_at: Utc::now(),
                });
                self.commit(&mut catalog, DocumentWrite::Inserted(id), |c| {
                    c.documents.pop();
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{normalize_tags, Coordinate};

    fn poi(name: &str, category: Category, lat: f64, lon: f64) -> NewPoi {
        NewPoi {
            name: name.to_string(),
            category,
            coordinate: Coordinate { lat, lon },
            description: None,
            tags: normalize_tags(["campus"]),
        }
    }

    fn doc(title: &str, source: &str, tags: &[&str]) -> NewDocument {
        NewDocument {
            title: title.to_string(),
            content: format!("{title} content"),
            source: source.to_string(),
            tags: normalize_tags(tags.iter().copied()),
            embedding: vec![1.0, 0.0],
        }
    }

    #[tokio::test]
    async fn test_pois_filtered_by_category() {
        let store = SnapshotStore::in_memory();
        store.add_poi(poi("Gate", Category::Gate, 8.5569, 39.2911)).await.unwrap();
        store.add_poi(poi("Lib", Category::Library, 8.5582, 39.2922)).await.unwrap();

        let all = store.load_pois(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, 1);

        let libs = store.load_pois(Some(&Category::Library)).await.unwrap();
        assert_eq!(libs.len(), 1);
        assert_eq!(libs[0].name, "Lib");
    }

    #[tokio::test]
    async fn test_add_poi_rejects_bad_coordinate() {
        let store = SnapshotStore::in_memory();
        let err = store
            .add_poi(poi("Nowhere", Category::Gate, 120.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidCoordinate { .. }));
    }

    #[tokio::test]
    async fn test_edges_are_normalized_and_validated() {
        let store = SnapshotStore::in_memory();
        let a = store.add_poi(poi("A", Category::Building, 8.0, 39.0)).await.unwrap();
        let b = store.add_poi(poi("B", Category::Building, 8.001, 39.0)).await.unwrap();

        store
            .add_edge(GraphEdge { poi_a: b, poi_b: a, weight_meters: None })
            .await
            .unwrap();
        store
            .add_edge(GraphEdge { poi_a: a, poi_b: b, weight_meters: Some(90.0) })
            .await
            .unwrap();

        let edges = store.load_edges().await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].poi_a, edges[0].poi_b), (a, b));
        assert_eq!(edges[0].weight_meters, Some(90.0));

        assert!(store
            .add_edge(GraphEdge { poi_a: a, poi_b: a, weight_meters: None })
            .await
            .is_err());
        assert_eq!(
            store
                .add_edge(GraphEdge { poi_a: a, poi_b: 77, weight_meters: None })
                .await
                .unwrap_err(),
            EngineError::UnknownPoi(77)
        );
    }

    #[tokio::test]
    async fn test_replace_existing_document() {
        let store = SnapshotStore::in_memory();
        let first = store.add_document(doc("Library", "Handbook", &["library"]), true).await.unwrap();
        let again = store.add_document(doc("Library", "Handbook", &["library"]), true).await.unwrap();
        assert_eq!(first, DocumentWrite::Inserted(1));
        assert_eq!(again, DocumentWrite::Replaced(1));
        assert_eq!(store.counts().documents, 1);

        let dup = store.add_document(doc("Library", "Handbook", &["library"]), false).await.unwrap();
        assert_eq!(dup, DocumentWrite::Inserted(2));
        assert_eq!(store.counts().documents, 2);
    }

    #[tokio::test]
    async fn test_documents_filtered_by_any_tag() {
        let store = SnapshotStore::in_memory();
        store.add_document(doc("Library", "s", &["library", "study"]), true).await.unwrap();
        store.add_document(doc("Clinic", "s", &["health"]), true).await.unwrap();
        store.add_document(doc("Exams", "s", &["study", "rules"]), true).await.unwrap();

        let study = store
            .load_documents(Some(&["Study".to_string()]))
            .await
            .unwrap();
        let titles: Vec<&str> = study.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Library", "Exams"]);

        assert_eq!(store.load_documents(None).await.unwrap().len(), 3);
        assert_eq!(store.load_documents(Some(&[])).await.unwrap().len(), 3);
        assert!(store
            .load_documents(Some(&["parking".to_string()]))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let store = SnapshotStore::open_or_create(&path).unwrap();
        let a = store.add_poi(poi("A", Category::Building, 8.0, 39.0)).await.unwrap();
        let b = store.add_poi(poi("B", Category::Building, 8.001, 39.0)).await.unwrap();
        store
            .add_edge(GraphEdge { poi_a: a, poi_b: b, weight_meters: Some(100.0) })
            .await
            .unwrap();
        store.add_document(doc("About", "site", &["about"]), true).await.unwrap();

        // A directory where the temp file should go makes every write fail.
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();

        let err = store
            .add_poi(poi("C", Category::Building, 8.002, 39.0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Store { .. }));
        assert!(store
            .add_edge(GraphEdge { poi_a: a, poi_b: b, weight_meters: Some(5.0) })
            .await
            .is_err());
        let mut replacement = doc("About", "site", &["changed"]);
        replacement.content = "rewritten".to_string();
        assert!(store.add_document(replacement, true).await.is_err());
        assert!(store.add_document(doc("New", "site", &[]), true).await.is_err());

        let counts = store.counts();
        assert_eq!((counts.pois, counts.edges, counts.documents), (2, 1, 1));
        let edges = store.load_edges().await.unwrap();
        assert_eq!(edges[0].weight_meters, Some(100.0));
        let docs = store.load_documents(None).await.unwrap();
        assert_eq!(docs[0].content, "About content");
        assert!(docs[0].tags.contains("about"));
    }

    #[tokio::test]
    async fn test_snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        {
            let store = SnapshotStore::open_or_create(&path).unwrap();
            store.add_poi(poi("Gate", Category::Gate, 8.5569, 39.2911)).await.unwrap();
            store.add_document(doc("About", "site", &["about"]), true).await.unwrap();
        }
        let reopened = SnapshotStore::open_or_create(&path).unwrap();
        let counts = reopened.counts();
        assert_eq!(counts.pois, 1);
        assert_eq!(counts.documents, 1);
        assert!(reopened.test_connection().await);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
