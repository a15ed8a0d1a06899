//! Fakes shared by unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::llm::{EmbeddingProvider, GenerationProvider};
use crate::models::{normalize_tags, Category, Coordinate, GraphEdge, PoiId};
use crate::store::{CatalogWriter, NewDocument, NewPoi, SnapshotStore};

/// Embeds known texts to fixed vectors; anything else maps to `fallback`.
pub struct FakeEmbedder {
    pub dim: usize,
    pub vectors: HashMap<String, Vec<f32>>,
    pub fallback: Vec<f32>,
    pub fail_with: Option<EngineError>,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        let mut fallback = vec![0.0; dim];
        fallback[dim - 1] = 1.0;
        Self {
            dim,
            vectors: HashMap::new(),
            fallback,
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn failing(mut self, err: EngineError) -> Self {
        self.fail_with = Some(err);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn model(&self) -> &str {
        "fake-embed"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Returns a canned answer and records every prompt.
pub struct FakeGenerator {
    pub reply: String,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl GenerationProvider for FakeGenerator {
    fn model(&self) -> &str {
        "fake-chat"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

pub async fn add_poi(
    store: &SnapshotStore,
    name: &str,
    category: Category,
    lat: f64,
    lon: f64,
) -> PoiId {
    store
        .add_poi(NewPoi {
            name: name.to_string(),
            category,
            coordinate: Coordinate { lat, lon },
            description: None,
            tags: normalize_tags([name]),
        })
        .await
        .unwrap()
}

pub async fn add_edge(store: &SnapshotStore, a: PoiId, b: PoiId, weight: Option<f64>) {
    store
        .add_edge(GraphEdge {
            poi_a: a,
            poi_b: b,
            weight_meters: weight,
        })
        .await
        .unwrap()
}

pub async fn add_document(store: &SnapshotStore, title: &str, tags: &[&str], embedding: Vec<f32>) {
    store
        .add_document(
            NewDocument {
                title: title.to_string(),
                content: format!("{title}: details for students."),
                source: "Student Handbook".to_string(),
                tags: normalize_tags(tags.iter().copied()),
                embedding,
            },
            false,
        )
        .await
        .unwrap();
}

/// MainGate, Library and Block1 with MainGate–Block1 (150 m) and
/// Block1–Library (120 m).
pub async fn campus_store() -> (Arc<SnapshotStore>, [PoiId; 3]) {
    let store = Arc::new(SnapshotStore::in_memory());
    let gate = add_poi(&store, "Main Gate", Category::Gate, 8.5569, 39.2911).await;
    let library = add_poi(&store, "Library", Category::Library, 8.5582, 39.2922).await;
    let block1 = add_poi(&store, "Block 1", Category::Building, 8.5575, 39.2920).await;
    add_edge(&store, gate, block1, Some(150.0)).await;
    add_edge(&store, block1, library, Some(120.0)).await;
    (store, [gate, library, block1])
}
