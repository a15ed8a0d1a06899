//! Persistent catalog of POIs, walkable edges and documents.
//!
//! Engines only see the read-side [`Store`]; ingestion goes through
//! [`CatalogWriter`]. Implementations return owned snapshots so engines never
//! hold references into the store.

pub mod snapshot;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::Result;
use crate::models::{Category, Coordinate, Document, DocumentId, GraphEdge, PointOfInterest, PoiId};

pub use snapshot::SnapshotStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn test_connection(&self) -> bool;

    /// POIs in id order, optionally restricted to one category.
    async fn load_pois(&self, category: Option<&Category>) -> Result<Vec<PointOfInterest>>;

    /// Edges in `(poi_a, poi_b)` order with `poi_a < poi_b`.
    async fn load_edges(&self) -> Result<Vec<GraphEdge>>;

    /// Documents in id order. With `tags`, only documents carrying at least
    /// one of them (case-insensitive).
    async fn load_documents(&self, tags: Option<&[String]>) -> Result<Vec<Document>>;
}

#[derive(Debug, Clone)]
pub struct NewPoi {
    pub name: String,
    pub category: Category,
    pub coordinate: Coordinate,
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub content: String,
    pub source: String,
    pub tags: BTreeSet<String>,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentWrite {
    Inserted(DocumentId),
    /// An existing (title, source) row was overwritten in place.
    Replaced(DocumentId),
}

#[async_trait]
pub trait CatalogWriter: Store {
    async fn add_poi(&self, poi: NewPoi) -> Result<PoiId>;

    /// Add or re-weight an undirected edge. Both endpoints must exist and
    /// differ.
    async fn add_edge(&self, edge: GraphEdge) -> Result<()>;

    /// Insert a document. With `replace_existing`, a document sharing the
    /// same title and source is overwritten and keeps its id.
    async fn add_document(&self, doc: NewDocument, replace_existing: bool) -> Result<DocumentWrite>;
}
