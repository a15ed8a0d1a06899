//! # campus-route
//!
//! Retrieval and routing engine for a university campus: grounded question
//! answering over a curated document corpus, "what is near me" lookup over
//! points of interest, and shortest walking routes between them.
//!
//! ## Architecture
//!
//! ```text
//!        POST /api/query     POST /api/search    GET /api/nearby    GET /api/route
//!               │                   │                  │                  │
//!               ▼                   │                  │                  │
//!     ┌───────────────────┐         │                  │                  │
//!     │ QueryOrchestrator │         │                  │                  │
//!     │  k docs ≥ 0.35    │         │                  │                  │
//!     └──┬─────────────┬──┘         │                  │                  │
//!        │             │            ▼                  ▼                  ▼
//!        │             │   ┌───────────────┐   ┌──────────────┐   ┌──────────────┐
//!        │             └──▶│ DocumentIndex │   │ NearbyEngine │   │ RouteEngine  │
//!        │                 │ cosine top-k  │   │  haversine   │   │  Dijkstra    │
//!        │                 └──┬──────┬─────┘   └──┬──────┬────┘   └──┬──────┬────┘
//!        ▼                    │      │            │      │           │      │
//!  ┌────────────┐   ┌─────────┴──┐   │    ┌───────┴──────┴───────────┴──┐   │
//!  │ Generation │   │ Embedding  │   │    │ ResultCache (moka, per-     │   │
//!  │  provider  │   │  provider  │   │    │ engine TTL, single-flight)  │   │
//!  └────────────┘   └────────────┘   │    └─────────────────────────────┘   │
//!                                    ▼                                      ▼
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │      Store (SnapshotStore: POIs, edges, docs)        │
//!                      └──────────────────────────────────────────────────────┘
//! ```
//!
//! Every call that leaves the process (store and provider) runs under a
//! [`upstream::RetryPolicy`]: one timeout per attempt, one retry for
//! transient failures.
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, caches, RAG and LLM settings
//! - [`models`] - Shared data types: `PointOfInterest`, `Document`, `Route`, request/response types
//! - [`error`] - `EngineError`, the failure taxonomy shared by all engines
//! - [`math::geo`] - Haversine distance and initial bearing
//! - [`math::vector`] - Cosine similarity and embedding validation
//! - [`cache`] - `ResultCache`: digest keys, per-entry TTL, LRU bound, single-flight
//! - [`store`] - `Store`/`CatalogWriter` traits and the JSON `SnapshotStore`
//! - [`llm`] - Embedding and generation providers (Ollama, OpenAI-compatible, Gemini)
//! - [`search::documents`] - Semantic document search with partial top-k selection
//! - [`search::nearby`] - Radius search over POIs
//! - [`search::route`] - Shortest walking routes over the POI graph
//! - [`answer`] - Retrieval-augmented answers with an explicit insufficient-context outcome
//! - [`ingest`] - Paced seeding of POIs, edges and embedded documents
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Composition root wiring the engines together

pub mod answer;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod math;
pub mod models;
pub mod search;
pub mod state;
pub mod store;
pub mod upstream;

#[cfg(test)]
mod testing;
