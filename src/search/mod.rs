//! The three retrieval engines.

pub mod documents;
pub mod nearby;
pub mod route;

pub use documents::DocumentIndex;
pub use nearby::{NearbyEngine, NearbyQuery};
pub use route::RouteEngine;
