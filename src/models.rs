use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{EngineError, Result};

pub type PoiId = i64;
pub type DocumentId = i64;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting values outside [-90, 90] x [-180, 180].
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        let coord = Self { lat, lon };
        coord.validate()?;
        Ok(coord)
    }

    pub fn validate(&self) -> Result<()> {
        let lat_ok = self.lat.is_finite() && (-90.0..=90.0).contains(&self.lat);
        let lon_ok = self.lon.is_finite() && (-180.0..=180.0).contains(&self.lon);
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(EngineError::InvalidCoordinate {
                lat: self.lat,
                lon: self.lon,
            })
        }
    }
}

/// POI category. Known campus and city categories get their own variant;
/// anything else is carried verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Gate,
    Building,
    Administrative,
    Library,
    Facility,
    Laboratory,
    Dormitory,
    Sports,
    Religious,
    Parking,
    Transport,
    Mosque,
    Pharmacy,
    Salon,
    Cafe,
    Restaurant,
    Bank,
    Atm,
    Hospital,
    Clinic,
    Supermarket,
    Market,
    Bakery,
    Hotel,
    Taxi,
    Shop,
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Gate => "gate",
            Self::Building => "building",
            Self::Administrative => "administrative",
            Self::Library => "library",
            Self::Facility => "facility",
            Self::Laboratory => "laboratory",
            Self::Dormitory => "dormitory",
            Self::Sports => "sports",
            Self::Religious => "religious",
            Self::Parking => "parking",
            Self::Transport => "transport",
            Self::Mosque => "mosque",
            Self::Pharmacy => "pharmacy",
            Self::Salon => "salon",
            Self::Cafe => "cafe",
            Self::Restaurant => "restaurant",
            Self::Bank => "bank",
            Self::Atm => "atm",
            Self::Hospital => "hospital",
            Self::Clinic => "clinic",
            Self::Supermarket => "supermarket",
            Self::Market => "market",
            Self::Bakery => "bakery",
            Self::Hotel => "hotel",
            Self::Taxi => "taxi",
            Self::Shop => "shop",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        let normalized = value.trim().to_lowercase();
        match normalized.as_str() {
            "gate" => Self::Gate,
            "building" => Self::Building,
            "administrative" => Self::Administrative,
            "library" => Self::Library,
            "facility" => Self::Facility,
            "laboratory" | "lab" => Self::Laboratory,
            "dormitory" => Self::Dormitory,
            "sports" => Self::Sports,
            "religious" => Self::Religious,
            "parking" => Self::Parking,
            "transport" => Self::Transport,
            "mosque" => Self::Mosque,
            "pharmacy" => Self::Pharmacy,
            "salon" => Self::Salon,
            "cafe" => Self::Cafe,
            "restaurant" => Self::Restaurant,
            "bank" => Self::Bank,
            "atm" => Self::Atm,
            "hospital" => Self::Hospital,
            "clinic" => Self::Clinic,
            "supermarket" => Self::Supermarket,
            "market" => Self::Market,
            "bakery" => Self::Bakery,
            "hotel" => Self::Hotel,
            "taxi" => Self::Taxi,
            "shop" => Self::Shop,
            _ => Self::Other(normalized),
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trim, lowercase and deduplicate free-form tags.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// A named, geolocated campus or city entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: PoiId,
    pub name: String,
    pub category: Category,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl PointOfInterest {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.latitude,
            lon: self.longitude,
        }
    }
}

/// A curated knowledge document with its precomputed embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub content: String,
    pub source: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// An undirected walkable connection between two POIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub poi_a: PoiId,
    pub poi_b: PoiId,
    /// Curated walking cost in meters. When absent the geodesic distance
    /// between the endpoints is used.
    #[serde(default)]
    pub weight_meters: Option<f64>,
}

/// A document returned by semantic search, without its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHit {
    pub id: DocumentId,
    pub title: String,
    pub content: String,
    pub source: String,
    pub tags: BTreeSet<String>,
    pub score: f32,
}

impl DocumentHit {
    pub fn from_document(doc: &Document, score: f32) -> Self {
        Self {
            id: doc.id,
            title: doc.title.clone(),
            content: doc.content.clone(),
            source: doc.source.clone(),
            tags: doc.tags.clone(),
            score,
        }
    }
}

/// A POI found by a nearby search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyHit {
    pub poi: PointOfInterest,
    pub distance_meters: f64,
    pub bearing_degrees: f64,
}

/// One hop of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub from: PoiId,
    pub to: PoiId,
    pub distance_meters: f64,
    pub bearing_degrees: f64,
}

/// A shortest walking path between two POIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub path: Vec<PointOfInterest>,
    pub legs: Vec<RouteLeg>,
    pub total_distance_meters: f64,
    pub estimated_walk_seconds: u64,
}

/// Outcome of a grounded question answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Answer {
    Grounded {
        answer: String,
        citations: Vec<DocumentHit>,
    },
    /// No document cleared the similarity threshold; nothing was generated.
    InsufficientContext,
}

/// Question request
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

/// Document search request
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Restrict candidates to documents carrying any of these tags
    pub tags: Option<Vec<String>>,
}

fn default_top_k() -> usize {
    5
}

/// Nearby query string parameters
#[derive(Debug, Clone, Deserialize)]
pub struct NearbyParams {
    pub lat: f64,
    pub lon: f64,
    #[serde(default = "default_radius")]
    pub radius: f64,
    pub category: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_radius() -> f64 {
    500.0
}

fn default_limit() -> usize {
    10
}

/// Route query string parameters
#[derive(Debug, Clone, Deserialize)]
pub struct RouteParams {
    pub from: PoiId,
    pub to: PoiId,
}

/// Document search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<DocumentHit>,
    pub total: usize,
}

/// Nearby search response
#[derive(Debug, Clone, Serialize)]
pub struct NearbyResponse {
    pub results: Vec<NearbyHit>,
    pub total: usize,
}
