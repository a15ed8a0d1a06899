//! Shortest walking routes over the POI graph.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use crate::cache::{CacheKey, ResultCache};
use crate::error::{EngineError, Result};
use crate::math::geo;
use crate::models::{GraphEdge, PointOfInterest, PoiId, Route, RouteLeg};
use crate::store::Store;
use crate::upstream::RetryPolicy;

/// Average walking speed used for time estimates.
pub const WALKING_SPEED_MPS: f64 = 1.4;

pub struct RouteEngine {
    store: Arc<dyn Store>,
    cache: ResultCache<Route>,
    retry: RetryPolicy,
}

impl RouteEngine {
    pub fn new(store: Arc<dyn Store>, cache: ResultCache<Route>, retry: RetryPolicy) -> Self {
        Self {
            store,
            cache,
            retry,
        }
    }

    /// Cheapest path from `origin` to `destination`.
    pub async fn route(&self, origin: PoiId, destination: PoiId) -> Result<Route> {
        let key = CacheKey::builder("route")
            .i64(origin)
            .i64(destination)
            .finish();
        self.cache
            .get_or_try_insert(key, self.cache.default_ttl(), self.compute(origin, destination))
            .await
    }

    async fn compute(&self, origin: PoiId, destination: PoiId) -> Result<Route> {
        let (pois, edges) = futures_util::future::try_join(
            self.retry.run("load pois", || self.store.load_pois(None)),
            self.retry.run("load edges", || self.store.load_edges()),
        )
        .await?;

        let graph = WalkGraph::build(pois, &edges);
        let route = graph.shortest_path(origin, destination)?;
        tracing::debug!(
            "route {origin} -> {destination}: {} stops, {:.0} m",
            route.path.len(),
            route.total_distance_meters
        );
        Ok(route)
    }

    pub fn cache(&self) -> &ResultCache<Route> {
        &self.cache
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }
}

/// Undirected adjacency over POIs. Node indices follow POI id order and each
/// adjacency list follows edge `(a, b)` order, so traversal is deterministic.
pub struct WalkGraph {
    pois: Vec<PointOfInterest>,
    index: HashMap<PoiId, usize>,
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl WalkGraph {
    pub fn build(mut pois: Vec<PointOfInterest>, edges: &[GraphEdge]) -> Self {
        pois.sort_by_key(|p| p.id);
        let index: HashMap<PoiId, usize> =
            pois.iter().enumerate().map(|(i, p)| (p.id, i)).collect();

        let mut ordered: Vec<&GraphEdge> = edges.iter().collect();
        ordered.sort_by_key(|e| (e.poi_a.min(e.poi_b), e.poi_a.max(e.poi_b)));

        let mut adjacency = vec![Vec::new(); pois.len()];
        for edge in ordered {
            let (Some(&a), Some(&b)) = (index.get(&edge.poi_a), index.get(&edge.poi_b)) else {
                tracing::warn!(
                    "Skipping edge {} - {}: unknown endpoint",
                    edge.poi_a,
                    edge.poi_b
                );
                continue;
            };
            if a == b {
                tracing::warn!("Skipping self-loop on POI {}", edge.poi_a);
                continue;
            }
            let weight = match edge.weight_meters {
                Some(w) if w.is_finite() && w >= 0.0 => w,
                Some(w) => {
                    tracing::warn!(
                        "Skipping edge {} - {}: invalid weight {w}",
                        edge.poi_a,
                        edge.poi_b
                    );
                    continue;
                }
                None => geo::haversine(&pois[a].coordinate(), &pois[b].coordinate()),
            };
            adjacency[a].push((b, weight));
            adjacency[b].push((a, weight));
        }

        Self {
            pois,
            index,
            adjacency,
        }
    }

    fn node(&self, id: PoiId) -> Result<usize> {
        self.index
            .get(&id)
            .copied()
            .ok_or(EngineError::UnknownPoi(id))
    }

    /// Dijkstra from `origin`. Among equal-cost paths the one discovered
    /// first wins: a node's predecessor only changes on a strictly shorter
    /// distance.
    pub fn shortest_path(&self, origin: PoiId, destination: PoiId) -> Result<Route> {
        let start = self.node(origin)?;
        let goal = self.node(destination)?;
        if start == goal {
            return Ok(self.assemble(vec![start]));
        }

        let mut dist = vec![f64::INFINITY; self.pois.len()];
        let mut prev: Vec<Option<usize>> = vec![None; self.pois.len()];
        let mut frontier = BinaryHeap::new();
        dist[start] = 0.0;
        frontier.push(Frontier {
            cost: 0.0,
            node: start,
        });

        while let Some(Frontier { cost, node }) = frontier.pop() {
            if node == goal {
                break;
            }
            if cost > dist[node] {
                continue;
            }
            for &(next, weight) in &self.adjacency[node] {
                let candidate = cost + weight;
                if candidate < dist[next] {
                    dist[next] = candidate;
                    prev[next] = Some(node);
                    frontier.push(Frontier {
                        cost: candidate,
                        node: next,
                    });
                }
            }
        }

        if dist[goal].is_infinite() {
            return Err(EngineError::NoPathFound {
                from: origin,
                to: destination,
            });
        }

        let mut nodes = vec![goal];
        let mut cursor = goal;
        while let Some(p) = prev[cursor] {
            nodes.push(p);
            cursor = p;
        }
        nodes.reverse();
        Ok(self.assemble(nodes))
    }

    fn edge_weight(&self, from: usize, to: usize) -> f64 {
        self.adjacency[from]
            .iter()
            .filter(|(n, _)| *n == to)
            .map(|(_, w)| *w)
            .fold(f64::INFINITY, f64::min)
    }

    fn assemble(&self, nodes: Vec<usize>) -> Route {
        let legs: Vec<RouteLeg> = nodes
            .windows(2)
            .map(|pair| {
                let (from, to) = (&self.pois[pair[0]], &self.pois[pair[1]]);
                RouteLeg {
                    from: from.id,
                    to: to.id,
                    distance_meters: self.edge_weight(pair[0], pair[1]),
                    bearing_degrees: geo::initial_bearing(&from.coordinate(), &to.coordinate()),
                }
            })
            .collect();
        let total_distance_meters: f64 = legs.iter().map(|l| l.distance_meters).sum();

        Route {
            path: nodes.iter().map(|&i| self.pois[i].clone()).collect(),
            legs,
            total_distance_meters,
            estimated_walk_seconds: (total_distance_meters / WALKING_SPEED_MPS).round() as u64,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f64,
    node: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    // Reversed so BinaryHeap pops the cheapest node, lowest index first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::store::{CatalogWriter, SnapshotStore};
    use crate::testing::{add_edge, add_poi, campus_store};
    use chrono::Utc;
    use std::time::Duration;

    fn engine(store: Arc<SnapshotStore>) -> RouteEngine {
        RouteEngine::new(
            store,
            ResultCache::new("routes", 64, Duration::from_secs(60)),
            RetryPolicy::new(Duration::from_secs(1), Duration::from_millis(1)),
        )
    }

    fn poi(id: PoiId, lat: f64, lon: f64) -> PointOfInterest {
        PointOfInterest {
            id,
            name: format!("poi {id}"),
            category: Category::Building,
            latitude: lat,
            longitude: lon,
            description: None,
            tags: Default::default(),
            created_at: Utc::now(),
        }
    }

    fn edge(a: PoiId, b: PoiId, w: f64) -> GraphEdge {
        GraphEdge {
            poi_a: a,
            poi_b: b,
            weight_meters: Some(w),
        }
    }

    fn ids(route: &Route) -> Vec<PoiId> {
        route.path.iter().map(|p| p.id).collect()
    }

    #[tokio::test]
    async fn test_gate_to_library_via_block1() {
        let (store, [gate, library, block1]) = campus_store().await;
        let route = engine(store).route(gate, library).await.unwrap();
        assert_eq!(ids(&route), vec![gate, block1, library]);
        assert!((route.total_distance_meters - 270.0).abs() < 1e-9);
        assert_eq!(route.legs.len(), 2);
        assert_eq!(route.legs[0].distance_meters, 150.0);
        assert_eq!(route.estimated_walk_seconds, 193);
    }

    #[tokio::test]
    async fn test_route_is_symmetric_in_distance() {
        let (store, [gate, library, block1]) = campus_store().await;
        let engine = engine(store);
        let back = engine.route(library, gate).await.unwrap();
        assert_eq!(ids(&back), vec![library, block1, gate]);
        assert!((back.total_distance_meters - 270.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_same_origin_and_destination() {
        let (store, [gate, _, _]) = campus_store().await;
        let route = engine(store).route(gate, gate).await.unwrap();
        assert_eq!(ids(&route), vec![gate]);
        assert_eq!(route.total_distance_meters, 0.0);
        assert!(route.legs.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_poi() {
        let (store, [gate, _, _]) = campus_store().await;
        let engine = engine(store);
        assert_eq!(
            engine.route(gate, 999).await.unwrap_err(),
            EngineError::UnknownPoi(999)
        );
        assert_eq!(
            engine.route(999, 999).await.unwrap_err(),
            EngineError::UnknownPoi(999)
        );
    }

    #[tokio::test]
    async fn test_disconnected_is_no_path() {
        let (store, [gate, _, _]) = campus_store().await;
        let island = add_poi(&store, "Sports Field", Category::Sports, 8.5600, 39.2950).await;
        let err = engine(store).route(gate, island).await.unwrap_err();
        assert!(matches!(err, EngineError::NoPathFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_weight_uses_geodesic_distance() {
        let store = Arc::new(SnapshotStore::in_memory());
        let a = add_poi(&store, "A", Category::Building, 0.0, 0.0).await;
        let b = add_poi(&store, "B", Category::Building, 1.0, 0.0).await;
        add_edge(&store, a, b, None).await;
        let route = engine(store).route(a, b).await.unwrap();
        assert!((route.total_distance_meters - 111_195.0).abs() < 1.0);
    }

    #[tokio::test]
    async fn test_graph_change_visible_after_invalidation() {
        let (store, [gate, library, _]) = campus_store().await;
        let engine = engine(store.clone());
        assert!((engine.route(gate, library).await.unwrap().total_distance_meters - 270.0).abs() < 1e-9);

        store
            .add_edge(edge(gate, library, 200.0))
            .await
            .unwrap();
        engine.invalidate_cache();
        let shortcut = engine.route(gate, library).await.unwrap();
        assert_eq!(ids(&shortcut), vec![gate, library]);
        assert_eq!(shortcut.total_distance_meters, 200.0);
    }

    #[test]
    fn test_prefers_cheaper_longer_path() {
        let pois = vec![poi(1, 0.0, 0.0), poi(2, 0.0, 0.001), poi(3, 0.0, 0.002)];
        let edges = vec![edge(1, 2, 10.0), edge(1, 3, 50.0), edge(2, 3, 10.0)];
        let route = WalkGraph::build(pois, &edges).shortest_path(1, 3).unwrap();
        assert_eq!(ids(&route), vec![1, 2, 3]);
        assert_eq!(route.total_distance_meters, 20.0);
    }

    #[test]
    fn test_equal_cost_tie_is_deterministic() {
        // 1-2-4 and 1-3-4 both cost 20.
        let pois = vec![
            poi(1, 0.0, 0.0),
            poi(2, 0.001, 0.001),
            poi(3, -0.001, 0.001),
            poi(4, 0.0, 0.002),
        ];
        let edges = vec![
            edge(3, 4, 10.0),
            edge(1, 3, 10.0),
            edge(2, 4, 10.0),
            edge(1, 2, 10.0),
        ];
        let first = WalkGraph::build(pois.clone(), &edges).shortest_path(1, 4).unwrap();
        assert_eq!(ids(&first), vec![1, 2, 4]);

        let mut shuffled = edges.clone();
        shuffled.reverse();
        let mut reversed_pois = pois;
        reversed_pois.reverse();
        let second = WalkGraph::build(reversed_pois, &shuffled).shortest_path(1, 4).unwrap();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_invalid_edges_are_skipped() {
        let pois = vec![poi(1, 0.0, 0.0), poi(2, 0.0, 0.001)];
        let edges = vec![
            edge(1, 2, -5.0),
            edge(1, 77, 1.0),
            GraphEdge {
                poi_a: 1,
                poi_b: 2,
                weight_meters: Some(f64::NAN),
            },
        ];
        let err = WalkGraph::build(pois, &edges).shortest_path(1, 2).unwrap_err();
        assert!(matches!(err, EngineError::NoPathFound { .. }));
    }

    #[test]
    fn test_legs_sum_to_total() {
        let pois = vec![
            poi(1, 0.0, 0.0),
            poi(2, 0.0, 0.001),
            poi(3, 0.0, 0.002),
            poi(4, 0.0, 0.003),
        ];
        let edges = vec![edge(1, 2, 12.5), edge(2, 3, 7.25), edge(3, 4, 30.0)];
        let route = WalkGraph::build(pois, &edges).shortest_path(1, 4).unwrap();
        let sum: f64 = route.legs.iter().map(|l| l.distance_meters).sum();
        assert_eq!(sum, route.total_distance_meters);
        assert_eq!(route.path.first().map(|p| p.id), Some(1));
        assert_eq!(route.path.last().map(|p| p.id), Some(4));
        // Due east.
        assert!((route.legs[0].bearing_degrees - 90.0).abs() < 1e-6);
    }
}
