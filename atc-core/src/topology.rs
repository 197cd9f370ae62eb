//! Airport topology: runways plus a directed, weighted taxiway graph.
//!
//! The graph is an adjacency list over node indices. Edges carry a distance
//! in metres and a taxiway label; a bidirectional edge is two directed edges
//! with the same weight. Queries return `Option`/empty results for unknown
//! ids or disconnected nodes, since networks are often loaded piecemeal.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{AirportConfig, EdgeConfig, NodeConfig, RunwayConfig};
use crate::geo::{self, Position, METERS_PER_NM};
use crate::types::{AtcError, Result};

/// Default heading tolerance for [`AirportTopology::get_runway_by_heading`].
pub const DEFAULT_HEADING_TOLERANCE: f64 = 15.0;

/// Runways whose headings differ by this range are treated as crossing.
const INTERSECT_MIN_DEG: f64 = 45.0;
const INTERSECT_MAX_DEG: f64 = 135.0;

// ---------------------------------------------------------------------------
// Runway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runway {
    pub name: String,
    /// Magnetic heading, 0-360.
    pub magnetic_heading: f64,
    pub length_feet: f64,
    pub width_feet: f64,
    pub threshold: Position,
    pub occupied: bool,
    pub occupied_by: Option<String>,
    pub active: bool,
    pub ils_available: bool,
}

impl Runway {
    pub fn new(name: impl Into<String>, magnetic_heading: f64, threshold: Position) -> Self {
        Runway {
            name: name.into(),
            magnetic_heading,
            length_feet: 0.0,
            width_feet: 150.0,
            threshold,
            occupied: false,
            occupied_by: None,
            active: true,
            ils_available: false,
        }
    }

    pub fn threshold_node_id(&self) -> String {
        threshold_node_id(&self.name)
    }

    pub fn reciprocal_heading(&self) -> f64 {
        geo::normalize_heading(self.magnetic_heading + 180.0)
    }

    /// Wind within 90 degrees of the runway heading.
    pub fn is_headwind(&self, wind_dir: f64) -> bool {
        geo::is_headwind(self.magnetic_heading, wind_dir, 90.0)
    }

    pub fn tailwind_component(&self, wind_dir: f64, wind_speed: f64) -> f64 {
        geo::tailwind_component(self.magnetic_heading, wind_dir, wind_speed)
    }

    pub fn headwind_component(&self, wind_dir: f64, wind_speed: f64) -> f64 {
        geo::headwind_component(self.magnetic_heading, wind_dir, wind_speed)
    }
}

pub fn threshold_node_id(runway: &str) -> String {
    format!("{runway}_threshold")
}

// ---------------------------------------------------------------------------
// Nodes and edges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    RunwayEntry,
    RunwayExit,
    Intersection,
    Gate,
    Ramp,
}

/// A vertex of the ground network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxiwayNode {
    pub id: String,
    pub position: Position,
    pub node_type: NodeType,
    pub runways_accessible: Vec<String>,
}

/// A taxiway segment between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxiwayEdge {
    pub from: String,
    pub to: String,
    pub distance_meters: f64,
    pub taxiway: String,
    pub bidirectional: bool,
}

#[derive(Debug, Clone)]
struct Link {
    to: usize,
    distance_meters: f64,
    taxiway: String,
}

/// Result of a shortest-path query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxiRoute {
    pub nodes: Vec<String>,
    pub distance_meters: f64,
    /// Taxiway names in travel order, consecutive repeats collapsed.
    pub taxiways: Vec<String>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Non-fatal structural finding reported by [`AirportTopology::validate_topology`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyIssue {
    Disconnected { components: usize },
    MissingThreshold { runway: String },
    IsolatedNode { node: String },
}

impl fmt::Display for TopologyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyIssue::Disconnected { components } => {
                write!(f, "Graph has {components} disconnected components")
            }
            TopologyIssue::MissingThreshold { runway } => {
                write!(f, "Runway {runway} missing threshold node")
            }
            TopologyIssue::IsolatedNode { node } => {
                write!(f, "Node {node} is isolated (no edges)")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Dijkstra frontier entry
// ---------------------------------------------------------------------------

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
    // Reversed so BinaryHeap pops the cheapest entry
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// Physical layout of one airport: runway registry plus ground graph.
#[derive(Debug, Clone, Default)]
pub struct AirportTopology {
    pub airport_code: String,
    runways: Vec<Runway>,
    nodes: Vec<TaxiwayNode>,
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<Link>>,
}

impl AirportTopology {
    pub fn new(airport_code: impl Into<String>) -> Self {
        let airport_code = airport_code.into();
        debug!("initialized topology for {airport_code}");
        AirportTopology {
            airport_code,
            ..Default::default()
        }
    }

    /// Register a runway and its threshold node. A runway with an existing
    /// name replaces the previous definition.
    pub fn add_runway(&mut self, runway: Runway) {
        let node = TaxiwayNode {
            id: runway.threshold_node_id(),
            position: runway.threshold,
            node_type: NodeType::RunwayEntry,
            runways_accessible: vec![runway.name.clone()],
        };

        match self.runways.iter_mut().find(|r| r.name == runway.name) {
            Some(existing) => {
                debug!("replacing runway {}", runway.name);
                *existing = runway;
            }
            None => {
                debug!("added runway {}", runway.name);
                self.runways.push(runway);
            }
        }
        self.add_node(node);
    }

    /// Insert a node, or replace the attributes of an existing one while
    /// keeping its edges.
    pub fn add_node(&mut self, node: TaxiwayNode) {
        match self.index.get(&node.id) {
            Some(&i) => self.nodes[i] = node,
            None => {
                self.index.insert(node.id.clone(), self.nodes.len());
                self.nodes.push(node);
                self.adjacency.push(Vec::new());
            }
        }
    }

    /// Insert a directed edge (two for a bidirectional one). Both endpoints
    /// must already be registered. Re-adding an edge replaces its weight.
    pub fn add_edge(&mut self, edge: TaxiwayEdge) -> Result<()> {
        let from = self.node_index(&edge.from)?;
        let to = self.node_index(&edge.to)?;

        self.insert_arc(from, to, edge.distance_meters, &edge.taxiway);
        if edge.bidirectional {
            self.insert_arc(to, from, edge.distance_meters, &edge.taxiway);
        }
        Ok(())
    }

    fn node_index(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| AtcError::UnknownNode(id.to_string()))
    }

    fn insert_arc(&mut self, from: usize, to: usize, distance_meters: f64, taxiway: &str) {
        let arcs = &mut self.adjacency[from];
        match arcs.iter_mut().find(|a| a.to == to) {
            Some(arc) => {
                arc.distance_meters = distance_meters;
                arc.taxiway = taxiway.to_string();
            }
            None => arcs.push(Link {
                to,
                distance_meters,
                taxiway: taxiway.to_string(),
            }),
        }
    }

    // -- lookups ------------------------------------------------------------

    pub fn runway(&self, name: &str) -> Option<&Runway> {
        self.runways.iter().find(|r| r.name == name)
    }

    pub fn has_runway(&self, name: &str) -> bool {
        self.runway(name).is_some()
    }

    /// Runways in registration order.
    pub fn runways(&self) -> &[Runway] {
        &self.runways
    }

    pub fn node(&self, id: &str) -> Option<&TaxiwayNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn nodes(&self) -> &[TaxiwayNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    /// All directed edges as `TaxiwayEdge`s with `bidirectional: false`.
    pub fn edges(&self) -> Vec<TaxiwayEdge> {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(from, arcs)| {
                arcs.iter().map(move |arc| TaxiwayEdge {
                    from: self.nodes[from].id.clone(),
                    to: self.nodes[arc.to].id.clone(),
                    distance_meters: arc.distance_meters,
                    taxiway: arc.taxiway.clone(),
                    bidirectional: false,
                })
            })
            .collect()
    }

    // -- path finding -------------------------------------------------------

    /// Weighted shortest path as a list of node ids.
    pub fn find_shortest_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        self.find_route(from, to).map(|route| route.nodes)
    }

    /// Dijkstra over taxiway distances. `None` if either id is unknown or
    /// no path exists.
    pub fn find_route(&self, from: &str, to: &str) -> Option<TaxiRoute> {
        let start = *self.index.get(from)?;
        let goal = *self.index.get(to)?;

        let n = self.nodes.len();
        let mut dist = vec![f64::INFINITY; n];
        let mut prev: Vec<Option<usize>> = vec![None; n];
        let mut heap = BinaryHeap::new();

        dist[start] = 0.0;
        heap.push(Frontier {
            cost: 0.0,
            node: start,
        });

        while let Some(Frontier { cost, node }) = heap.pop() {
            if node == goal {
                break;
            }
            if cost > dist[node] {
                continue;
            }
            for arc in &self.adjacency[node] {
                let next = cost + arc.distance_meters;
                if next < dist[arc.to] {
                    dist[arc.to] = next;
                    prev[arc.to] = Some(node);
                    heap.push(Frontier {
                        cost: next,
                        node: arc.to,
                    });
                }
            }
        }

        if dist[goal].is_infinite() {
            debug!("no path found from {from} to {to}");
            return None;
        }

        let mut path = vec![goal];
        let mut cursor = goal;
        while let Some(p) = prev[cursor] {
            path.push(p);
            cursor = p;
        }
        path.reverse();

        let mut taxiways: Vec<String> = Vec::new();
        for pair in path.windows(2) {
            let label = self.adjacency[pair[0]]
                .iter()
                .find(|a| a.to == pair[1])
                .map(|a| a.taxiway.as_str())
                .unwrap_or_default();
            if taxiways.last().map(String::as_str) != Some(label) {
                taxiways.push(label.to_string());
            }
        }

        Some(TaxiRoute {
            nodes: path.iter().map(|&i| self.nodes[i].id.clone()).collect(),
            distance_meters: dist[goal],
            taxiways,
        })
    }

    // -- runway selection ---------------------------------------------------

    /// First runway whose heading is within `tolerance` degrees (wrap-aware).
    pub fn get_runway_by_heading(&self, heading: f64, tolerance: f64) -> Option<&Runway> {
        self.runways.iter().find(|r| {
            geo::angular_difference(geo::normalize_heading(r.magnetic_heading), heading)
                <= tolerance
        })
    }

    /// Runways ranked by headwind component, strongest first. With
    /// `prefer_into_wind`, only runways with the wind within 90 degrees of
    /// their heading are returned.
    pub fn get_active_runways(
        &self,
        wind_dir: f64,
        wind_speed: f64,
        prefer_into_wind: bool,
    ) -> Vec<&Runway> {
        let mut ranked: Vec<(&Runway, f64)> = self
            .runways
            .iter()
            .filter(|r| !prefer_into_wind || r.is_headwind(wind_dir))
            .map(|r| (r, r.headwind_component(wind_dir, wind_speed)))
            .collect();

        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.into_iter().map(|(r, _)| r).collect()
    }

    /// Runways whose heading crosses the named runway at 45-135 degrees.
    ///
    /// This is a heading heuristic, not a geometric intersection test: two
    /// crossing-angle runways at opposite ends of the field still count.
    /// Runway polylines would be needed for a real test.
    pub fn get_intersecting_runways(&self, name: &str) -> Vec<&str> {
        let Some(base) = self.runway(name) else {
            return Vec::new();
        };

        self.runways
            .iter()
            .filter(|r| r.name != name)
            .filter(|r| {
                let diff = geo::angular_difference(base.magnetic_heading, r.magnetic_heading);
                (INTERSECT_MIN_DEG..=INTERSECT_MAX_DEG).contains(&diff)
            })
            .map(|r| r.name.as_str())
            .collect()
    }

    // -- spatial queries ----------------------------------------------------

    pub fn nodes_near_position(&self, position: &Position, radius_meters: f64) -> Vec<&TaxiwayNode> {
        self.nodes
            .iter()
            .filter(|n| geo::distance_nm(position, &n.position) * METERS_PER_NM <= radius_meters)
            .collect()
    }

    /// Ids of nodes from which the runway is directly accessible.
    pub fn runway_occupancy_zone(&self, runway: &str) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.runways_accessible.iter().any(|r| r == runway))
            .map(|n| n.id.as_str())
            .collect()
    }

    // -- validation ---------------------------------------------------------

    /// Structural diagnostics. Never fails; an empty list means clean.
    pub fn validate_topology(&self) -> Vec<TopologyIssue> {
        let mut issues = Vec::new();

        let components = self.weak_component_count();
        if components > 1 {
            issues.push(TopologyIssue::Disconnected { components });
        }

        for runway in &self.runways {
            if !self.index.contains_key(&runway.threshold_node_id()) {
                issues.push(TopologyIssue::MissingThreshold {
                    runway: runway.name.clone(),
                });
            }
        }

        let mut degree = vec![0usize; self.nodes.len()];
        for (from, arcs) in self.adjacency.iter().enumerate() {
            degree[from] += arcs.len();
            for arc in arcs {
                degree[arc.to] += 1;
            }
        }
        for (node, d) in self.nodes.iter().zip(degree) {
            if d == 0 {
                issues.push(TopologyIssue::IsolatedNode {
                    node: node.id.clone(),
                });
            }
        }

        if issues.is_empty() {
            info!("topology {} validation passed", self.airport_code);
        } else {
            warn!(
                "topology {} validation found {} issues",
                self.airport_code,
                issues.len()
            );
            for issue in &issues {
                warn!("  - {issue}");
            }
        }
        issues
    }

    fn weak_component_count(&self) -> usize {
        let n = self.nodes.len();
        let mut parent: Vec<usize> = (0..n).collect();

        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for (from, arcs) in self.adjacency.iter().enumerate() {
            for arc in arcs {
                let a = find(&mut parent, from);
                let b = find(&mut parent, arc.to);
                if a != b {
                    parent[a] = b;
                }
            }
        }

        (0..n).filter(|&i| find(&mut parent, i) == i).count()
    }

    // -- configuration ------------------------------------------------------

    /// Build a topology from configuration: runways, then nodes, then edges.
    pub fn from_config(config: &AirportConfig) -> Result<Self> {
        let mut topology = AirportTopology::new(config.airport_code.clone());

        for rwy in &config.runways {
            if topology.has_runway(&rwy.name) {
                return Err(AtcError::DuplicateRunway(rwy.name.clone()));
            }
            let [lat, lon] = rwy.threshold;
            let mut runway = Runway::new(
                rwy.name.clone(),
                rwy.magnetic_heading,
                Position::new(lat, lon, rwy.threshold_elevation, 0.0),
            );
            runway.length_feet = rwy.length_feet;
            runway.width_feet = rwy.width_feet;
            runway.ils_available = rwy.ils_available;
            topology.add_runway(runway);
        }

        for node in &config.nodes {
            for name in &node.runways_accessible {
                if !topology.has_runway(name) {
                    return Err(AtcError::UnknownRunway(name.clone()));
                }
            }
            let [lat, lon] = node.position;
            topology.add_node(TaxiwayNode {
                id: node.id.clone(),
                position: Position::new(lat, lon, 0.0, 0.0),
                node_type: node.node_type,
                runways_accessible: node.runways_accessible.clone(),
            });
        }

        for edge in &config.edges {
            topology.add_edge(TaxiwayEdge {
                from: edge.from.clone(),
                to: edge.to.clone(),
                distance_meters: edge.distance,
                taxiway: edge.taxiway.clone(),
                bidirectional: edge.bidirectional,
            })?;
        }

        info!(
            "loaded topology for {}: {} runways, {} nodes, {} edges",
            topology.airport_code,
            topology.runways.len(),
            topology.nodes.len(),
            topology.edge_count()
        );
        Ok(topology)
    }

    /// Export as configuration. Threshold nodes are implied by runways and
    /// edges are emitted one per direction.
    pub fn to_config(&self) -> AirportConfig {
        let runway_nodes: Vec<String> = self.runways.iter().map(Runway::threshold_node_id).collect();

        AirportConfig {
            airport_code: self.airport_code.clone(),
            runways: self
                .runways
                .iter()
                .map(|r| RunwayConfig {
                    name: r.name.clone(),
                    magnetic_heading: r.magnetic_heading,
                    length_feet: r.length_feet,
                    width_feet: r.width_feet,
                    threshold: [r.threshold.lat, r.threshold.lon],
                    threshold_elevation: r.threshold.altitude_ft,
                    ils_available: r.ils_available,
                })
                .collect(),
            nodes: self
                .nodes
                .iter()
                .filter(|n| !runway_nodes.contains(&n.id))
                .map(|n| NodeConfig {
                    id: n.id.clone(),
                    position: [n.position.lat, n.position.lon],
                    node_type: n.node_type,
                    runways_accessible: n.runways_accessible.clone(),
                })
                .collect(),
            edges: self
                .edges()
                .into_iter()
                .map(|e| EdgeConfig {
                    from: e.from,
                    to: e.to,
                    distance: e.distance_meters,
                    taxiway: e.taxiway,
                    bidirectional: false,
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
