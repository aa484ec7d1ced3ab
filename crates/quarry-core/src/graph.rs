//! Property graph of extracted entities and relations.
//!
//! The [`GraphStore`] trait is the seam to the graph backend; the engine
//! never assumes anything beyond it. [`MemoryGraph`] is the bundled
//! implementation: petgraph as the arena, HashMap indices for O(1) lookup
//! by entity name, so cycles and serialization stay trivial.

use crate::GRAPH_FIELD_SEP;
use async_trait::async_trait;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction as PetDirection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::RwLock;
use tracing::debug;

/// Errors from graph store operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Traversal direction relative to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Direction {
    Out,
    In,
    #[default]
    Both,
}

/// An entity vertex. Identity is the (uppercased) entity name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub name: String,
    pub entity_type: String,
    pub description: String,
    /// Hashes of the chunks this entity was extracted from.
    pub source_ids: BTreeSet<String>,
    #[serde(default)]
    pub community_id: Option<String>,
}

impl Vertex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: String::new(),
            description: String::new(),
            source_ids: BTreeSet::new(),
            community_id: None,
        }
    }

    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = entity_type.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_source(mut self, chunk_hash: impl Into<String>) -> Self {
        self.source_ids.insert(chunk_hash.into());
        self
    }

    /// Source ids joined for rendering into prompt tables.
    pub fn source_id_field(&self) -> String {
        self.source_ids.iter().cloned().collect::<Vec<_>>().join(GRAPH_FIELD_SEP)
    }
}

/// A weighted relation between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub src: String,
    pub tgt: String,
    /// High-level keywords naming the relation.
    pub keywords: String,
    pub description: String,
    /// Additive strength; merged duplicates sum their weights.
    pub weight: f64,
    pub source_ids: BTreeSet<String>,
}

impl Edge {
    pub fn new(src: impl Into<String>, tgt: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            tgt: tgt.into(),
            keywords: String::new(),
            description: String::new(),
            weight: 1.0,
            source_ids: BTreeSet::new(),
        }
    }

    pub fn with_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.keywords = keywords.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_source(mut self, chunk_hash: impl Into<String>) -> Self {
        self.source_ids.insert(chunk_hash.into());
        self
    }
}

/// A materialized slice of the graph returned by [`GraphStore::explore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subgraph {
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
}

/// Interface to the graph backend.
///
/// All methods are async: production backends sit behind a network
/// connection, and the in-memory implementation simply resolves
/// immediately.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Insert or replace the given vertices and edges. Inputs are assumed
    /// to be already merged; an existing vertex/edge is overwritten.
    async fn upsert(&self, vertices: Vec<Vertex>, edges: Vec<Edge>) -> GraphResult<()>;

    async fn get_node(&self, name: &str) -> GraphResult<Option<Vertex>>;

    /// Edge between two entities, matching either orientation.
    async fn get_edge(&self, src: &str, tgt: &str) -> GraphResult<Option<Edge>>;

    /// Edges incident to a node, filtered by direction.
    async fn neighbor_edges(&self, name: &str, direction: Direction) -> GraphResult<Vec<Edge>>;

    /// Edges lying on paths of length one or two between `src` and `tgt`.
    async fn connections(
        &self,
        src: &str,
        tgt: &str,
        direction: Direction,
    ) -> GraphResult<Vec<Edge>>;

    /// Number of edges incident to a node.
    async fn node_degree(&self, name: &str) -> GraphResult<usize>;

    /// Sum of the endpoint degrees.
    async fn edge_degree(&self, src: &str, tgt: &str) -> GraphResult<usize>;

    /// Breadth-first expansion from seed entities.
    async fn explore(
        &self,
        seeds: &[String],
        direction: Direction,
        depth: usize,
        limit: usize,
    ) -> GraphResult<Subgraph>;

    /// Endpoints of the first edge whose keywords match exactly.
    async fn nodes_by_edge_keywords(
        &self,
        keywords: &str,
    ) -> GraphResult<Option<(Vertex, Vertex)>>;
}

struct GraphInner {
    graph: DiGraph<Vertex, Edge>,
    index: HashMap<String, NodeIndex>,
}

/// In-memory petgraph-backed graph store.
pub struct MemoryGraph {
    inner: RwLock<GraphInner>,
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(GraphInner {
                graph: DiGraph::new(),
                index: HashMap::new(),
            }),
        }
    }

    /// Build from a previously saved snapshot.
    pub fn from_subgraph(snapshot: Subgraph) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write().unwrap_or_else(|e| e.into_inner());
            for v in snapshot.vertices {
                inner.insert_vertex(v);
            }
            for e in snapshot.edges {
                inner.insert_edge(e);
            }
        }
        store
    }

    /// Load a JSON snapshot; a missing file yields an empty graph.
    pub fn load(path: impl AsRef<Path>) -> GraphResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "graph snapshot missing, starting empty");
            return Ok(Self::new());
        }
        let data = std::fs::read_to_string(path)?;
        let snapshot: Subgraph =
            serde_json::from_str(&data).map_err(|e| GraphError::Serialization(e.to_string()))?;
        Ok(Self::from_subgraph(snapshot))
    }

    /// Save the whole graph as a JSON snapshot.
    pub fn save(&self, path: impl AsRef<Path>) -> GraphResult<()> {
        let snapshot = self.snapshot();
        let data = serde_json::to_string(&snapshot)
            .map_err(|e| GraphError::Serialization(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Materialize all vertices and edges.
    pub fn snapshot(&self) -> Subgraph {
        let inner = self.read();
        Subgraph {
            vertices: inner.graph.node_weights().cloned().collect(),
            edges: inner.graph.edge_weights().cloned().collect(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.read().graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.read().graph.edge_count()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, GraphInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, GraphInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl GraphInner {
    fn insert_vertex(&mut self, vertex: Vertex) -> NodeIndex {
        if let Some(&idx) = self.index.get(&vertex.name) {
            self.graph[idx] = vertex;
            idx
        } else {
            let name = vertex.name.clone();
            let idx = self.graph.add_node(vertex);
            self.index.insert(name, idx);
            idx
        }
    }

    /// Ensure a node exists, creating a placeholder if the edge arrived
    /// before either endpoint.
    fn ensure_vertex(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        debug!(entity = name, "creating placeholder vertex for dangling edge endpoint");
        self.insert_vertex(Vertex::new(name).with_type("UNKNOWN"))
    }

    fn insert_edge(&mut self, edge: Edge) {
        let src = self.ensure_vertex(&edge.src);
        let tgt = self.ensure_vertex(&edge.tgt);
        if let Some(edge_idx) = self.graph.find_edge(src, tgt) {
            self.graph[edge_idx] = edge;
        } else {
            self.graph.add_edge(src, tgt, edge);
        }
    }

    fn degree(&self, idx: NodeIndex) -> usize {
        self.graph
            .edges_directed(idx, PetDirection::Outgoing)
            .count()
            + self
                .graph
                .edges_directed(idx, PetDirection::Incoming)
                .count()
    }

    fn incident(&self, idx: NodeIndex, direction: Direction) -> Vec<Edge> {
        let mut edges = Vec::new();
        if matches!(direction, Direction::Out | Direction::Both) {
            edges.extend(
                self.graph
                    .edges_directed(idx, PetDirection::Outgoing)
                    .map(|e| e.weight().clone()),
            );
        }
        if matches!(direction, Direction::In | Direction::Both) {
            edges.extend(
                self.graph
                    .edges_directed(idx, PetDirection::Incoming)
                    .map(|e| e.weight().clone()),
            );
        }
        edges
    }

    /// Neighbor node indices reachable over one edge in `direction`.
    fn adjacent(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        if matches!(direction, Direction::Out | Direction::Both) {
            out.extend(self.graph.neighbors_directed(idx, PetDirection::Outgoing));
        }
        if matches!(direction, Direction::In | Direction::Both) {
            out.extend(self.graph.neighbors_directed(idx, PetDirection::Incoming));
        }
        out
    }

    fn edge_between(&self, a: NodeIndex, b: NodeIndex) -> Option<&Edge> {
        self.graph
            .find_edge(a, b)
            .or_else(|| self.graph.find_edge(b, a))
            .map(|idx| &self.graph[idx])
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn upsert(&self, vertices: Vec<Vertex>, edges: Vec<Edge>) -> GraphResult<()> {
        let mut inner = self.write();
        for v in vertices {
            inner.insert_vertex(v);
        }
        for e in edges {
            inner.insert_edge(e);
        }
        Ok(())
    }

    async fn get_node(&self, name: &str) -> GraphResult<Option<Vertex>> {
        let inner = self.read();
        Ok(inner.index.get(name).map(|&idx| inner.graph[idx].clone()))
    }

    async fn get_edge(&self, src: &str, tgt: &str) -> GraphResult<Option<Edge>> {
        let inner = self.read();
        let (Some(&a), Some(&b)) = (inner.index.get(src), inner.index.get(tgt)) else {
            return Ok(None);
        };
        Ok(inner.edge_between(a, b).cloned())
    }

    async fn neighbor_edges(&self, name: &str, direction: Direction) -> GraphResult<Vec<Edge>> {
        let inner = self.read();
        let Some(&idx) = inner.index.get(name) else {
            return Ok(Vec::new());
        };
        Ok(inner.incident(idx, direction))
    }

    async fn connections(
        &self,
        src: &str,
        tgt: &str,
        direction: Direction,
    ) -> GraphResult<Vec<Edge>> {
        let inner = self.read();
        let (Some(&a), Some(&b)) = (inner.index.get(src), inner.index.get(tgt)) else {
            return Ok(Vec::new());
        };
        let mut edges = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |edge: &Edge| {
            let key = (edge.src.clone(), edge.tgt.clone());
            if seen.insert(key) {
                edges.push(edge.clone());
            }
        };
        // length-1 path
        if let Some(direct) = inner.edge_between(a, b) {
            push(direct);
        }
        // length-2 paths through a shared neighbor
        for mid in inner.adjacent(a, direction) {
            if mid == b {
                continue;
            }
            let reaches_tgt = inner.adjacent(mid, direction).contains(&b);
            if reaches_tgt {
                if let Some(first) = inner.edge_between(a, mid) {
                    push(first);
                }
                if let Some(second) = inner.edge_between(mid, b) {
                    push(second);
                }
            }
        }
        Ok(edges)
    }

    async fn node_degree(&self, name: &str) -> GraphResult<usize> {
        let inner = self.read();
        let Some(&idx) = inner.index.get(name) else {
            return Ok(0);
        };
        Ok(inner.degree(idx))
    }

    async fn edge_degree(&self, src: &str, tgt: &str) -> GraphResult<usize> {
        Ok(self.node_degree(src).await? + self.node_degree(tgt).await?)
    }

    async fn explore(
        &self,
        seeds: &[String],
        direction: Direction,
        depth: usize,
        limit: usize,
    ) -> GraphResult<Subgraph> {
        let inner = self.read();
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
        for seed in seeds {
            if let Some(&idx) = inner.index.get(seed) {
                if visited.insert(idx) {
                    queue.push_back((idx, 0));
                }
            }
        }

        let mut vertices = Vec::new();
        let mut edges: Vec<Edge> = Vec::new();
        let mut seen_edges = HashSet::new();
        while let Some((idx, dist)) = queue.pop_front() {
            vertices.push(inner.graph[idx].clone());
            if dist >= depth {
                continue;
            }
            for next in inner.adjacent(idx, direction) {
                if let Some(edge) = inner.edge_between(idx, next) {
                    let key = (edge.src.clone(), edge.tgt.clone());
                    if seen_edges.insert(key) {
                        if edges.len() >= limit {
                            return Ok(Subgraph { vertices, edges });
                        }
                        edges.push(edge.clone());
                    }
                }
                if visited.insert(next) {
                    queue.push_back((next, dist + 1));
                }
            }
        }
        Ok(Subgraph { vertices, edges })
    }

    async fn nodes_by_edge_keywords(
        &self,
        keywords: &str,
    ) -> GraphResult<Option<(Vertex, Vertex)>> {
        let inner = self.read();
        for edge_ref in inner.graph.edge_references() {
            if edge_ref.weight().keywords == keywords {
                let src = inner.graph[edge_ref.source()].clone();
                let tgt = inner.graph[edge_ref.target()].clone();
                return Ok(Some((src, tgt)));
            }
        }
        Ok(None)
    }
}
