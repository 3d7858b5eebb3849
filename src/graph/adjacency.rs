//! Graph - immutable undirected topology consumed by the layout engines.
//!
//! The graph stores its topology in petgraph's `UnGraph`. Vertices are added
//! once, in order, so petgraph's `NodeIndex` doubles as the dense vertex id.
//! Edges are symmetric, deduplicated and never self-loops; the builders
//! reject input that breaks this contract instead of letting an engine
//! observe it.

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use super::vertex::VertexId;
use crate::error::{Error, Result};

/// Undirected graph with dense `0..n-1` vertex ids.
///
/// A graph never changes after construction. Engines keep a handle to it
/// (`&Graph` or `Rc<Graph>`) for their whole lifetime; replacing the graph
/// means building new engines.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    inner: UnGraph<(), ()>,
}

impl Graph {
    /// Create a graph with `vertex_count` isolated vertices.
    pub fn with_vertices(vertex_count: usize) -> Self {
        let mut inner = UnGraph::with_capacity(vertex_count, 0);
        for _ in 0..vertex_count {
            inner.add_node(());
        }
        Self { inner }
    }

    /// Build a graph from undirected edge pairs.
    ///
    /// Duplicate pairs (in either orientation) collapse into one edge.
    pub fn from_edges(vertex_count: usize, edges: &[(usize, usize)]) -> Result<Self> {
        let mut graph = Self::with_vertices(vertex_count);
        for &(a, b) in edges {
            graph.insert_edge(a, b)?;
        }
        Ok(graph)
    }

    /// Build a graph from flat pairs `[a0, b0, a1, b1, ...]`.
    ///
    /// A trailing unpaired id is ignored.
    pub fn from_flat_pairs(vertex_count: usize, pairs: &[u32]) -> Result<Self> {
        let mut graph = Self::with_vertices(vertex_count);
        for pair in pairs.chunks_exact(2) {
            graph.insert_edge(pair[0] as usize, pair[1] as usize)?;
        }
        Ok(graph)
    }

    /// Build a graph from per-vertex neighbor lists.
    ///
    /// The lists must already be symmetric: `u` in `lists[v]` requires `v`
    /// in `lists[u]`.
    pub fn from_adjacency(lists: &[Vec<usize>]) -> Result<Self> {
        let vertex_count = lists.len();
        for (v, neighbors) in lists.iter().enumerate() {
            for &u in neighbors {
                if u >= vertex_count {
                    return Err(Error::EdgeOutOfRange {
                        from: v,
                        to: u,
                        vertex_count,
                    });
                }
                if !lists[u].contains(&v) {
                    return Err(Error::AsymmetricAdjacency {
                        vertex: v,
                        neighbor: u,
                    });
                }
            }
        }

        let mut graph = Self::with_vertices(vertex_count);
        for (v, neighbors) in lists.iter().enumerate() {
            for &u in neighbors {
                if u > v {
                    graph.insert_edge(v, u)?;
                } else if u == v {
                    return Err(Error::SelfLoop { vertex: v });
                }
            }
        }
        Ok(graph)
    }

    fn insert_edge(&mut self, a: usize, b: usize) -> Result<()> {
        let vertex_count = self.vertex_count();
        if a >= vertex_count || b >= vertex_count {
            return Err(Error::EdgeOutOfRange {
                from: a,
                to: b,
                vertex_count,
            });
        }
        if a == b {
            return Err(Error::SelfLoop { vertex: a });
        }

        let (a, b) = (NodeIndex::new(a), NodeIndex::new(b));
        if self.inner.find_edge(a, b).is_none() {
            self.inner.add_edge(a, b, ());
        }
        Ok(())
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0
    }

    /// Check that `vertex` names a vertex of this graph.
    pub fn check_vertex(&self, vertex: VertexId) -> Result<usize> {
        let index = vertex.index();
        if index < self.vertex_count() {
            Ok(index)
        } else {
            Err(Error::InvalidVertex {
                vertex: index,
                vertex_count: self.vertex_count(),
            })
        }
    }

    /// Neighbors of vertex `v`, in no particular order.
    pub fn neighbors(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.inner.neighbors(NodeIndex::new(v)).map(|n| n.index())
    }

    /// Number of edges incident to vertex `v`.
    pub fn degree(&self, v: usize) -> usize {
        self.neighbors(v).count()
    }

    pub fn contains_edge(&self, a: usize, b: usize) -> bool {
        a < self.vertex_count()
            && b < self.vertex_count()
            && self
                .inner
                .find_edge(NodeIndex::new(a), NodeIndex::new(b))
                .is_some()
    }

    /// Every undirected edge exactly once, as `(low, high)` id pairs.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.inner.edge_references().map(|e| {
            let (a, b) = (e.source().index(), e.target().index());
            if a < b { (a, b) } else { (b, a) }
        })
    }

    /// Neighbor lists in vertex order, each sorted ascending.
    pub fn adjacency_lists(&self) -> Vec<Vec<usize>> {
        (0..self.vertex_count())
            .map(|v| {
                let mut neighbors: Vec<usize> = self.neighbors(v).collect();
                neighbors.sort_unstable();
                neighbors
            })
            .collect()
    }
}
