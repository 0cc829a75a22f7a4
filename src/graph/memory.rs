//! In-memory [`GraphSource`].
//!
//! Keeps edges in insertion order with per-node adjacency indices, so the
//! order a caller loads edges in is the order lookups return them. Closures
//! use the explicit fixpoint from the trait's default.

use std::collections::HashMap;

use crate::error::Result;
use crate::graph::source::GraphSource;
use crate::types::{Edge, EdgeKind, Node, NodeKind};

#[derive(Debug, Default, Clone)]
pub struct MemoryGraph {
    nodes: HashMap<String, Node>,
    edges: Vec<Edge>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl MemoryGraph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut graph = Self::default();
        for node in nodes {
            graph.add_node(node);
        }
        for edge in edges {
            graph.add_edge(edge);
        }
        graph
    }

    /// Edges only, with a `function` node named after every endpoint.
    pub fn from_edges(edges: &[(&str, &str, EdgeKind)]) -> Self {
        let mut graph = Self::default();
        for (source, target, kind) in edges {
            for id in [source, target] {
                if !graph.nodes.contains_key(*id) {
                    graph.add_node(Node {
                        id: id.to_string(),
                        kind: NodeKind::Function,
                        name: id.to_string(),
                        package: String::new(),
                        file: String::new(),
                        line: 0,
                    });
                }
            }
            graph.add_edge(Edge::new(*source, *target, kind.clone()));
        }
        graph
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn add_edge(&mut self, edge: Edge) {
        let idx = self.edges.len();
        self.outgoing.entry(edge.source.clone()).or_default().push(idx);
        self.incoming.entry(edge.target.clone()).or_default().push(idx);
        self.edges.push(edge);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn collect(&self, index: &HashMap<String, Vec<usize>>, id: &str, kinds: &[EdgeKind]) -> Vec<Edge> {
        index
            .get(id)
            .map(|idxs| {
                idxs.iter()
                    .map(|&i| &self.edges[i])
                    .filter(|e| kinds.is_empty() || kinds.contains(&e.kind))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl GraphSource for MemoryGraph {
    fn edges_from(&self, id: &str, kinds: &[EdgeKind]) -> Result<Vec<Edge>> {
        Ok(self.collect(&self.outgoing, id, kinds))
    }

    fn edges_to(&self, id: &str, kinds: &[EdgeKind]) -> Result<Vec<Edge>> {
        Ok(self.collect(&self.incoming, id, kinds))
    }

    fn node_by_id(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.nodes.get(id).cloned())
    }
}
