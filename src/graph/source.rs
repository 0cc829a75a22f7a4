//! The read-only capability every engine is written against.
//!
//! [`GraphSource`] is the seam between the algorithms and the persisted
//! graph. The SQLite adapter answers closures with recursive CTEs in one
//! round trip; anything that only provides the primitive lookups gets the
//! explicit worklist fixpoint from [`crate::graph::closure`].

use std::collections::HashSet;

use crate::error::Result;
use crate::graph::closure;
use crate::types::{Edge, EdgeKind, Flow, Node};

/// One hop of a closure: which way edges are followed and which kinds count.
/// An empty `kinds` slice accepts every kind.
#[derive(Debug, Clone, Copy)]
pub struct Step<'k> {
    pub flow: Flow,
    pub kinds: &'k [EdgeKind],
}

/// A node id reached by a closure, at the fewest hops from the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reached {
    pub id: String,
    pub depth: u32,
}

pub trait GraphSource {
    /// Outgoing edges of `id` whose kind is in `kinds`.
    fn edges_from(&self, id: &str, kinds: &[EdgeKind]) -> Result<Vec<Edge>>;

    /// Incoming edges of `id` whose kind is in `kinds`.
    fn edges_to(&self, id: &str, kinds: &[EdgeKind]) -> Result<Vec<Edge>>;

    fn node_by_id(&self, id: &str) -> Result<Option<Node>>;

    /// Metadata for every id that has a row. Missing ids are skipped.
    fn nodes_by_ids(&self, ids: &[String]) -> Result<Vec<Node>> {
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.node_by_id(id)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// Least fixpoint of `step` from `root`, at most `max_depth` hops deep.
    /// The root is always part of the result at depth 0.
    fn closure(&self, root: &str, step: Step<'_>, max_depth: u32) -> Result<Vec<Reached>> {
        closure::reachable(self, root, step, max_depth)
    }

    /// Every edge of the given kinds with both endpoints in `members`.
    fn edges_within(&self, members: &HashSet<String>, kinds: &[EdgeKind]) -> Result<Vec<Edge>> {
        let mut edges = Vec::new();
        for id in members {
            for edge in self.edges_from(id, kinds)? {
                if members.contains(&edge.target) {
                    edges.push(edge);
                }
            }
        }
        Ok(edges)
    }
}
