//! Bounded breadth-first call-graph traversal.
//!
//! Expands the `call` relation from a center node one layer at a time, in
//! the callee direction, the caller direction, or both. A global node
//! budget caps how many distinct nodes are ever admitted; once it is spent
//! the remaining layers can still expand admitted nodes, but only edges
//! between admitted nodes are kept.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::error::{CpgError, Result};
use crate::graph::ordering::{by_depth_name, edges_between, NodeWithDepth};
use crate::graph::source::GraphSource;
use crate::types::{CallDirection, Edge, EdgeKind, Node};

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Depth range accepted at the request boundary (values are clamped into it).
pub const DEPTH_RANGE: RangeInclusive<i64> = 1..=8;
pub const DEFAULT_DEPTH: i64 = 2;

/// Node budget range accepted at the request boundary.
pub const NODES_RANGE: RangeInclusive<i64> = 10..=250;
pub const DEFAULT_NODES: i64 = 80;

const CALL: &[EdgeKind] = &[EdgeKind::Call];

// ---------------------------------------------------------------------------
// Result type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CallGraph {
    pub center_id: String,
    pub direction: CallDirection,
    pub max_depth: u32,
    pub max_nodes: usize,
    pub nodes: Vec<NodeWithDepth>,
    pub edges: Vec<Edge>,
}

// ---------------------------------------------------------------------------
// GraphTraversal
// ---------------------------------------------------------------------------

pub struct GraphTraversal<'a, S: GraphSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: GraphSource + ?Sized> GraphTraversal<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Run the traversal. `max_depth` must lie in [`DEPTH_RANGE`].
    ///
    /// `max_nodes` may be anything from 1 up to the top of
    /// [`NODES_RANGE`]. Budgets below the range floor of 10 are accepted
    /// here so tight admission can be exercised directly; request parsing
    /// clamps callers into the full range.
    pub fn traverse(
        &self,
        center: &str,
        direction: CallDirection,
        max_depth: u32,
        max_nodes: usize,
    ) -> Result<CallGraph> {
        if center.is_empty() {
            return Err(CpgError::invalid("missing function_id"));
        }
        if max_depth == 0 || i64::from(max_depth) > *DEPTH_RANGE.end() {
            return Err(CpgError::invalid("max_depth out of range"));
        }
        if max_nodes == 0 || max_nodes as i64 > *NODES_RANGE.end() {
            return Err(CpgError::invalid("max_nodes out of range"));
        }

        let mut admitted: HashMap<String, u32> = HashMap::new();
        admitted.insert(center.to_string(), 0);
        let mut edges: BTreeSet<Edge> = BTreeSet::new();
        let mut frontier = vec![center.to_string()];
        let mut budget_hit = false;

        for depth in 1..=max_depth {
            if frontier.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for id in &frontier {
                if direction.follows_callees() {
                    let callees = sorted_ids(self.source.edges_from(id, CALL)?, |e| e.target);
                    for callee in callees {
                        admit(&mut admitted, &mut next, &callee, depth, max_nodes, &mut budget_hit);
                        if admitted.contains_key(&callee) {
                            edges.insert(Edge::new(id.as_str(), callee, EdgeKind::Call));
                        }
                    }
                }
                if direction.follows_callers() {
                    let callers = sorted_ids(self.source.edges_to(id, CALL)?, |e| e.source);
                    for caller in callers {
                        admit(&mut admitted, &mut next, &caller, depth, max_nodes, &mut budget_hit);
                        if admitted.contains_key(&caller) {
                            edges.insert(Edge::new(caller, id.as_str(), EdgeKind::Call));
                        }
                    }
                }
            }
            frontier = next;
        }

        if budget_hit {
            tracing::debug!(center, max_nodes, "traversal node budget exhausted");
        }

        let nodes = self.materialize(center, &admitted)?;
        let members: HashSet<&str> = nodes.iter().map(NodeWithDepth::id).collect();
        let edges = edges_between(edges, &members);

        tracing::debug!(
            center,
            direction = direction.as_str(),
            nodes = nodes.len(),
            edges = edges.len(),
            "traversal complete"
        );

        Ok(CallGraph {
            center_id: center.to_string(),
            direction,
            max_depth,
            max_nodes,
            nodes,
            edges,
        })
    }

    /// Attach metadata to the admitted ids. Ids without a node row are
    /// dropped, except the center, which becomes an id-only placeholder.
    fn materialize(&self, center: &str, admitted: &HashMap<String, u32>) -> Result<Vec<NodeWithDepth>> {
        let ids: Vec<String> = admitted.keys().cloned().collect();
        let mut nodes: Vec<NodeWithDepth> = self
            .source
            .nodes_by_ids(&ids)?
            .into_iter()
            .filter_map(|node| {
                admitted
                    .get(&node.id)
                    .map(|&depth| NodeWithDepth { node, depth })
            })
            .collect();

        if !nodes.iter().any(|n| n.node.id == center) {
            nodes.push(NodeWithDepth {
                node: Node::placeholder(center),
                depth: 0,
            });
        }

        nodes.sort_by(by_depth_name);
        Ok(nodes)
    }
}

/// Neighbor ids in id order, without duplicates, so admission under a
/// tight budget does not depend on the order the store returns rows in.
fn sorted_ids(edges: Vec<Edge>, endpoint: impl Fn(Edge) -> String) -> Vec<String> {
    let mut ids: Vec<String> = edges.into_iter().map(endpoint).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn admit(
    admitted: &mut HashMap<String, u32>,
    next: &mut Vec<String>,
    id: &str,
    depth: u32,
    max_nodes: usize,
    budget_hit: &mut bool,
) {
    if admitted.contains_key(id) {
        return;
    }
    if admitted.len() >= max_nodes {
        *budget_hit = true;
        return;
    }
    admitted.insert(id.to_string(), depth);
    next.push(id.to_string());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
