//! Data-flow slicing.
//!
//! A slice is the set of nodes reachable from a root over `dfg` edges plus
//! `param_out` (forward) or `param_in` (backward), each at its minimal hop
//! count. The edge set is every data-flow edge between two slice members,
//! not only the edges the closure happened to walk.

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::error::{CpgError, Result};
use crate::graph::ordering::{by_depth_location, edges_between, NodeWithDepth};
use crate::graph::source::{GraphSource, Step};
use crate::types::{Edge, EdgeKind, SliceDirection};

pub const DEPTH_RANGE: RangeInclusive<i64> = 1..=40;
pub const DEFAULT_DEPTH: i64 = 14;

const FORWARD_KINDS: &[EdgeKind] = &[EdgeKind::Dfg, EdgeKind::ParamOut];
const BACKWARD_KINDS: &[EdgeKind] = &[EdgeKind::Dfg, EdgeKind::ParamIn];
const MEMBER_EDGE_KINDS: &[EdgeKind] = &[EdgeKind::Dfg, EdgeKind::ParamIn, EdgeKind::ParamOut];

#[derive(Debug, Clone, Serialize)]
pub struct Slice {
    pub root_id: String,
    pub direction: SliceDirection,
    pub nodes: Vec<NodeWithDepth>,
    pub edges: Vec<Edge>,
}

impl Slice {
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id() == id)
    }
}

/// Edge kinds a slice follows in `direction`.
pub fn step_kinds(direction: SliceDirection) -> &'static [EdgeKind] {
    match direction {
        SliceDirection::Forward => FORWARD_KINDS,
        SliceDirection::Backward => BACKWARD_KINDS,
    }
}

pub fn slice<S>(source: &S, root: &str, direction: SliceDirection, max_depth: u32) -> Result<Slice>
where
    S: GraphSource + ?Sized,
{
    if root.is_empty() {
        return Err(CpgError::invalid("missing node_id"));
    }
    if max_depth == 0 || i64::from(max_depth) > *DEPTH_RANGE.end() {
        return Err(CpgError::invalid("max_depth out of range"));
    }

    let step = Step {
        flow: direction.flow(),
        kinds: step_kinds(direction),
    };
    let reached = source.closure(root, step, max_depth)?;
    let depth_by_id: HashMap<String, u32> = reached.into_iter().map(|r| (r.id, r.depth)).collect();

    let ids: Vec<String> = depth_by_id.keys().cloned().collect();
    let mut nodes: Vec<NodeWithDepth> = source
        .nodes_by_ids(&ids)?
        .into_iter()
        .filter_map(|node| {
            depth_by_id
                .get(&node.id)
                .map(|&depth| NodeWithDepth { node, depth })
        })
        .collect();
    nodes.sort_by(by_depth_location);

    let members: HashSet<String> = nodes.iter().map(|n| n.node.id.clone()).collect();
    let member_refs: HashSet<&str> = members.iter().map(String::as_str).collect();
    let edges = edges_between(source.edges_within(&members, MEMBER_EDGE_KINDS)?, &member_refs);

    tracing::debug!(
        root,
        direction = direction.as_str(),
        reached = depth_by_id.len(),
        nodes = nodes.len(),
        edges = edges.len(),
        "slice complete"
    );

    Ok(Slice {
        root_id: root.to_string(),
        direction,
        nodes,
        edges,
    })
}
