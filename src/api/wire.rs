//! JSON response shapes.

use serde::Serialize;

use crate::graph::impact::ImpactReport;
use crate::graph::neighborhood::{Neighbor, Neighborhood};
use crate::graph::ordering::NodeWithDepth;
use crate::graph::slice::Slice;
use crate::graph::traversal::CallGraph;
use crate::types::{CallDirection, Edge, Node, SliceDirection};

/// Node row of call graphs and impact lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallNodeJson {
    pub id: String,
    pub name: String,
    pub package: String,
    pub file: String,
    pub line: i64,
    pub depth: u32,
}

impl From<NodeWithDepth> for CallNodeJson {
    fn from(n: NodeWithDepth) -> Self {
        Self {
            id: n.node.id,
            name: n.node.name,
            package: n.node.package,
            file: n.node.file,
            line: n.node.line,
            depth: n.depth,
        }
    }
}

/// Node row of slices, which mix kinds and so carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SliceNodeJson {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub package: String,
    pub file: String,
    pub line: i64,
    pub depth: u32,
}

impl From<NodeWithDepth> for SliceNodeJson {
    fn from(n: NodeWithDepth) -> Self {
        Self {
            kind: n.node.kind.as_str().to_string(),
            id: n.node.id,
            name: n.node.name,
            package: n.node.package,
            file: n.node.file,
            line: n.node.line,
            depth: n.depth,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CallGraphJson {
    pub center_id: String,
    pub direction: CallDirection,
    pub max_depth: u32,
    pub max_nodes: usize,
    pub nodes: Vec<CallNodeJson>,
    pub edges: Vec<Edge>,
}

impl From<CallGraph> for CallGraphJson {
    fn from(g: CallGraph) -> Self {
        Self {
            center_id: g.center_id,
            direction: g.direction,
            max_depth: g.max_depth,
            max_nodes: g.max_nodes,
            nodes: g.nodes.into_iter().map(Into::into).collect(),
            edges: g.edges,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SliceJson {
    pub root_id: String,
    pub direction: SliceDirection,
    pub nodes: Vec<SliceNodeJson>,
    pub edges: Vec<Edge>,
}

impl From<Slice> for SliceJson {
    fn from(s: Slice) -> Self {
        Self {
            root_id: s.root_id,
            direction: s.direction,
            nodes: s.nodes.into_iter().map(Into::into).collect(),
            edges: s.edges,
        }
    }
}

/// Impact as printed by the CLI. Over HTTP only `rows` is the body.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactJson {
    pub target_id: String,
    pub truncated: bool,
    pub rows: Vec<CallNodeJson>,
}

impl From<ImpactReport> for ImpactJson {
    fn from(r: ImpactReport) -> Self {
        Self {
            target_id: r.target_id,
            truncated: r.truncated,
            rows: r.rows.into_iter().map(Into::into).collect(),
        }
    }
}

/// A function row without depth, as the neighborhood center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionJson {
    pub id: String,
    pub name: String,
    pub package: String,
    pub file: String,
    pub line: i64,
}

impl From<Node> for FunctionJson {
    fn from(n: Node) -> Self {
        Self {
            id: n.id,
            name: n.name,
            package: n.package,
            file: n.file,
            line: n.line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeighborJson {
    /// `caller` or `callee`.
    pub direction: &'static str,
    pub id: String,
    pub name: String,
    pub package: String,
    pub file: String,
    pub line: i64,
}

impl From<Neighbor> for NeighborJson {
    fn from(nb: Neighbor) -> Self {
        Self {
            direction: nb.side.as_str(),
            id: nb.node.id,
            name: nb.node.name,
            package: nb.node.package,
            file: nb.node.file,
            line: nb.node.line,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NeighborhoodJson {
    pub center: Option<FunctionJson>,
    pub neighbors: Vec<NeighborJson>,
}

impl From<Neighborhood> for NeighborhoodJson {
    fn from(n: Neighborhood) -> Self {
        Self {
            center: n.center.map(Into::into),
            neighbors: n.neighbors.into_iter().map(Into::into).collect(),
        }
    }
}
