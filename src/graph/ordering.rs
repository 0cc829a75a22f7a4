//! Presentation order shared by the engines.
//!
//! The store promises no row order, so every result is sorted here before it
//! leaves the engine. Edge lists are deduplicated at the same time.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::types::{Edge, Node};

/// A node together with its minimal hop count from the query root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeWithDepth {
    #[serde(flatten)]
    pub node: Node,
    pub depth: u32,
}

impl NodeWithDepth {
    pub fn id(&self) -> &str {
        &self.node.id
    }
}

/// Traversal order: `(depth, name, id)`.
pub fn by_depth_name(a: &NodeWithDepth, b: &NodeWithDepth) -> Ordering {
    a.depth
        .cmp(&b.depth)
        .then_with(|| a.node.name.cmp(&b.node.name))
        .then_with(|| a.node.id.cmp(&b.node.id))
}

/// Slice order: `(depth, file, line, id)`.
pub fn by_depth_location(a: &NodeWithDepth, b: &NodeWithDepth) -> Ordering {
    a.depth
        .cmp(&b.depth)
        .then_with(|| a.node.file.cmp(&b.node.file))
        .then_with(|| a.node.line.cmp(&b.node.line))
        .then_with(|| a.node.id.cmp(&b.node.id))
}

/// Impact order: `(depth, package, name, id)`.
pub fn by_depth_package(a: &NodeWithDepth, b: &NodeWithDepth) -> Ordering {
    a.depth
        .cmp(&b.depth)
        .then_with(|| a.node.package.cmp(&b.node.package))
        .then_with(|| a.node.name.cmp(&b.node.name))
        .then_with(|| a.node.id.cmp(&b.node.id))
}

/// Sorted, duplicate-free edge list, keeping only edges whose endpoints are
/// both in `members`.
pub fn edges_between<I>(edges: I, members: &HashSet<&str>) -> Vec<Edge>
where
    I: IntoIterator<Item = Edge>,
{
    edges
        .into_iter()
        .filter(|e| members.contains(e.source.as_str()) && members.contains(e.target.as_str()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
