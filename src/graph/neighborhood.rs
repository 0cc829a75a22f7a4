//! One-hop call neighborhood of a function: its direct callers and callees.
//!
//! Only function endpoints are listed. A function that both calls and is
//! called by the center appears once on each side.

use std::collections::{BTreeSet, HashMap};

use serde::{Serialize, Serializer};

use crate::error::{CpgError, Result};
use crate::graph::source::GraphSource;
use crate::types::{EdgeKind, Node, NodeKind};

const CALL: &[EdgeKind] = &[EdgeKind::Call];

/// Which side of the center a neighbor sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Callee,
    Caller,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Callee => "callee",
            Self::Caller => "caller",
        }
    }
}

impl Serialize for Side {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Neighbor {
    pub side: Side,
    #[serde(flatten)]
    pub node: Node,
}

#[derive(Debug, Clone, Serialize)]
pub struct Neighborhood {
    pub function_id: String,
    /// The center's own row, when it exists and is a function.
    pub center: Option<Node>,
    /// Callees first, then callers; each side by `(name, id)`.
    pub neighbors: Vec<Neighbor>,
}

pub fn neighborhood<S>(source: &S, function_id: &str) -> Result<Neighborhood>
where
    S: GraphSource + ?Sized,
{
    if function_id.is_empty() {
        return Err(CpgError::invalid("missing function_id"));
    }

    let mut sides: BTreeSet<(Side, String)> = BTreeSet::new();
    for edge in source.edges_from(function_id, CALL)? {
        sides.insert((Side::Callee, edge.target));
    }
    for edge in source.edges_to(function_id, CALL)? {
        sides.insert((Side::Caller, edge.source));
    }

    let ids: Vec<String> = sides
        .iter()
        .map(|(_, id)| id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let functions: HashMap<String, Node> = source
        .nodes_by_ids(&ids)?
        .into_iter()
        .filter(|n| n.kind == NodeKind::Function)
        .map(|n| (n.id.clone(), n))
        .collect();

    let mut neighbors: Vec<Neighbor> = sides
        .into_iter()
        .filter_map(|(side, id)| {
            functions.get(&id).map(|node| Neighbor {
                side,
                node: node.clone(),
            })
        })
        .collect();
    neighbors.sort_by(|a, b| {
        a.side
            .cmp(&b.side)
            .then_with(|| a.node.name.cmp(&b.node.name))
            .then_with(|| a.node.id.cmp(&b.node.id))
    });

    let center = source
        .node_by_id(function_id)?
        .filter(|n| n.kind == NodeKind::Function);

    tracing::debug!(
        function_id,
        neighbors = neighbors.len(),
        "neighborhood complete"
    );

    Ok(Neighborhood {
        function_id: function_id.to_string(),
        center,
        neighbors,
    })
}
