//! Reverse call closure ("who is affected if this changes").
//!
//! The closure runs to its fixpoint or the depth cap first; only then are
//! non-function members filtered out, rows sorted, and the row limit
//! applied.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::error::{CpgError, Result};
use crate::graph::ordering::{by_depth_package, NodeWithDepth};
use crate::graph::source::{GraphSource, Step};
use crate::types::{EdgeKind, Flow, NodeKind};

pub const DEPTH_RANGE: RangeInclusive<i64> = 1..=12;
pub const DEFAULT_DEPTH: i64 = 8;

pub const LIMIT_RANGE: RangeInclusive<i64> = 1..=500;
pub const DEFAULT_LIMIT: i64 = 250;

#[derive(Debug, Clone, Serialize)]
pub struct ImpactReport {
    pub target_id: String,
    pub rows: Vec<NodeWithDepth>,
    /// More function rows existed than `limit` allowed.
    pub truncated: bool,
}

pub fn impact<S>(source: &S, target: &str, max_depth: u32, limit: usize) -> Result<ImpactReport>
where
    S: GraphSource + ?Sized,
{
    if target.is_empty() {
        return Err(CpgError::invalid("missing function_id"));
    }
    if max_depth == 0 || i64::from(max_depth) > *DEPTH_RANGE.end() {
        return Err(CpgError::invalid("max_depth out of range"));
    }
    if limit == 0 || limit as i64 > *LIMIT_RANGE.end() {
        return Err(CpgError::invalid("limit out of range"));
    }

    let step = Step {
        flow: Flow::Backward,
        kinds: &[EdgeKind::Call],
    };
    let depth_by_id: HashMap<String, u32> = source
        .closure(target, step, max_depth)?
        .into_iter()
        .map(|r| (r.id, r.depth))
        .collect();

    let ids: Vec<String> = depth_by_id.keys().cloned().collect();
    let mut rows: Vec<NodeWithDepth> = source
        .nodes_by_ids(&ids)?
        .into_iter()
        .filter(|node| node.kind == NodeKind::Function)
        .filter_map(|node| {
            depth_by_id
                .get(&node.id)
                .map(|&depth| NodeWithDepth { node, depth })
        })
        .collect();
    rows.sort_by(by_depth_package);

    let truncated = rows.len() > limit;
    rows.truncate(limit);

    tracing::debug!(
        function_id = target,
        closure = depth_by_id.len(),
        rows = rows.len(),
        truncated,
        "impact complete"
    );

    Ok(ImpactReport {
        target_id: target.to_string(),
        rows,
        truncated,
    })
}
