//! Explicit least-fixpoint reachability.
//!
//! Layer-by-layer expansion with a visited map: the first layer that
//! reaches a node fixes its depth, so every recorded depth is the minimum
//! hop count. Stops at `max_depth` or when a layer discovers nothing new.

use std::collections::HashMap;

use crate::error::Result;
use crate::graph::source::{GraphSource, Reached, Step};
use crate::types::Flow;

pub fn reachable<S>(source: &S, root: &str, step: Step<'_>, max_depth: u32) -> Result<Vec<Reached>>
where
    S: GraphSource + ?Sized,
{
    let mut depth_by_id: HashMap<String, u32> = HashMap::new();
    depth_by_id.insert(root.to_string(), 0);
    let mut reached = vec![Reached {
        id: root.to_string(),
        depth: 0,
    }];

    let mut frontier = vec![root.to_string()];
    let mut depth = 0;
    while depth < max_depth && !frontier.is_empty() {
        let mut next = Vec::new();
        for id in &frontier {
            for neighbor in neighbors(source, id, step)? {
                if depth_by_id.contains_key(&neighbor) {
                    continue;
                }
                depth_by_id.insert(neighbor.clone(), depth + 1);
                reached.push(Reached {
                    id: neighbor.clone(),
                    depth: depth + 1,
                });
                next.push(neighbor);
            }
        }
        frontier = next;
        depth += 1;
    }

    Ok(reached)
}

/// Ids one hop away from `id` under `step`.
pub fn neighbors<S>(source: &S, id: &str, step: Step<'_>) -> Result<Vec<String>>
where
    S: GraphSource + ?Sized,
{
    let ids = match step.flow {
        Flow::Forward => source
            .edges_from(id, step.kinds)?
            .into_iter()
            .map(|e| e.target)
            .collect(),
        Flow::Backward => source
            .edges_to(id, step.kinds)?
            .into_iter()
            .map(|e| e.source)
            .collect(),
    };
    Ok(ids)
}
