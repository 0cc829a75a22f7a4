//! Request parsing and normalisation shared by the HTTP handlers and the CLI.
//!
//! Missing identifiers, unknown enum values and non-numeric integers are
//! client errors. Numeric values outside their range are clamped, and
//! absent ones take their defaults.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::str::FromStr;

use rusqlite::Connection;

use crate::catalog::{self, NamedQueryResult};
use crate::error::{CpgError, Result};
use crate::graph::impact::{self, ImpactReport};
use crate::graph::neighborhood::{self, Neighborhood};
use crate::graph::slice::{self, Slice};
use crate::graph::source::GraphSource;
use crate::graph::traversal::{self, CallGraph, GraphTraversal};
use crate::types::{CallDirection, SliceDirection};

/// Raw query-string arguments.
pub type Params = HashMap<String, String>;

// ---------------------------------------------------------------------------
// Parameter helpers
// ---------------------------------------------------------------------------

pub fn clamp(value: i64, range: &RangeInclusive<i64>) -> i64 {
    value.clamp(*range.start(), *range.end())
}

fn present<'p>(params: &'p Params, key: &str) -> Option<&'p str> {
    params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Integer argument: default when absent, clamped into `range`.
pub fn int_param(params: &Params, key: &str, default: i64, range: &RangeInclusive<i64>) -> Result<i64> {
    match present(params, key) {
        None => Ok(clamp(default, range)),
        Some(raw) => raw
            .parse::<i64>()
            .map(|v| clamp(v, range))
            .map_err(|_| CpgError::invalid(format!("invalid {key}"))),
    }
}

pub fn required_param<'p>(params: &'p Params, key: &str) -> Result<&'p str> {
    present(params, key).ok_or_else(|| CpgError::invalid(format!("missing {key}")))
}

fn enum_param<T>(params: &Params, key: &str) -> Result<T>
where
    T: FromStr<Err = CpgError> + Default,
{
    present(params, key).map_or_else(|| Ok(T::default()), str::parse)
}

fn resolve(value: Option<i64>, default: i64, range: &RangeInclusive<i64>) -> i64 {
    clamp(value.unwrap_or(default), range)
}

fn require_id(id: String, key: &str) -> Result<String> {
    if id.trim().is_empty() {
        return Err(CpgError::invalid(format!("missing {key}")));
    }
    Ok(id)
}

// ---------------------------------------------------------------------------
// Call graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallGraphRequest {
    pub function_id: String,
    pub direction: CallDirection,
    pub max_depth: u32,
    pub max_nodes: usize,
}

impl CallGraphRequest {
    pub fn new(
        function_id: impl Into<String>,
        direction: CallDirection,
        max_depth: Option<i64>,
        max_nodes: Option<i64>,
    ) -> Result<Self> {
        Ok(Self {
            function_id: require_id(function_id.into(), "function_id")?,
            direction,
            max_depth: resolve(max_depth, traversal::DEFAULT_DEPTH, &traversal::DEPTH_RANGE) as u32,
            max_nodes: resolve(max_nodes, traversal::DEFAULT_NODES, &traversal::NODES_RANGE) as usize,
        })
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        let function_id = required_param(params, "function_id")?;
        let direction = enum_param(params, "direction")?;
        let max_depth = int_param(params, "max_depth", traversal::DEFAULT_DEPTH, &traversal::DEPTH_RANGE)?;
        let max_nodes = int_param(params, "max_nodes", traversal::DEFAULT_NODES, &traversal::NODES_RANGE)?;
        Self::new(function_id, direction, Some(max_depth), Some(max_nodes))
    }

    pub fn run<S: GraphSource + ?Sized>(&self, source: &S) -> Result<CallGraph> {
        GraphTraversal::new(source).traverse(
            &self.function_id,
            self.direction,
            self.max_depth,
            self.max_nodes,
        )
    }
}

// ---------------------------------------------------------------------------
// Neighborhood
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborhoodRequest {
    pub function_id: String,
}

impl NeighborhoodRequest {
    pub fn new(function_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            function_id: require_id(function_id.into(), "function_id")?,
        })
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        Self::new(required_param(params, "function_id")?)
    }

    pub fn run<S: GraphSource + ?Sized>(&self, source: &S) -> Result<Neighborhood> {
        neighborhood::neighborhood(source, &self.function_id)
    }
}

// ---------------------------------------------------------------------------
// Data-flow slice
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceRequest {
    pub node_id: String,
    pub direction: SliceDirection,
    pub max_depth: u32,
}

impl SliceRequest {
    pub fn new(node_id: impl Into<String>, direction: SliceDirection, max_depth: Option<i64>) -> Result<Self> {
        Ok(Self {
            node_id: require_id(node_id.into(), "node_id")?,
            direction,
            max_depth: resolve(max_depth, slice::DEFAULT_DEPTH, &slice::DEPTH_RANGE) as u32,
        })
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        let node_id = required_param(params, "node_id")?;
        let direction = enum_param(params, "direction")?;
        let max_depth = int_param(params, "max_depth", slice::DEFAULT_DEPTH, &slice::DEPTH_RANGE)?;
        Self::new(node_id, direction, Some(max_depth))
    }

    pub fn run<S: GraphSource + ?Sized>(&self, source: &S) -> Result<Slice> {
        slice::slice(source, &self.node_id, self.direction, self.max_depth)
    }
}

// ---------------------------------------------------------------------------
// Impact
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpactRequest {
    pub function_id: String,
    pub max_depth: u32,
    pub limit: usize,
}

impl ImpactRequest {
    pub fn new(function_id: impl Into<String>, max_depth: Option<i64>, limit: Option<i64>) -> Result<Self> {
        Ok(Self {
            function_id: require_id(function_id.into(), "function_id")?,
            max_depth: resolve(max_depth, impact::DEFAULT_DEPTH, &impact::DEPTH_RANGE) as u32,
            limit: resolve(limit, impact::DEFAULT_LIMIT, &impact::LIMIT_RANGE) as usize,
        })
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        let function_id = required_param(params, "function_id")?;
        let max_depth = int_param(params, "max_depth", impact::DEFAULT_DEPTH, &impact::DEPTH_RANGE)?;
        let limit = int_param(params, "limit", impact::DEFAULT_LIMIT, &impact::LIMIT_RANGE)?;
        Self::new(function_id, Some(max_depth), Some(limit))
    }

    pub fn run<S: GraphSource + ?Sized>(&self, source: &S) -> Result<ImpactReport> {
        impact::impact(source, &self.function_id, self.max_depth, self.limit)
    }
}

// ---------------------------------------------------------------------------
// Named query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedQueryRequest {
    pub name: String,
    /// Every caller argument, `limit` included; the catalog statement
    /// decides which ones it binds.
    pub params: Params,
    pub limit: usize,
}

impl NamedQueryRequest {
    pub fn new(name: impl Into<String>, params: Params, limit: Option<i64>) -> Result<Self> {
        Ok(Self {
            name: require_id(name.into(), "query name")?,
            params,
            limit: resolve(limit, catalog::DEFAULT_LIMIT, &catalog::LIMIT_RANGE) as usize,
        })
    }

    pub fn from_params(name: &str, params: Params) -> Result<Self> {
        let limit = int_param(&params, "limit", catalog::DEFAULT_LIMIT, &catalog::LIMIT_RANGE)?;
        Self::new(name, params, Some(limit))
    }

    pub fn run(&self, conn: &Connection) -> Result<NamedQueryResult> {
        catalog::run_named(conn, &self.name, &self.params, self.limit)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
