//! Core domain types for the code property graph.
//!
//! Nodes and edges are produced upstream by the extraction pipeline; this
//! crate only reads them. Kind columns are free-form text in the store, so
//! both kind enums carry an `Other` variant for values we don't model.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::CpgError;

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Function,
    Type,
    File,
    Variable,
    Parameter,
    Other(String),
}

impl NodeKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "function" => Self::Function,
            "type" => Self::Type,
            "file" => Self::File,
            "variable" => Self::Variable,
            "parameter" => Self::Parameter,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Function => "function",
            Self::Type => "type",
            Self::File => "file",
            Self::Variable => "variable",
            Self::Parameter => "parameter",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EdgeKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum EdgeKind {
    Call,
    Dfg,
    ParamIn,
    ParamOut,
    Contains,
    Implements,
    Other(String),
}

impl EdgeKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "call" => Self::Call,
            "dfg" => Self::Dfg,
            "param_in" => Self::ParamIn,
            "param_out" => Self::ParamOut,
            "contains" => Self::Contains,
            "implements" => Self::Implements,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Call => "call",
            Self::Dfg => "dfg",
            Self::ParamIn => "param_in",
            Self::ParamOut => "param_out",
            Self::Contains => "contains",
            Self::Implements => "implements",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Kinds compare, hash and sort by their stored text, so `Other("call")`
// and `Call` are the same kind everywhere.
impl PartialEq for EdgeKind {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for EdgeKind {}

impl std::hash::Hash for EdgeKind {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl Ord for EdgeKind {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for EdgeKind {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for EdgeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Node / Edge
// ---------------------------------------------------------------------------

/// A code entity as stored in the `nodes` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub package: String,
    pub file: String,
    pub line: i64,
}

impl Node {
    /// A node known only by id, used when the store has no row for it.
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: NodeKind::Other(String::new()),
            name: String::new(),
            package: String::new(),
            file: String::new(),
            line: 0,
        }
    }
}

/// A directed, typed relationship. Ordering is `(source, target, kind)`,
/// which is also the presentation order of every edge list we emit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Directions
// ---------------------------------------------------------------------------

/// Which way an edge is followed during a closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    /// source -> target
    Forward,
    /// target -> source
    Backward,
}

/// Direction of a call-graph traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallDirection {
    #[default]
    Both,
    Callers,
    Callees,
}

impl CallDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::Callers => "callers",
            Self::Callees => "callees",
        }
    }

    pub fn follows_callees(&self) -> bool {
        matches!(self, Self::Both | Self::Callees)
    }

    pub fn follows_callers(&self) -> bool {
        matches!(self, Self::Both | Self::Callers)
    }
}

impl FromStr for CallDirection {
    type Err = CpgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "both" => Ok(Self::Both),
            "callers" => Ok(Self::Callers),
            "callees" => Ok(Self::Callees),
            _ => Err(CpgError::invalid(
                "direction must be both, callers, or callees",
            )),
        }
    }
}

impl Serialize for CallDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Direction of a data-flow slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SliceDirection {
    #[default]
    Forward,
    Backward,
}

impl SliceDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        }
    }

    pub fn flow(&self) -> Flow {
        match self {
            Self::Forward => Flow::Forward,
            Self::Backward => Flow::Backward,
        }
    }

    pub fn inverse(&self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

impl FromStr for SliceDirection {
    type Err = CpgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(Self::Forward),
            "backward" => Ok(Self::Backward),
            _ => Err(CpgError::invalid("direction must be forward or backward")),
        }
    }
}

impl Serialize for SliceDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
