//! SQLite-backed [`GraphSource`].
//!
//! Borrowed over one connection (a pooled one when serving). Every lookup
//! goes through [`Connection::prepare_cached`]. Closures run as a single
//! `WITH RECURSIVE` statement, and set lookups pass their ids as a JSON
//! array expanded by `json_each`, so the number of round trips does not
//! grow with the size of the id set.

use std::collections::HashSet;

use rusqlite::{params, Connection};

use crate::db::converters::{row_to_edge, row_to_node};
use crate::error::Result;
use crate::graph::source::{GraphSource, Reached, Step};
use crate::types::{Edge, EdgeKind, Flow, Node};

// ---------------------------------------------------------------------------
// SQL constants
// ---------------------------------------------------------------------------

// `?2` is a JSON array of kinds; `'[]'` accepts every kind.
const EDGES_FROM_SQL: &str = "\
SELECT source, target, kind FROM edges
WHERE source = ?1
  AND (?2 = '[]' OR kind IN (SELECT value FROM json_each(?2)))";

const EDGES_TO_SQL: &str = "\
SELECT source, target, kind FROM edges
WHERE target = ?1
  AND (?2 = '[]' OR kind IN (SELECT value FROM json_each(?2)))";

const NODE_BY_ID_SQL: &str = "\
SELECT id, kind, name, package, file, line FROM nodes WHERE id = ?1";

const NODES_BY_IDS_SQL: &str = "\
SELECT id, kind, name, package, file, line FROM nodes
WHERE id IN (SELECT value FROM json_each(?1))";

const EDGES_WITHIN_SQL: &str = "\
SELECT DISTINCT source, target, kind FROM edges
WHERE source IN (SELECT value FROM json_each(?1))
  AND target IN (SELECT value FROM json_each(?1))
  AND (?2 = '[]' OR kind IN (SELECT value FROM json_each(?2)))";

// UNION (not UNION ALL) drops repeated (id, depth) pairs, which is what
// makes cycles terminate below the depth cap.
const CLOSURE_FORWARD_SQL: &str = "\
WITH RECURSIVE reach(id, depth) AS (
  SELECT ?1, 0
  UNION
  SELECT e.target, r.depth + 1
  FROM reach r JOIN edges e ON e.source = r.id
  WHERE r.depth < ?3
    AND (?2 = '[]' OR e.kind IN (SELECT value FROM json_each(?2)))
)
SELECT id, MIN(depth) AS depth FROM reach GROUP BY id";

const CLOSURE_BACKWARD_SQL: &str = "\
WITH RECURSIVE reach(id, depth) AS (
  SELECT ?1, 0
  UNION
  SELECT e.source, r.depth + 1
  FROM reach r JOIN edges e ON e.target = r.id
  WHERE r.depth < ?3
    AND (?2 = '[]' OR e.kind IN (SELECT value FROM json_each(?2)))
)
SELECT id, MIN(depth) AS depth FROM reach GROUP BY id";

// ---------------------------------------------------------------------------
// SqliteGraph
// ---------------------------------------------------------------------------

pub struct SqliteGraph<'c> {
    conn: &'c Connection,
}

impl std::fmt::Debug for SqliteGraph<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteGraph").finish_non_exhaustive()
    }
}

impl<'c> SqliteGraph<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn edges_by(&self, sql: &str, id: &str, kinds: &[EdgeKind]) -> Result<Vec<Edge>> {
        let kinds = kinds_json(kinds)?;
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_and_then(params![id, kinds], row_to_edge)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

fn kinds_json(kinds: &[EdgeKind]) -> Result<String> {
    let names: Vec<&str> = kinds.iter().map(EdgeKind::as_str).collect();
    Ok(serde_json::to_string(&names)?)
}

impl GraphSource for SqliteGraph<'_> {
    fn edges_from(&self, id: &str, kinds: &[EdgeKind]) -> Result<Vec<Edge>> {
        self.edges_by(EDGES_FROM_SQL, id, kinds)
    }

    fn edges_to(&self, id: &str, kinds: &[EdgeKind]) -> Result<Vec<Edge>> {
        self.edges_by(EDGES_TO_SQL, id, kinds)
    }

    fn node_by_id(&self, id: &str) -> Result<Option<Node>> {
        let mut stmt = self.conn.prepare_cached(NODE_BY_ID_SQL)?;
        let mut rows = stmt.query_and_then(params![id], row_to_node)?;
        match rows.next() {
            Some(Ok(node)) => Ok(Some(node)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn nodes_by_ids(&self, ids: &[String]) -> Result<Vec<Node>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = serde_json::to_string(ids)?;
        let mut stmt = self.conn.prepare_cached(NODES_BY_IDS_SQL)?;
        let rows = stmt.query_and_then(params![ids], row_to_node)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    fn closure(&self, root: &str, step: Step<'_>, max_depth: u32) -> Result<Vec<Reached>> {
        let sql = match step.flow {
            Flow::Forward => CLOSURE_FORWARD_SQL,
            Flow::Backward => CLOSURE_BACKWARD_SQL,
        };
        let kinds = kinds_json(step.kinds)?;
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![root, kinds, max_depth], |row| {
            Ok(Reached {
                id: row.get(0)?,
                depth: row.get(1)?,
            })
        })?;
        let reached = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        tracing::debug!(root, members = reached.len(), "closure computed");
        Ok(reached)
    }

    fn edges_within(&self, members: &HashSet<String>, kinds: &[EdgeKind]) -> Result<Vec<Edge>> {
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let ids = serde_json::to_string(members)?;
        let kinds = kinds_json(kinds)?;
        let mut stmt = self.conn.prepare_cached(EDGES_WITHIN_SQL)?;
        let rows = stmt.query_and_then(params![ids, kinds], row_to_edge)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
