//! Bulk writes into a writable CPG database.
//!
//! Serving never writes. This exists for `cpg-serve init`, for embedding
//! applications that assemble small graphs themselves, and for fixtures.

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::types::{Edge, Node};

const UPSERT_NODE_SQL: &str = "\
INSERT INTO nodes (id, kind, name, package, file, line)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(id) DO UPDATE SET
  kind = excluded.kind,
  name = excluded.name,
  package = excluded.package,
  file = excluded.file,
  line = excluded.line";

const INSERT_EDGE_SQL: &str = "INSERT INTO edges (source, target, kind) VALUES (?1, ?2, ?3)";

const UPSERT_QUERY_SQL: &str = "\
INSERT INTO queries (name, description, sql) VALUES (?1, ?2, ?3)
ON CONFLICT(name) DO UPDATE SET
  description = excluded.description,
  sql = excluded.sql";

/// Transactional writer over an open, schema-initialised connection.
pub struct GraphLoader<'c> {
    conn: &'c Connection,
}

impl<'c> GraphLoader<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert or update nodes inside a single transaction.
    pub fn upsert_nodes(&self, nodes: &[Node]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_NODE_SQL)?;
            for node in nodes {
                stmt.execute(params![
                    node.id,
                    node.kind.as_str(),
                    node.name,
                    node.package,
                    node.file,
                    node.line,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Append edges inside a single transaction. Duplicates are kept as-is.
    pub fn insert_edges(&self, edges: &[Edge]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_EDGE_SQL)?;
            for edge in edges {
                stmt.execute(params![edge.source, edge.target, edge.kind.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Register or replace a named catalog query.
    pub fn upsert_query(&self, name: &str, description: &str, sql: &str) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(UPSERT_QUERY_SQL)?;
        stmt.execute(params![name, description, sql])?;
        Ok(())
    }
}
