//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use cpg_serve::db::loader::GraphLoader;
use cpg_serve::db::schema::{initialize_database, seed_builtin_queries};
use cpg_serve::types::{Edge, EdgeKind, Node, NodeKind};
use rusqlite::Connection;
use tempfile::TempDir;

pub fn function(id: &str) -> Node {
    Node {
        id: id.into(),
        kind: NodeKind::Function,
        name: id.into(),
        package: "main".into(),
        file: "main.go".into(),
        line: 1,
    }
}

pub fn call(source: &str, target: &str) -> Edge {
    Edge::new(source, target, EdgeKind::Call)
}

/// Writable in-memory database holding `nodes` and `edges`, with the
/// built-in catalog installed.
pub fn memory_db(nodes: &[Node], edges: &[Edge]) -> Connection {
    let conn = initialize_database(":memory:").unwrap();
    fill(&conn, nodes, edges);
    conn
}

/// Same, on disk, for read-only pools.
pub fn disk_db(nodes: &[Node], edges: &[Edge]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cpg.db");
    let conn = initialize_database(path.to_str().unwrap()).unwrap();
    fill(&conn, nodes, edges);
    drop(conn);
    (dir, path)
}

fn fill(conn: &Connection, nodes: &[Node], edges: &[Edge]) {
    seed_builtin_queries(conn).unwrap();
    let loader = GraphLoader::new(conn);
    loader.upsert_nodes(nodes).unwrap();
    loader.insert_edges(edges).unwrap();
}

/// `A -> B -> C`, `A -> D`, all functions.
pub fn abcd() -> (Vec<Node>, Vec<Edge>) {
    (
        ["A", "B", "C", "D"].into_iter().map(function).collect(),
        vec![call("A", "B"), call("B", "C"), call("A", "D")],
    )
}
