//! Row → domain conversions shared by every query that reads `nodes` or
//! `edges`. Columns are fetched by name so callers may select extra columns.

use rusqlite::Row;

use crate::types::{Edge, EdgeKind, Node, NodeKind};

pub fn row_to_node(row: &Row<'_>) -> rusqlite::Result<Node> {
    let kind: String = row.get("kind")?;
    Ok(Node {
        id: row.get("id")?,
        kind: NodeKind::parse(&kind),
        name: row.get("name")?,
        package: row.get("package")?,
        file: row.get("file")?,
        line: row.get("line")?,
    })
}

pub fn row_to_edge(row: &Row<'_>) -> rusqlite::Result<Edge> {
    let kind: String = row.get("kind")?;
    Ok(Edge {
        source: row.get("source")?,
        target: row.get("target")?,
        kind: EdgeKind::parse(&kind),
    })
}
