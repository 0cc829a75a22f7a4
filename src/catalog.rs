//! Named query catalog and dispatcher.
//!
//! Catalog entries live in the `queries` table as `(name, description,
//! sql)`. Running one prepares its statement unchanged and binds caller
//! arguments by placeholder *name*: for `:id`, `@id` or `$id` the argument
//! key is `id`. Caller text is only ever a bound value, never part of the
//! statement.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use rusqlite::types::ValueRef;
use rusqlite::{params, Batch, Connection, OptionalExtension, Statement};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CpgError, Result};

pub const LIMIT_RANGE: RangeInclusive<i64> = 1..=5000;
pub const DEFAULT_LIMIT: i64 = 1000;

const LIST_QUERIES_SQL: &str = "SELECT name, description FROM queries ORDER BY name";
const LOAD_QUERY_SQL: &str = "SELECT name, description, sql FROM queries WHERE name = ?1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    #[serde(skip)]
    pub sql: String,
}

pub type ResultRow = Map<String, Value>;

#[derive(Debug, Clone, Serialize)]
pub struct NamedQueryResult {
    pub query: String,
    pub limit: usize,
    pub truncated: bool,
    pub rows: Vec<ResultRow>,
}

// ---------------------------------------------------------------------------
// Catalog access
// ---------------------------------------------------------------------------

/// Every catalog entry, by name. The statement text is not loaded.
pub fn list_queries(conn: &Connection) -> Result<Vec<CatalogEntry>> {
    let mut stmt = conn.prepare_cached(LIST_QUERIES_SQL)?;
    let rows = stmt.query_map([], |row| {
        Ok(CatalogEntry {
            name: row.get(0)?,
            description: row.get(1)?,
            sql: String::new(),
        })
    })?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Into::into)
}

pub fn load_entry(conn: &Connection, name: &str) -> Result<CatalogEntry> {
    let mut stmt = conn.prepare_cached(LOAD_QUERY_SQL)?;
    stmt.query_row(params![name], |row| {
        Ok(CatalogEntry {
            name: row.get(0)?,
            description: row.get(1)?,
            sql: row.get(2)?,
        })
    })
    .optional()?
    .ok_or_else(|| CpgError::not_found("query not found"))
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Look up `name`, bind `params` by placeholder name and pull at most
/// `limit` rows.
///
/// The catalog is read on every call, so edits to the `queries` table are
/// visible without a restart.
pub fn run_named(
    conn: &Connection,
    name: &str,
    params: &HashMap<String, String>,
    limit: usize,
) -> Result<NamedQueryResult> {
    if name.is_empty() {
        return Err(CpgError::invalid("missing query name"));
    }
    if limit == 0 || limit as i64 > *LIMIT_RANGE.end() {
        return Err(CpgError::invalid("limit out of range"));
    }
    let entry = load_entry(conn, name)?;
    let (rows, truncated) = run_catalog_query(conn, &entry.sql, params, limit)?;
    tracing::debug!(query = name, rows = rows.len(), truncated, "named query complete");
    Ok(NamedQueryResult {
        query: entry.name,
        limit,
        truncated,
        rows,
    })
}

/// Prepare `sql`, bind by name, and stream rows until `limit` is reached.
///
/// `truncated` is `true` once `limit` rows were read; the remaining rows are
/// never counted.
pub fn run_catalog_query(
    conn: &Connection,
    sql: &str,
    params: &HashMap<String, String>,
    limit: usize,
) -> Result<(Vec<ResultRow>, bool)> {
    let mut stmt = prepare_single(conn, sql)?;
    bind_by_name(&mut stmt, params)?;

    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
    let mut rows = stmt.raw_query();
    let mut out = Vec::new();
    while out.len() < limit {
        let Some(row) = rows.next()? else {
            break;
        };
        let mut record = Map::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            record.insert(column.clone(), cell_to_json(row.get_ref(idx)?));
        }
        out.push(record);
    }

    let truncated = out.len() >= limit;
    Ok((out, truncated))
}

/// Catalog text must hold exactly one statement.
fn prepare_single<'c>(conn: &'c Connection, sql: &str) -> Result<Statement<'c>> {
    let mut batch = Batch::new(conn, sql);
    let stmt = batch
        .next()?
        .ok_or_else(|| CpgError::Other("catalog statement is empty".into()))?;
    if batch.next()?.is_some() {
        return Err(CpgError::Other(
            "catalog statement must be a single statement".into(),
        ));
    }
    Ok(stmt)
}

/// Bind every named placeholder that has a non-empty caller argument.
/// Anonymous placeholders and names that are only a marker stay unbound.
fn bind_by_name(stmt: &mut Statement<'_>, params: &HashMap<String, String>) -> Result<()> {
    let names: Vec<(usize, String)> = (1..=stmt.parameter_count())
        .filter_map(|idx| stmt.parameter_name(idx).map(|n| (idx, n.to_owned())))
        .collect();

    for (idx, name) in names {
        let Some(key) = placeholder_key(&name) else {
            continue;
        };
        match params.get(key) {
            Some(value) if !value.is_empty() => stmt.raw_bind_parameter(idx, value.as_str())?,
            _ => {}
        }
    }
    Ok(())
}

/// `:id` -> `id`. Names shorter than two characters have no key.
fn placeholder_key(name: &str) -> Option<&str> {
    let mut chars = name.chars();
    chars.next()?;
    let key = chars.as_str();
    (!key.is_empty()).then_some(key)
}

fn cell_to_json(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::String(String::new()),
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::loader::GraphLoader;
    use crate::db::schema::{initialize_database, seed_builtin_queries};
    use crate::error::ErrorKind;
    use crate::types::{Edge, EdgeKind};
    use pretty_assertions::assert_eq;

    fn setup() -> Connection {
        let conn = initialize_database(":memory:").unwrap();
        seed_builtin_queries(&conn).unwrap();
        GraphLoader::new(&conn)
            .insert_edges(&[
                Edge::new("a", "x", EdgeKind::Call),
                Edge::new("b", "x", EdgeKind::Call),
                Edge::new("c", "y", EdgeKind::Call),
                Edge::new("d", "x", EdgeKind::Dfg),
            ])
            .unwrap();
        conn
    }

    fn args(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn column(result: &NamedQueryResult, name: &str) -> Vec<Value> {
        result.rows.iter().map(|r| r[name].clone()).collect()
    }

    #[test]
    fn binds_by_placeholder_name() {
        let conn = setup();
        let result = run_named(&conn, "callers_of", &args(&[("id", "x")]), 1000).unwrap();
        assert_eq!(result.query, "callers_of");
        assert_eq!(column(&result, "source"), vec![Value::from("a"), Value::from("b")]);
        assert!(!result.truncated);
    }

    #[test]
    fn unknown_name_is_not_found() {
        let conn = setup();
        let err = run_named(&conn, "nope", &HashMap::new(), 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "query not found");
    }

    #[test]
    fn limit_stops_pulling_and_flags_truncation() {
        let conn = setup();
        let result = run_named(&conn, "callers_of", &args(&[("id", "x")]), 1).unwrap();
        assert_eq!(result.rows.len(), 1);
        assert!(result.truncated);
    }

    #[test]
    fn unmatched_and_empty_arguments_stay_unbound() {
        let conn = setup();
        let result = run_named(&conn, "callers_of", &args(&[("other", "x")]), 10).unwrap();
        assert!(result.rows.is_empty());
        let result = run_named(&conn, "callers_of", &args(&[("id", "")]), 10).unwrap();
        assert!(result.rows.is_empty());
    }

    #[test]
    fn every_placeholder_marker_maps_to_the_same_key() {
        let conn = setup();
        let params = args(&[("v", "hello"), ("1", "one")]);
        for sql in ["SELECT :v AS out", "SELECT @v AS out", "SELECT $v AS out", "SELECT ?1 AS out"] {
            let (rows, _) = run_catalog_query(&conn, sql, &params, 10).unwrap();
            let expected = if sql.contains("?1") { "one" } else { "hello" };
            assert_eq!(rows[0]["out"], Value::from(expected), "{sql}");
        }
    }

    #[test]
    fn anonymous_placeholder_is_left_null() {
        let conn = setup();
        let (rows, _) = run_catalog_query(&conn, "SELECT ? AS out", &args(&[("", "x")]), 10).unwrap();
        assert_eq!(rows[0]["out"], Value::from(""));
    }

    #[test]
    fn cells_keep_store_types() {
        let conn = setup();
        let (rows, _) = run_catalog_query(
            &conn,
            "SELECT 42 AS i, 2.5 AS r, 'txt' AS t, NULL AS n, x'6869' AS b",
            &HashMap::new(),
            10,
        )
        .unwrap();
        let row = &rows[0];
        assert_eq!(row["i"], Value::from(42));
        assert_eq!(row["r"], Value::from(2.5));
        assert_eq!(row["t"], Value::from("txt"));
        assert_eq!(row["n"], Value::from(""));
        assert_eq!(row["b"], Value::from("hi"));
    }

    #[test]
    fn hostile_value_is_bound_as_literal() {
        let conn = setup();
        conn.execute_batch("CREATE TABLE x (v TEXT); INSERT INTO x VALUES ('keep');")
            .unwrap();
        let hostile = "'; DROP TABLE x; --";
        let result = run_named(&conn, "callers_of", &args(&[("id", hostile)]), 10).unwrap();
        assert!(result.rows.is_empty());

        let (rows, _) = run_catalog_query(&conn, "SELECT :v AS v", &args(&[("v", hostile)]), 10).unwrap();
        assert_eq!(rows[0]["v"], Value::from(hostile));

        let kept: i64 = conn.query_row("SELECT COUNT(*) FROM x", [], |r| r.get(0)).unwrap();
        assert_eq!(kept, 1);
    }

    #[test]
    fn malformed_statement_is_internal() {
        let conn = setup();
        GraphLoader::new(&conn)
            .upsert_query("broken", "", "SELEC nonsense")
            .unwrap();
        let err = run_named(&conn, "broken", &HashMap::new(), 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn multiple_statements_are_rejected() {
        let conn = setup();
        let err = run_catalog_query(&conn, "SELECT 1; SELECT 2", &HashMap::new(), 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn catalog_edits_are_seen_on_next_call() {
        let conn = setup();
        assert!(run_named(&conn, "fresh", &HashMap::new(), 10).is_err());
        GraphLoader::new(&conn)
            .upsert_query("fresh", "added later", "SELECT 7 AS seven")
            .unwrap();
        let result = run_named(&conn, "fresh", &HashMap::new(), 10).unwrap();
        assert_eq!(column(&result, "seven"), vec![Value::from(7)]);
    }

    #[test]
    fn listing_is_ordered_by_name() {
        let conn = setup();
        let names: Vec<String> = list_queries(&conn).unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec!["callees_of", "callers_of", "edge_kind_counts", "functions_in_package"]
        );
    }

    #[test]
    fn placeholder_keys() {
        assert_eq!(placeholder_key(":id"), Some("id"));
        assert_eq!(placeholder_key("?12"), Some("12"));
        assert_eq!(placeholder_key(":"), None);
        assert_eq!(placeholder_key(""), None);
    }

    #[test]
    fn rejects_bad_limits() {
        let conn = setup();
        assert!(run_named(&conn, "callers_of", &HashMap::new(), 0).is_err());
        assert!(run_named(&conn, "callers_of", &HashMap::new(), 5001).is_err());
    }
}
