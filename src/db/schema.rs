//! SQLite schema for the persisted code property graph.
//!
//! The extraction pipeline owns the data; serving connections are opened
//! read-only. [`initialize_database`] exists for the `init` command and for
//! test fixtures, which need a writable database with the same layout.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

// ---------------------------------------------------------------------------
// DDL constants
// ---------------------------------------------------------------------------

const CREATE_NODES: &str = "\
CREATE TABLE IF NOT EXISTS nodes (
  id TEXT PRIMARY KEY,
  kind TEXT NOT NULL,
  name TEXT NOT NULL,
  package TEXT NOT NULL DEFAULT '',
  file TEXT NOT NULL DEFAULT '',
  line INTEGER NOT NULL DEFAULT 0,
  end_line INTEGER NOT NULL DEFAULT 0
)";

// No uniqueness constraint: the extractor may emit the same (source, target,
// kind) more than once and readers dedup at presentation time.
const CREATE_EDGES: &str = "\
CREATE TABLE IF NOT EXISTS edges (
  source TEXT NOT NULL,
  target TEXT NOT NULL,
  kind TEXT NOT NULL
)";

const CREATE_QUERIES: &str = "\
CREATE TABLE IF NOT EXISTS queries (
  name TEXT PRIMARY KEY,
  description TEXT NOT NULL DEFAULT '',
  sql TEXT NOT NULL
)";

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_package ON nodes(package)",
    "CREATE INDEX IF NOT EXISTS idx_edges_source_kind ON edges(source, kind)",
    "CREATE INDEX IF NOT EXISTS idx_edges_target_kind ON edges(target, kind)",
];

/// Catalog entries installed by `cpg-serve init --seed-catalog`.
///
/// Each tuple is `(name, description, sql)`.
pub const BUILTIN_QUERIES: &[(&str, &str, &str)] = &[
    (
        "callers_of",
        "Direct callers of :id",
        "SELECT source FROM edges WHERE target = :id AND kind = 'call' ORDER BY source",
    ),
    (
        "callees_of",
        "Direct callees of :id",
        "SELECT target FROM edges WHERE source = :id AND kind = 'call' ORDER BY target",
    ),
    (
        "functions_in_package",
        "Functions declared in :package",
        "SELECT id, name, file, line FROM nodes \
         WHERE kind = 'function' AND package = :package ORDER BY name, id",
    ),
    (
        "edge_kind_counts",
        "Number of edges per kind",
        "SELECT kind, COUNT(*) AS edges FROM edges GROUP BY kind ORDER BY kind",
    ),
];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Open (or create) the database at `db_path` with write access and apply
/// the schema.
pub fn initialize_database(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;

    conn.pragma_update(None, "foreign_keys", "OFF")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    conn.execute_batch(CREATE_NODES)?;
    conn.execute_batch(CREATE_EDGES)?;
    conn.execute_batch(CREATE_QUERIES)?;
    for ddl in CREATE_INDEXES {
        conn.execute_batch(ddl)?;
    }

    Ok(conn)
}

/// Open an existing database for serving.
///
/// The connection cannot write: `SQLITE_OPEN_READ_ONLY` plus `query_only`,
/// so catalog statements are unable to modify the graph whatever they say.
pub fn open_read_only(db_path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI,
    )?;
    conn.pragma_update(None, "query_only", "ON")?;
    Ok(conn)
}

/// Insert the [`BUILTIN_QUERIES`] into the catalog, leaving entries that
/// already exist untouched. Returns how many rows were added.
pub fn seed_builtin_queries(conn: &Connection) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO queries (name, description, sql) VALUES (?1, ?2, ?3)",
    )?;
    let mut added = 0;
    for (name, description, sql) in BUILTIN_QUERIES {
        added += stmt.execute([name, description, sql])?;
    }
    Ok(added)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
