//! Route handlers.
//!
//! Arguments are validated on the async side so client errors never touch
//! the pool. Engine work runs on the blocking thread pool with one pooled
//! connection, held for the whole request and returned on every exit path.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::Json;
use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::api::requests::{
    CallGraphRequest, ImpactRequest, NamedQueryRequest, NeighborhoodRequest, Params, SliceRequest,
};
use crate::api::wire::{CallGraphJson, CallNodeJson, NeighborhoodJson, SliceJson};
use crate::api::AppState;
use crate::catalog::{self, CatalogEntry, NamedQueryResult};
use crate::error::{CpgError, Result};
use crate::graph::store::SqliteGraph;

pub const TRUNCATED_HEADER: &str = "x-truncated";

/// Check out a connection, then run `f` against it on the blocking pool.
/// The connection goes back when the blocking task finishes.
async fn with_connection<T, F>(state: &AppState, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let conn = state.pool.acquire().await?;
    tokio::task::spawn_blocking(move || f(&conn))
        .await
        .map_err(|e| CpgError::Other(format!("request worker failed: {e}")))?
}

// ---------------------------------------------------------------------------
// Graph endpoints
// ---------------------------------------------------------------------------

/// `GET /api/graph/call`
pub async fn graph_call(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> std::result::Result<Json<CallGraphJson>, ApiError> {
    let request = CallGraphRequest::from_params(&params)?;
    let graph = with_connection(&state, move |conn| request.run(&SqliteGraph::new(conn))).await?;
    tracing::info!(
        center = %graph.center_id,
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "call graph served"
    );
    Ok(Json(graph.into()))
}

/// `GET /api/graph/neighborhood`
pub async fn graph_neighborhood(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> std::result::Result<Json<NeighborhoodJson>, ApiError> {
    let request = NeighborhoodRequest::from_params(&params)?;
    let hood = with_connection(&state, move |conn| request.run(&SqliteGraph::new(conn))).await?;
    tracing::info!(
        function_id = %hood.function_id,
        neighbors = hood.neighbors.len(),
        "neighborhood served"
    );
    Ok(Json(hood.into()))
}

/// `GET /api/graph/dataflow`
pub async fn graph_dataflow(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> std::result::Result<Json<SliceJson>, ApiError> {
    let request = SliceRequest::from_params(&params)?;
    let slice = with_connection(&state, move |conn| request.run(&SqliteGraph::new(conn))).await?;
    tracing::info!(
        root = %slice.root_id,
        nodes = slice.nodes.len(),
        edges = slice.edges.len(),
        "slice served"
    );
    Ok(Json(slice.into()))
}

/// `GET /api/impact`. Body is the row list; `x-truncated` says whether
/// rows were cut at `limit`.
pub async fn impact(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> std::result::Result<(HeaderMap, Json<Vec<CallNodeJson>>), ApiError> {
    let request = ImpactRequest::from_params(&params)?;
    let report = with_connection(&state, move |conn| request.run(&SqliteGraph::new(conn))).await?;
    tracing::info!(
        function_id = %report.target_id,
        rows = report.rows.len(),
        truncated = report.truncated,
        "impact served"
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(TRUNCATED_HEADER),
        HeaderValue::from_static(if report.truncated { "true" } else { "false" }),
    );
    let rows = report.rows.into_iter().map(Into::into).collect();
    Ok((headers, Json(rows)))
}

// ---------------------------------------------------------------------------
// Catalog endpoints
// ---------------------------------------------------------------------------

/// `GET /api/query/{name}`
pub async fn named_query(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<Params>,
) -> std::result::Result<Json<NamedQueryResult>, ApiError> {
    let request = NamedQueryRequest::from_params(&name, params)?;
    let result = with_connection(&state, move |conn| request.run(conn)).await?;
    tracing::info!(
        query = %result.query,
        rows = result.rows.len(),
        truncated = result.truncated,
        "named query served"
    );
    Ok(Json(result))
}

/// `GET /api/queries`
pub async fn list_queries(
    State(state): State<AppState>,
) -> std::result::Result<Json<Vec<CatalogEntry>>, ApiError> {
    let entries = with_connection(&state, catalog::list_queries).await?;
    Ok(Json(entries))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
