//! End-to-end tests of the HTTP surface over an on-disk database opened
//! through a read-only pool.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use cpg_serve::api::{build_router, AppState};
use cpg_serve::db::pool::{PoolOptions, StorePool};
use cpg_serve::types::{Edge, EdgeKind, Node, NodeKind};

use common::{abcd, disk_db};

struct Harness {
    _dir: TempDir,
    pool: Arc<StorePool>,
    app: Router,
}

fn variable(id: &str, line: i64) -> Node {
    Node {
        id: id.into(),
        kind: NodeKind::Variable,
        name: id.into(),
        package: "main".into(),
        file: "main.go".into(),
        line,
    }
}

fn harness(pool_size: usize) -> Harness {
    let (mut nodes, mut edges) = abcd();
    nodes.extend([variable("v1", 3), variable("v2", 4), variable("v3", 9)]);
    edges.extend([
        Edge::new("v1", "v2", EdgeKind::Dfg),
        Edge::new("v2", "v3", EdgeKind::ParamOut),
        Edge::new("v1", "v2", EdgeKind::Dfg),
    ]);
    let (dir, path) = disk_db(&nodes, &edges);
    let pool = Arc::new(
        StorePool::open(
            &path,
            PoolOptions {
                size: pool_size,
                acquire_timeout: Duration::from_secs(2),
            },
        )
        .unwrap(),
    );
    let state = AppState::new(Arc::clone(&pool), "http://localhost:5173").unwrap();
    Harness {
        _dir: dir,
        pool,
        app: build_router(state),
    }
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Option<String>, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let truncated = response
        .headers()
        .get("x-truncated")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, truncated, body)
}

fn ids(rows: &Value) -> Vec<&str> {
    rows.as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_str().unwrap())
        .collect()
}

// ---------------------------------------------------------------------------
// Graph endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn call_graph_body_shape() {
    let h = harness(2);
    let (status, _, body) = get(&h.app, "/api/graph/call?function_id=A&direction=callees").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["center_id"], "A");
    assert_eq!(body["direction"], "callees");
    assert_eq!(body["max_depth"], 2);
    assert_eq!(body["max_nodes"], 80);
    assert_eq!(ids(&body["nodes"]), vec!["A", "B", "D", "C"]);
    assert_eq!(
        body["nodes"][0],
        json!({"id": "A", "name": "A", "package": "main", "file": "main.go", "line": 1, "depth": 0})
    );
    assert_eq!(
        body["edges"],
        json!([
            {"source": "A", "target": "B", "kind": "call"},
            {"source": "A", "target": "D", "kind": "call"},
            {"source": "B", "target": "C", "kind": "call"},
        ])
    );
}

#[tokio::test]
async fn call_graph_clamps_out_of_range_numbers() {
    let h = harness(2);
    let (status, _, body) =
        get(&h.app, "/api/graph/call?function_id=C&max_depth=99&max_nodes=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["max_depth"], 8);
    assert_eq!(body["max_nodes"], 10);
    assert_eq!(body["direction"], "both");
    assert_eq!(ids(&body["nodes"]), vec!["C", "B", "A", "D"]);
}

#[tokio::test]
async fn neighborhood_body_shape() {
    let h = harness(2);
    let (status, _, body) = get(&h.app, "/api/graph/neighborhood?function_id=B").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "center": {"id": "B", "name": "B", "package": "main", "file": "main.go", "line": 1},
            "neighbors": [
                {"direction": "callee", "id": "C", "name": "C", "package": "main", "file": "main.go", "line": 1},
                {"direction": "caller", "id": "A", "name": "A", "package": "main", "file": "main.go", "line": 1},
            ],
        })
    );

    let (status, _, body) = get(&h.app, "/api/graph/neighborhood?function_id=v1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"center": null, "neighbors": []}));
}

#[tokio::test]
async fn preflight_is_answered_before_routing() {
    let h = harness(2);
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/graph/neighborhood")
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "GET")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );
}

#[tokio::test]
async fn dataflow_slice_body_shape() {
    let h = harness(2);
    let (status, _, body) = get(&h.app, "/api/graph/dataflow?node_id=v1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["root_id"], "v1");
    assert_eq!(body["direction"], "forward");
    assert_eq!(ids(&body["nodes"]), vec!["v1", "v2", "v3"]);
    assert_eq!(body["nodes"][2]["kind"], "variable");
    assert_eq!(body["nodes"][2]["depth"], 2);
    // Duplicate dfg rows collapse to one edge.
    assert_eq!(
        body["edges"],
        json!([
            {"source": "v1", "target": "v2", "kind": "dfg"},
            {"source": "v2", "target": "v3", "kind": "param_out"},
        ])
    );
}

#[tokio::test]
async fn backward_slice_skips_param_out() {
    let h = harness(2);
    let (status, _, body) =
        get(&h.app, "/api/graph/dataflow?node_id=v3&direction=backward").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["nodes"]), vec!["v3"]);
    assert_eq!(body["edges"], json!([]));
}

#[tokio::test]
async fn impact_rows_and_truncation_header() {
    let h = harness(2);
    let (status, truncated, body) = get(&h.app, "/api/impact?function_id=C").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(truncated.as_deref(), Some("false"));
    assert_eq!(ids(&body), vec!["C", "B", "A"]);
    assert_eq!(body[2]["depth"], 2);

    let (_, truncated, body) = get(&h.app, "/api/impact?function_id=C&limit=2").await;
    assert_eq!(truncated.as_deref(), Some("true"));
    assert_eq!(ids(&body), vec!["C", "B"]);
}

// ---------------------------------------------------------------------------
// Catalog endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn queries_list_hides_sql() {
    let h = harness(2);
    let (status, _, body) = get(&h.app, "/api/queries").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["callees_of", "callers_of", "edge_kind_counts", "functions_in_package"]
    );
    assert!(body[0].get("sql").is_none());
    assert!(body[0]["description"].is_string());
}

#[tokio::test]
async fn named_query_binds_parameters() {
    let h = harness(2);
    let (status, _, body) = get(&h.app, "/api/query/callers_of?id=B").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"query": "callers_of", "limit": 1000, "truncated": false, "rows": [{"source": "A"}]})
    );
}

#[tokio::test]
async fn named_query_limit_marks_truncation() {
    let h = harness(2);
    let (status, _, body) = get(&h.app, "/api/query/edge_kind_counts?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["truncated"], true);
    assert_eq!(
        body["rows"],
        json!([{"kind": "call", "edges": 3}, {"kind": "dfg", "edges": 2}])
    );
}

#[tokio::test]
async fn hostile_argument_is_bound_as_text() {
    let h = harness(2);
    let (status, _, body) =
        get(&h.app, "/api/query/callers_of?id=B%27%20OR%20%271%27%3D%271").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"], json!([]));
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn client_errors_have_json_bodies() {
    let h = harness(2);
    let (status, _, body) = get(&h.app, "/api/graph/call").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "missing function_id"}));

    let (status, _, body) = get(&h.app, "/api/graph/dataflow?node_id=v1&max_depth=deep").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "invalid max_depth"}));

    let (status, _, body) = get(&h.app, "/api/query/does_not_exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "query not found"}));
}

#[tokio::test]
async fn closed_pool_answers_service_unavailable() {
    let h = harness(1);
    h.pool.close();
    let (status, _, body) = get(&h.app, "/api/graph/call?function_id=A").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("closed"));

    // Validation still runs first.
    let (status, _, _) = get(&h.app, "/api/impact").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_share_a_small_pool() {
    let h = harness(2);
    let (_, _, expected) = get(&h.app, "/api/graph/call?function_id=B").await;

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let app = h.app.clone();
            tokio::spawn(async move {
                let uri = if i % 2 == 0 {
                    "/api/graph/call?function_id=B"
                } else {
                    "/api/query/callers_of?id=C"
                };
                (i, get(&app, uri).await)
            })
        })
        .collect();

    for task in tasks {
        let (i, (status, _, body)) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        if i % 2 == 0 {
            assert_eq!(body, expected);
        } else {
            assert_eq!(body["rows"], json!([{"source": "B"}]));
        }
    }
    assert!(h.pool.is_open());
}
