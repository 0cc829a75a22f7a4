//! HTTP boundary.
//!
//! An axum router under `/api` over a shared [`StorePool`]. A
//! `tower_http` CORS layer stamps the configured origin on every response
//! and answers `OPTIONS` before routing, with status 204.

pub mod error;
pub mod handlers;
pub mod requests;
pub mod wire;

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::schema::ServeConfig;
use crate::db::pool::StorePool;
use crate::error::{CpgError, Result};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: Arc<StorePool>,
    pub allow_origin: HeaderValue,
}

impl AppState {
    pub fn new(pool: Arc<StorePool>, allow_origin: &str) -> Result<Self> {
        let allow_origin = HeaderValue::from_str(allow_origin)
            .map_err(|e| CpgError::Config(format!("server.allow_origin: {e}")))?;
        Ok(Self { pool, allow_origin })
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/graph/call", get(handlers::graph_call))
        .route("/graph/neighborhood", get(handlers::graph_neighborhood))
        .route("/graph/dataflow", get(handlers::graph_dataflow))
        .route("/impact", get(handlers::impact))
        .route("/query/{name}", get(handlers::named_query))
        .route("/queries", get(handlers::list_queries));

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(state.allow_origin.clone()))
        .allow_methods([Method::GET, Method::OPTIONS])
        .expose_headers([HeaderName::from_static(handlers::TRUNCATED_HEADER)]);

    Router::new()
        .nest("/api", api)
        .layer(cors)
        .layer(middleware::from_fn(options_no_content))
        .with_state(state)
}

/// `OPTIONS` is answered by the CORS layer; report it as 204 like every
/// other bodiless reply.
async fn options_no_content(request: Request, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_options {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Open the pool, serve until Ctrl-C, then close the pool.
pub async fn run_server(config: &ServeConfig) -> Result<()> {
    config.validate()?;
    let addr = config.socket_addr()?;
    let pool = Arc::new(StorePool::open(&config.database.path, config.pool_options())?);
    let state = AppState::new(Arc::clone(&pool), &config.server.allow_origin)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("cpg-serve listening on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await;

    pool.close();
    served?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use super::*;
    use crate::api::requests::Params;
    use crate::db::loader::GraphLoader;
    use crate::db::schema::{initialize_database, seed_builtin_queries};
    use crate::types::{Edge, EdgeKind, Node, NodeKind};

    fn node(id: &str, kind: NodeKind) -> Node {
        Node {
            id: id.into(),
            kind,
            name: id.into(),
            package: "main".into(),
            file: "main.go".into(),
            line: 1,
        }
    }

    /// Calls `A -> B -> C`, `A -> D`; data flow `v1 -> v2`.
    pub fn fixture_state() -> AppState {
        let conn = initialize_database(":memory:").unwrap();
        seed_builtin_queries(&conn).unwrap();
        let loader = GraphLoader::new(&conn);
        loader
            .upsert_nodes(&[
                node("A", NodeKind::Function),
                node("B", NodeKind::Function),
                node("C", NodeKind::Function),
                node("D", NodeKind::Function),
                node("v1", NodeKind::Variable),
                node("v2", NodeKind::Variable),
            ])
            .unwrap();
        loader
            .insert_edges(&[
                Edge::new("A", "B", EdgeKind::Call),
                Edge::new("B", "C", EdgeKind::Call),
                Edge::new("A", "D", EdgeKind::Call),
                Edge::new("v1", "v2", EdgeKind::Dfg),
            ])
            .unwrap();
        let pool = StorePool::from_connections(vec![conn], Duration::from_millis(200));
        AppState::new(Arc::new(pool), "*").unwrap()
    }

    pub fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::fixture_state;
    use super::*;
    use axum::body::Body;
    use axum::http::header::{
        ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
        ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
    };
    use tower::ServiceExt;

    fn request(method: Method, uri: &str) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn bad_allow_origin_is_a_config_error() {
        let state = fixture_state();
        let err = AppState::new(state.pool, "bad\norigin").unwrap_err();
        assert!(matches!(err, CpgError::Config(_)));
    }

    #[tokio::test]
    async fn preflight_answers_no_content_with_origin() {
        let app = build_router(fixture_state());
        let response = app
            .oneshot(request(Method::OPTIONS, "/api/graph/call"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn browser_preflight_lists_get_for_configured_origin() {
        let state = AppState::new(fixture_state().pool, "http://localhost:5173").unwrap();
        let app = build_router(state);
        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/impact")
            .header(ORIGIN, "http://localhost:5173")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(preflight).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        let methods = response.headers()[ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        assert!(methods.contains("GET"), "allow-methods was {methods}");
    }

    #[tokio::test]
    async fn truncation_header_is_exposed_to_browsers() {
        let app = build_router(fixture_state());
        let response = app
            .oneshot(request(Method::GET, "/api/impact?function_id=C"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let exposed = response.headers()[ACCESS_CONTROL_EXPOSE_HEADERS].to_str().unwrap();
        assert_eq!(exposed, handlers::TRUNCATED_HEADER);
    }

    #[tokio::test]
    async fn routed_responses_carry_origin_and_status() {
        let app = build_router(fixture_state());
        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/graph/call?function_id=A"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/graph/call"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/query/nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request(Method::GET, "/api/impact?function_id=C&limit=1"))
            .await
            .unwrap();
        assert_eq!(response.headers()[handlers::TRUNCATED_HEADER], "true");
    }

    #[tokio::test]
    async fn non_get_methods_are_rejected() {
        let app = build_router(fixture_state());
        let response = app
            .oneshot(request(Method::POST, "/api/queries"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
