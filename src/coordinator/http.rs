//! HTTP API
//!
//! Binds the input port operations to routes and maps outcomes to status
//! codes. Every route runs behind request tracing and authentication; the
//! replication decision happens inside the request handler, after input
//! validation and before any authorization or locking.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::common::auth::Principal;
use crate::common::auth_middleware::{auth_middleware, AuthState};
use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{Error, Result, Versioned};
use crate::coordinator::cluster::{ClusterMembership, ClusterNode};
use crate::coordinator::handler::RequestHandler;
use crate::coordinator::router::{Reply, RequestDescriptor};
use crate::coordinator::write::WriteCoordinator;
use crate::port::{Port, PortEntity, PortFacade};

/// Identifies the node that executed a request locally
pub const NODE_HEADER: &str = "x-flowcoord-node";

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub ports: RequestHandler<PortFacade>,
    pub cluster: Arc<ClusterNode>,
    pub writes: Arc<WriteCoordinator>,
    pub base_url: Arc<str>,
}

/// Creates the HTTP router with all public endpoints.
pub fn create_router(state: AppState, auth: AuthState) -> Router {
    Router::new()
        .route(
            "/input-ports/:id",
            get(get_port).put(update_port).delete(delete_port),
        )
        .route("/cluster/status", get(cluster_status))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(auth, auth_middleware))
        .layer(middleware::from_fn(request_tracing_middleware))
        .with_state(state)
}

fn descriptor(method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> RequestDescriptor {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    RequestDescriptor::new(method, path_and_query)
        .with_headers(headers)
        .with_body(body)
}

/// Marks `response` as produced by this node
fn from_this_node(state: &AppState, mut response: Response) -> Response {
    if let Ok(node) = HeaderValue::from_str(state.cluster.node_id()) {
        response.headers_mut().insert(NODE_HEADER, node);
    }
    response
}

fn respond(state: &AppState, result: Result<Reply<Versioned<Port>>>) -> Response {
    match result {
        Ok(Reply::Local(versioned)) => {
            let entity = PortEntity::from_versioned(&versioned, &state.base_url);
            from_this_node(state, (StatusCode::OK, Json(entity)).into_response())
        }
        Ok(Reply::Forwarded(forwarded)) => forwarded.into_response(),
        Err(e) => from_this_node(state, e.into_response()),
    }
}

/// GET /input-ports/:id
async fn get_port(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request = descriptor(method, &uri, headers, Bytes::new());
    let result = state.ports.get(&principal, &request, &id).await;
    respond(&state, result)
}

/// PUT /input-ports/:id
async fn update_port(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let update = if body.is_empty() {
        None
    } else {
        let parsed = serde_json::from_slice::<PortEntity>(&body)
            .and_then(PortEntity::into_update)
            .map_err(|e| Error::BadRequest(format!("malformed input port entity: {}", e)));
        match parsed {
            Ok(update) => Some(update),
            Err(e) => return from_this_node(&state, e.into_response()),
        }
    };

    let request = descriptor(method, &uri, headers, body);
    let result = state.ports.update(&principal, &request, &id, update).await;
    respond(&state, result)
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    version: Option<String>,
    #[serde(rename = "clientId")]
    client_id: Option<String>,
}

fn parse_version(raw: Option<&str>) -> Result<Option<u64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| Error::BadRequest(format!("version must be a non-negative integer, got '{}'", v))),
    }
}

/// DELETE /input-ports/:id?version=&clientId=
async fn delete_port(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let version = match parse_version(params.version.as_deref()) {
        Ok(version) => version,
        Err(e) => return from_this_node(&state, e.into_response()),
    };
    let request = descriptor(method, &uri, headers, Bytes::new());
    let result = state
        .ports
        .delete(&principal, &request, &id, version, params.client_id)
        .await;
    respond(&state, result)
}

/// Role and coordination status of this node
async fn cluster_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "node_id": state.cluster.node_id(),
        "role": state.cluster.role().to_string(),
        "clustered": state.cluster.is_clustered(),
        "coordinator_url": state.cluster.coordinator_url(),
        "locked_resources": state.writes.locks().len(),
        "ports": state.ports.facade().len(),
    }))
}

/// Liveness probe
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": crate::VERSION,
    }))
}
