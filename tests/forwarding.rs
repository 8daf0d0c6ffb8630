//! Follower → coordinator forwarding over real HTTP

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode, Uri};
use axum::response::Response;
use axum::Router;
use flowcoord::common::auth::{RequestAction, TokenService};
use flowcoord::common::config::{ClusterRole, Grant, PortSeed};
use flowcoord::coordinator::{NodeRole, RevisionSource};
use flowcoord::port::PortState;
use flowcoord::{Config, Node};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower::ServiceExt;

const SECRET: &str = "cluster-secret";

fn base_config(node_id: &str) -> Config {
    let mut config = Config::default();
    config.node_id = node_id.into();
    config.base_url = "http://ports.example".into();
    config.auth.enabled = true;
    config.auth.jwt_secret = Some(SECRET.into());
    config.grants = vec![
        Grant {
            principal: "alice".into(),
            resource: "*".into(),
            actions: vec![RequestAction::Read, RequestAction::Write],
        },
        Grant {
            principal: "pat".into(),
            resource: "/input-ports/p-x".into(),
            actions: vec![RequestAction::Write],
        },
    ];
    config.ports = vec![PortSeed {
        id: "p-x".into(),
        name: "ingest".into(),
        comments: String::new(),
        state: PortState::Stopped,
        concurrent_tasks: 1,
    }];
    config
}

/// Start a coordinator on an ephemeral port
async fn start_coordinator() -> (Node, SocketAddr) {
    let mut config = base_config("coord-1");
    config.cluster.enabled = true;
    config.cluster.role = ClusterRole::Coordinator;
    let node = Node::new(config).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = node.app();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (node, addr)
}

/// Front server that answers every request with `303 See Other` to `target`
async fn start_redirector(target: SocketAddr) -> SocketAddr {
    let app = Router::new().fallback(move |uri: Uri| async move {
        let location = format!("http://{}{}", target, uri);
        (StatusCode::SEE_OTHER, [(header::LOCATION, location)])
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn follower(coordinator_url: Option<String>) -> Node {
    let mut config = base_config("follower-1");
    config.cluster.enabled = true;
    config.cluster.role = ClusterRole::Follower;
    config.cluster.coordinator_url = coordinator_url;
    config.cluster.forward_timeout_ms = 2_000;
    Node::new(config).unwrap()
}

fn bearer(principal: &str) -> String {
    let token = TokenService::new(SECRET.as_bytes())
        .issue(principal, None)
        .unwrap();
    format!("Bearer {}", token)
}

async fn call(app: &Router, principal: &str, method: &str, uri: &str, body: Option<Value>) -> Response {
    let body = body.map(|v| Body::from(v.to_string())).unwrap_or_else(Body::empty);
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, bearer(principal))
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn read(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn rename(version: u64, name: &str) -> Value {
    json!({
        "revision": { "version": version, "clientId": "client-1" },
        "component": { "id": "p-x", "name": name },
    })
}

#[tokio::test]
async fn test_follower_forwards_writes_to_coordinator() {
    let (coordinator, addr) = start_coordinator().await;
    let follower = follower(Some(format!("http://{}", addr)));
    let app = follower.app();

    let response = call(&app, "pat", "PUT", "/input-ports/p-x", Some(rename(0, "renamed"))).await;
    assert_eq!(response.headers()["x-flowcoord-node"], "coord-1");
    let (status, body) = read(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revision"]["version"], 1);
    assert_eq!(body["component"]["name"], "renamed");

    // the mutation happened on the coordinator only
    let facade = coordinator.state().ports.facade();
    assert_eq!(facade.current_version("p-x").unwrap(), 1);
    let local = follower.state().ports.facade();
    assert_eq!(local.current_version("p-x").unwrap(), 0);

    // the coordinator's conflict is relayed unchanged
    let response = call(&app, "pat", "PUT", "/input-ports/p-x", Some(rename(0, "again"))).await;
    let (status, body) = read(response).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);
}

#[tokio::test]
async fn test_forwarded_response_matches_direct_response() {
    let (coordinator, addr) = start_coordinator().await;
    let follower = follower(Some(format!("http://{}", addr)));

    let (direct_status, direct) =
        read(call(&coordinator.app(), "alice", "GET", "/input-ports/p-x", None).await).await;
    let (forwarded_status, forwarded) =
        read(call(&follower.app(), "alice", "GET", "/input-ports/p-x", None).await).await;
    assert_eq!(direct_status, forwarded_status);
    assert_eq!(direct, forwarded);

    // denials come from the coordinator too
    let (status, _) = read(call(&follower.app(), "pat", "GET", "/input-ports/p-x", None).await).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_follower_rejects_invalid_input_without_forwarding() {
    let (coordinator, addr) = start_coordinator().await;
    let follower = follower(Some(format!("http://{}", addr)));

    let body = json!({ "component": { "id": "p-x", "name": "n" } });
    let response = call(&follower.app(), "alice", "PUT", "/input-ports/p-x", Some(body)).await;
    assert_eq!(response.headers()["x-flowcoord-node"], "follower-1");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let facade = coordinator.state().ports.facade();
    assert_eq!(facade.current_version("p-x").unwrap(), 0);
}

#[tokio::test]
async fn test_follower_without_coordinator_is_unavailable() {
    let follower = follower(None);

    let (status, body) =
        read(call(&follower.app(), "alice", "GET", "/input-ports/p-x", None).await).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], 503);
}

#[tokio::test]
async fn test_forward_loop_is_refused() {
    let follower = follower(Some("http://127.0.0.1:9".into()));

    let request = Request::builder()
        .uri("/input-ports/p-x")
        .header(header::AUTHORIZATION, bearer("alice"))
        .header("x-flowcoord-forwarded", "true")
        .body(Body::empty())
        .unwrap();
    let response = follower.app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unreachable_coordinator_is_bad_gateway() {
    // nothing listens on the discard port
    let follower = follower(Some("http://127.0.0.1:9".into()));

    let (status, _) =
        read(call(&follower.app(), "alice", "GET", "/input-ports/p-x", None).await).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_promoted_follower_executes_locally() {
    let follower = follower(None);
    assert_eq!(follower.state().cluster.role(), NodeRole::Follower);

    follower.state().cluster.become_coordinator();
    assert_eq!(follower.state().cluster.role(), NodeRole::Coordinator);

    let response = call(&follower.app(), "alice", "PUT", "/input-ports/p-x", Some(rename(0, "local"))).await;
    assert_eq!(response.headers()["x-flowcoord-node"], "follower-1");
    let (status, body) = read(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revision"]["version"], 1);

    follower
        .state()
        .cluster
        .step_down(Some("http://127.0.0.1:9".into()));
    assert_eq!(follower.state().cluster.role(), NodeRole::Follower);
}

#[tokio::test]
async fn test_coordinator_redirect_is_relayed_not_followed() {
    let (coordinator, addr) = start_coordinator().await;
    let redirector = start_redirector(addr).await;
    let follower = follower(Some(format!("http://{}", redirector)));

    let response = call(&follower.app(), "pat", "PUT", "/input-ports/p-x", Some(rename(0, "renamed"))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        format!("http://{}/input-ports/p-x", addr).as_str()
    );

    // the update was not silently replayed as a read
    let facade = coordinator.state().ports.facade();
    assert_eq!(facade.current_version("p-x").unwrap(), 0);
}
