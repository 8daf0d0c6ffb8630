//! Replication routing: execute locally or forward to the coordinator
//!
//! A follower never touches local state for a cluster resource. It re-issues
//! the inbound request verbatim (method, path, query, body and end-to-end
//! headers) against the coordinator and hands the coordinator's response back
//! unchanged. The decision is made before any authorization or locking, so a
//! forwarded request holds no local lock across the network hop.

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{Error, Result};
use crate::coordinator::cluster::ClusterMembership;

/// Marks a request that has already crossed one forward hop
pub const FORWARDED_HEADER: &str = "x-flowcoord-forwarded";

/// Headers scoped to a single connection; never copied across a hop
fn hop_by_hop() -> [HeaderName; 8] {
    [
        header::CONNECTION,
        header::HOST,
        header::CONTENT_LENGTH,
        header::TRANSFER_ENCODING,
        header::TE,
        header::TRAILER,
        header::UPGRADE,
        header::PROXY_AUTHORIZATION,
    ]
}

/// Everything needed to replay an inbound request elsewhere
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path plus query string, e.g. `/input-ports/p1?version=3`
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RequestDescriptor {
    pub fn new(method: Method, path_and_query: impl Into<String>) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn already_forwarded(&self) -> bool {
        self.headers.contains_key(FORWARDED_HEADER)
    }

    /// Headers to send on the forward hop
    fn forward_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        for name in hop_by_hop() {
            headers.remove(name);
        }
        headers.insert(FORWARDED_HEADER, HeaderValue::from_static("true"));
        headers
    }
}

/// The coordinator's answer, relayed as-is
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for ForwardedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        let skip = hop_by_hop();
        let headers = response.headers_mut();
        for (name, value) in self.headers.iter() {
            if !skip.contains(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        response
    }
}

/// Transport used for the forward hop.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        coordinator_url: &str,
        request: &RequestDescriptor,
    ) -> Result<ForwardedResponse>;
}

/// Forwards over HTTP with reqwest
pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    pub fn new(timeout: Duration) -> Result<Self> {
        // 3xx from the coordinator is relayed to the client, never followed
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::InvalidConfig(format!("forwarding client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        coordinator_url: &str,
        request: &RequestDescriptor,
    ) -> Result<ForwardedResponse> {
        let url = format!(
            "{}{}",
            coordinator_url.trim_end_matches('/'),
            request.path_and_query
        );
        let response = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.forward_headers())
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(ForwardedResponse {
            status,
            headers,
            body,
        })
    }
}

/// Outcome of a cluster-aware request
#[derive(Debug)]
pub enum Reply<T> {
    Local(T),
    Forwarded(ForwardedResponse),
}

impl<T> Reply<T> {
    pub fn local(self) -> Option<T> {
        match self {
            Reply::Local(value) => Some(value),
            Reply::Forwarded(_) => None,
        }
    }
}

pub struct ReplicationRouter {
    membership: Arc<dyn ClusterMembership>,
    forwarder: Arc<dyn Forwarder>,
}

impl ReplicationRouter {
    pub fn new(membership: Arc<dyn ClusterMembership>, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            membership,
            forwarder,
        }
    }

    /// True when this node must hand `request` to the coordinator.
    pub fn should_forward(&self, _request: &RequestDescriptor) -> bool {
        self.membership.is_clustered() && !self.membership.is_coordinator()
    }

    /// Replay `request` against the coordinator.
    pub async fn forward(&self, request: &RequestDescriptor) -> Result<ForwardedResponse> {
        if request.already_forwarded() {
            return Err(Error::NoCoordinator(
                "request was already forwarded by another follower".into(),
            ));
        }
        let coordinator = self
            .membership
            .coordinator_url()
            .ok_or_else(|| Error::NoCoordinator("coordinator address unknown".into()))?;

        tracing::debug!(
            method = %request.method,
            path = %request.path_and_query,
            coordinator = %coordinator,
            "forwarding request to coordinator"
        );
        let response = self.forwarder.forward(&coordinator, request).await?;
        tracing::debug!(status = %response.status.as_u16(), "coordinator responded");
        Ok(response)
    }

    /// Cluster-aware wrapper around a local handler: forwards when this node
    /// is not authoritative, otherwise runs `local`.
    pub async fn dispatch<T, F, Fut>(&self, request: &RequestDescriptor, local: F) -> Result<Reply<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.should_forward(request) {
            return self.forward(request).await.map(Reply::Forwarded);
        }
        local().await.map(Reply::Local)
    }
}
