//! Request tracing middleware
//!
//! Each request is tagged with a request id before it reaches a handler. The
//! id is written back onto the inbound headers, so when a follower replays
//! the request against the coordinator both nodes log under the same id.

use axum::{
    body::Body,
    http::{HeaderValue, Request, Response, StatusCode},
    middleware::Next,
};
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::coordinator::router::FORWARDED_HEADER;

/// Header carrying the request id across nodes
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// The caller's id when it is a usable header value, otherwise a fresh one
fn request_id_of(request: &Request<Body>) -> (String, HeaderValue) {
    if let Some(value) = request.headers().get(REQUEST_ID_HEADER) {
        if let Ok(id) = value.to_str() {
            if !id.is_empty() {
                return (id.to_string(), value.clone());
            }
        }
    }
    let id = generate_request_id();
    // a uuid is always a valid header value
    let value = HeaderValue::from_str(&id).unwrap_or_else(|_| HeaderValue::from_static("invalid"));
    (id, value)
}

fn log_completion(status: StatusCode, elapsed: Duration) {
    let status_code = status.as_u16();
    let duration_ms = elapsed.as_millis() as u64;
    if status.is_server_error() {
        tracing::error!(status = status_code, duration_ms, "request failed");
    } else if status.is_client_error() {
        tracing::warn!(status = status_code, duration_ms, "request rejected");
    } else {
        tracing::info!(status = status_code, duration_ms, "request completed");
    }
}

/// Assigns a request id, runs the request inside an `http_request` span and
/// logs its outcome.
pub async fn request_tracing_middleware(mut request: Request<Body>, next: Next) -> Response<Body> {
    let start = Instant::now();
    let (request_id, header) = request_id_of(&request);
    request
        .headers_mut()
        .insert(REQUEST_ID_HEADER, header.clone());

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        forwarded = request.headers().contains_key(FORWARDED_HEADER),
    );

    let mut response = next.run(request).instrument(span.clone()).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, header);

    span.in_scope(|| log_completion(response.status(), start.elapsed()));
    response
}
