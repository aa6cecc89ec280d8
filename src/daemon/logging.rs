//! Request logging for the reference daemon.
//!
//! Each request runs inside a `daemon_request` span carrying a fresh request
//! ID and the route it hit. Key requests also record the requested key type
//! and protocol once the body has been parsed. The ID is echoed in the
//! `X-Request-Id` header.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Response, StatusCode},
    middleware::Next,
};
use std::time::Instant;
use tracing::{debug, field, info, info_span, warn, Instrument, Level, Span};
use uuid::Uuid;

use crate::drkey::{Lvl2Key, Lvl2Meta};
use crate::wire::{HEALTH_PATH, LVL2_PATH};

/// Header name for the request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Generate a new unique request ID.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Daemon endpoint a request was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Lvl2Key,
    Health,
    Unknown,
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        match path {
            LVL2_PATH => Route::Lvl2Key,
            HEALTH_PATH => Route::Health,
            _ => Route::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Lvl2Key => "lvl2_key",
            Route::Health => "health",
            Route::Unknown => "unknown",
        }
    }
}

/// Level of the completion event for a response status.
///
/// Health checks stay at `DEBUG` so a polling supervisor does not flood the log.
pub fn completion_level(route: Route, status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::ERROR
    } else if status.is_client_error() {
        Level::WARN
    } else if route == Route::Health {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Attach the requested key type and protocol to the current request span.
pub fn record_key_request(meta: &Lvl2Meta) {
    let span = Span::current();
    span.record("key_type", field::display(meta.key_type));
    span.record("protocol", meta.protocol.as_str());
}

/// Log that a key was issued. Key material is never logged.
pub fn log_key_issued(key: &Lvl2Key, val_time: i64) {
    info!(
        src_ia = %key.src_ia,
        dst_ia = %key.dst_ia,
        val_time,
        epoch = %key.epoch,
        "Issued lvl2 key"
    );
}

/// Middleware that opens the request span, times the handler and tags the
/// response with its request ID.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response<Body> {
    let request_id = generate_request_id();
    let route = Route::from_path(request.uri().path());

    let span = info_span!(
        "daemon_request",
        request_id = %request_id,
        method = %request.method(),
        route = route.as_str(),
        key_type = field::Empty,
        protocol = field::Empty,
        path = field::Empty,
    );
    if route == Route::Unknown {
        span.record("path", request.uri().path());
    }

    let start = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    span.in_scope(|| match completion_level(route, response.status()) {
        Level::ERROR => tracing::error!(status, duration_ms, "Daemon request failed"),
        Level::WARN => warn!(status, duration_ms, "Daemon request rejected"),
        Level::DEBUG => debug!(status, duration_ms, "Daemon request served"),
        _ => info!(status, duration_ms, "Daemon request served"),
    });

    let (mut parts, body) = response.into_parts();
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, header_value);
    }

    Response::from_parts(parts, body)
}

/// Health check response structure.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Epoch length in seconds
    pub epoch_duration_secs: u64,
    /// Protocols with a delegated derivation
    pub protocols: Vec<String>,
}

impl HealthResponse {
    pub fn healthy(epoch_duration_secs: u64, protocols: Vec<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            service: "drkey_daemon".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            epoch_duration_secs,
            protocols,
        }
    }
}
