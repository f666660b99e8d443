//! Health and version endpoints
//!
//! Liveness only: the gateway is healthy whenever it is running, since the
//! in-process store has no external connection to probe.

use bytes::Bytes;
use chrono::Utc;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub status: &'static str,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub node_id: String,
    pub timestamp: String,
}

/// GET /health, GET /healthz
pub fn handle(state: &AppState) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &HealthResponse {
            healthy: true,
            status: "online",
            version: env!("CARGO_PKG_VERSION"),
            uptime: state.started_at.elapsed().as_secs(),
            node_id: state.args.node_id.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        },
    )
}

#[derive(Serialize)]
struct VersionResponse {
    name: &'static str,
    version: &'static str,
}

/// GET /version
pub fn version() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &VersionResponse {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}
