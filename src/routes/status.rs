//! Operational status endpoint

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;
use crate::ratelimit::PathClass;
use crate::server::AppState;
use crate::store::StoreStats;

#[derive(Serialize)]
struct RuleView {
    class: PathClass,
    limit: u32,
    window_seconds: u64,
}

#[derive(Serialize)]
struct StatusResponse {
    version: &'static str,
    uptime_seconds: u64,
    store: StoreStats,
    rate_rules: Vec<RuleView>,
}

/// GET /status
pub fn handle(state: &AppState) -> Response<Full<Bytes>> {
    let rate_rules = state
        .limiter
        .table()
        .describe()
        .into_iter()
        .map(|(class, quota)| RuleView {
            class,
            limit: quota.limit,
            window_seconds: quota.window_secs,
        })
        .collect();

    json_response(
        StatusCode::OK,
        &StatusResponse {
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: state.started_at.elapsed().as_secs(),
            store: state.store.stats(),
            rate_rules,
        },
    )
}
