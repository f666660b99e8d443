//! HTTP route handlers
//!
//! Thin routing layer over the core pipeline. Handlers parse identity and
//! parameters, call one service, and translate the outcome to JSON:
//! absence becomes 204/404, retryable upstream failures become 503, quality
//! issues stay inside a successful 200.

pub mod health;
pub mod sessions;
pub mod status;
pub mod tasks;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

use crate::types::GateError;

/// Build a JSON error response shaped `{"error": {"code", "message"}}`
pub(crate) fn error_response(
    status: StatusCode,
    code: &'static str,
    message: &str,
) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(&json!({
        "error": { "code": code, "message": message }
    }))
    .unwrap_or_default();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-cache")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from(r#"{"error":"Internal error"}"#)))
                .unwrap()
        })
}

/// Build a successful JSON response
pub(crate) fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(data).unwrap_or_default();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-cache")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// 204 for "nothing matched", which the widget treats as "no task right now"
pub(crate) fn no_content() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Map a component error to its outward response
pub(crate) fn gate_error_response(err: &GateError) -> Response<Full<Bytes>> {
    if err.is_retryable() {
        error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "upstream_unavailable",
            "A dependency is unavailable, retry shortly",
        )
    } else {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal error",
        )
    }
}

/// Parse query string into a key-value map
pub(crate) fn parse_query_params(query: &str) -> HashMap<String, String> {
    if query.is_empty() {
        return HashMap::new();
    }

    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_params() {
        let params = parse_query_params("session_id=sess_1&publisher_id=pub-1&language=");
        assert_eq!(params.get("session_id").unwrap(), "sess_1");
        assert_eq!(params.get("publisher_id").unwrap(), "pub-1");
        assert_eq!(params.get("language").unwrap(), "");
        assert!(parse_query_params("").is_empty());
    }

    #[test]
    fn test_error_response_shape() {
        let resp = error_response(StatusCode::BAD_REQUEST, "invalid_parameter", "nope");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get("Content-Type").unwrap(),
            "application/json"
        );
    }
}
