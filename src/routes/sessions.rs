//! Session endpoints
//!
//! - `POST /v1/users/sessions` - initialize a session and starting profile
//! - `PATCH /v1/users/sessions/{id}/profile` - apply a profile update

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::warn;

use super::{error_response, gate_error_response, json_response};
use crate::server::AppState;
use crate::session::{ProfileUpdateRequest, SessionInitRequest};

/// POST /v1/users/sessions
pub async fn init_session(state: &AppState, body: Bytes) -> Response<Full<Bytes>> {
    let request: SessionInitRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                &format!("Malformed session request: {e}"),
            )
        }
    };

    match state.sessions.init_session(request).await {
        Ok(response) => json_response(StatusCode::CREATED, &response),
        Err(e) => {
            warn!(error = %e, "Session init failed");
            gate_error_response(&e)
        }
    }
}

/// PATCH /v1/users/sessions/{session_id}/profile
pub async fn update_profile(
    state: &AppState,
    session_id: &str,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let request: ProfileUpdateRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                &format!("Malformed profile update: {e}"),
            )
        }
    };

    match state.sessions.update_profile(session_id, request).await {
        Ok(Some(response)) => json_response(StatusCode::OK, &response),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "session_not_found",
            "Session not found or expired",
        ),
        Err(e) => {
            warn!(session = session_id, error = %e, "Profile update failed");
            gate_error_response(&e)
        }
    }
}
