//! Task endpoints
//!
//! - `GET /v1/tasks/next` - next task for a session
//! - `POST /v1/tasks/{id}/submit` - submit a label, get a reward
//! - `GET /v1/tasks/batch` - batch fetch for publishers
//!
//! The submit pipeline runs validate -> reward -> record strictly in
//! sequence. A submission against an unknown or expired task short-circuits:
//! it reports `success: false` with the validator's low-confidence score and
//! no reward, and the recorder never runs.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use super::{error_response, gate_error_response, json_response, no_content};
use crate::catalog::TaskFilters;
use crate::reward::{reward_for, Reward};
use crate::server::AppState;
use crate::submission::SubmissionRecord;

/// Submission payload from the widget
#[derive(Debug, Deserialize)]
pub struct TaskSubmissionRequest {
    pub session_id: String,
    pub publisher_id: String,
    pub response: Value,
    pub time_spent_ms: u64,
    /// Client context, accepted for audit but not interpreted here
    #[serde(default)]
    pub session_info: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct TaskSubmissionResponse {
    pub success: bool,
    pub reward: Reward,
    pub quality_score: f64,
    pub next_task_available: bool,
}

/// GET /v1/tasks/next
pub async fn next_task(
    state: &AppState,
    query: &HashMap<String, String>,
) -> Response<Full<Bytes>> {
    let Some(session_id) = query.get("session_id").filter(|v| !v.is_empty()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_parameter",
            "session_id is required",
        );
    };
    let Some(publisher_id) = query.get("publisher_id").filter(|v| !v.is_empty()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_parameter",
            "publisher_id is required",
        );
    };

    let language = query.get("language").filter(|v| !v.is_empty());
    let category = query.get("website_category").filter(|v| !v.is_empty());

    match state
        .selector
        .select_next(
            session_id,
            publisher_id,
            language.map(String::as_str),
            category.map(String::as_str),
        )
        .await
    {
        Ok(Some(view)) => json_response(StatusCode::OK, &view),
        Ok(None) => no_content(),
        Err(e) => {
            warn!(session = %session_id, error = %e, "Task selection failed");
            gate_error_response(&e)
        }
    }
}

/// POST /v1/tasks/{task_id}/submit
pub async fn submit_task(state: &AppState, task_id: &str, body: Bytes) -> Response<Full<Bytes>> {
    let submission: TaskSubmissionRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                &format!("Malformed submission: {e}"),
            )
        }
    };

    let result = match state
        .validator
        .validate(
            task_id,
            &submission.session_id,
            &submission.publisher_id,
            &submission.response,
            submission.time_spent_ms,
        )
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!(task = task_id, error = %e, "Validation failed");
            return gate_error_response(&e);
        }
    };

    // Unknown or expired assignment: no reward tier, no record, the
    // validator's score is still reported for transparency
    if !result.task_found() {
        return json_response(
            StatusCode::OK,
            &TaskSubmissionResponse {
                success: false,
                reward: Reward::None,
                quality_score: result.quality_score,
                next_task_available: true,
            },
        );
    }

    let reward = reward_for(result.quality_score);

    let record = SubmissionRecord {
        task_id: task_id.to_string(),
        session_id: submission.session_id.clone(),
        publisher_id: submission.publisher_id.clone(),
        response: submission.response.clone(),
        time_spent_ms: submission.time_spent_ms,
        quality_score: result.quality_score,
        submitted_at: chrono::Utc::now(),
    };
    if let Err(e) = state.recorder.record(&record).await {
        warn!(task = task_id, error = %e, "Submission recording failed");
        return gate_error_response(&e);
    }

    json_response(
        StatusCode::OK,
        &TaskSubmissionResponse {
            success: true,
            reward,
            quality_score: result.quality_score,
            next_task_available: true,
        },
    )
}

/// GET /v1/tasks/batch
pub async fn batch_tasks(
    state: &AppState,
    query: &HashMap<String, String>,
) -> Response<Full<Bytes>> {
    let Some(publisher_id) = query.get("publisher_id").filter(|v| !v.is_empty()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_parameter",
            "publisher_id is required",
        );
    };

    let count = match query.get("count").filter(|v| !v.is_empty()) {
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) if (1..=100).contains(&n) => n,
            _ => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "invalid_parameter",
                    "count must be between 1 and 100",
                )
            }
        },
        None => 10,
    };

    let complexity_max = match query.get("complexity").filter(|v| !v.is_empty()) {
        Some(raw) => match raw.as_str() {
            "low" => Some(1),
            "medium" => Some(2),
            "high" => Some(3),
            _ => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "invalid_parameter",
                    "complexity must be one of low, medium, high",
                )
            }
        },
        None => None,
    };

    let filters = TaskFilters {
        language: query.get("language").filter(|v| !v.is_empty()).cloned(),
        category: query.get("category").filter(|v| !v.is_empty()).cloned(),
        complexity_max,
    };

    match state.selector.select_batch(publisher_id, count, filters).await {
        Ok(batch) if batch.tasks.is_empty() => no_content(),
        Ok(batch) => json_response(StatusCode::OK, &batch),
        Err(e) => {
            warn!(publisher = %publisher_id, error = %e, "Batch selection failed");
            gate_error_response(&e)
        }
    }
}
