//! Store key layout
//!
//! All keys used by the gateway, in one place. Each key is logically owned
//! by exactly one session or task at a time, which is why plain get/set is
//! race-free everywhere except the rate windows and counters (those use the
//! store's atomic compound operations).

/// Rate window for one caller on one path class
pub fn rate_window(caller_id: &str, path_class: &str) -> String {
    format!("rate_limit:{caller_id}:{path_class}")
}

/// Session record written at init
pub fn session(publisher_id: &str, session_id: &str) -> String {
    format!("session:{publisher_id}:{session_id}")
}

/// User profile driving task selection
pub fn profile(publisher_id: &str, session_id: &str) -> String {
    format!("user:profile:{publisher_id}:{session_id}")
}

/// Per-session completion counter
pub fn tasks_completed(session_id: &str) -> String {
    format!("user:tasks_completed:{session_id}")
}

/// Task assignment, read once by the validator at submission time
pub fn assignment(task_id: &str) -> String {
    format!("task:{task_id}")
}

/// Short-lived exclusive claim on a task instance
pub fn lease(task_id: &str) -> String {
    format!("task:assigned:{task_id}")
}

/// Validation audit record
pub fn validation(validation_id: &str) -> String {
    format!("validation:{validation_id}")
}

/// Submission record, keyed by (task, session) so client retries are
/// idempotent
pub fn submission(task_id: &str, session_id: &str) -> String {
    format!("submission:{task_id}:{session_id}")
}

/// Expiring batch record
pub fn batch(batch_id: &str) -> String {
    format!("batch:{batch_id}")
}
