//! Submission recording
//!
//! Persists the outcome of a validated submission and advances the
//! session's completion counter, which feeds the selector's calibration
//! rule and downstream statistics.
//!
//! Records are keyed by (task, session) and written first-write-wins, so a
//! client retry after a dropped response neither overwrites the original
//! record nor double-increments the counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::store::{keys, StateStore};
use crate::types::Result;

/// Immutable audit record of one submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub task_id: String,
    pub session_id: String,
    pub publisher_id: String,
    pub response: Value,
    pub time_spent_ms: u64,
    pub quality_score: f64,
    pub submitted_at: DateTime<Utc>,
}

/// Persists submissions and advances completion counters
#[derive(Clone)]
pub struct SubmissionRecorder {
    store: Arc<dyn StateStore>,
    audit_ttl: Duration,
}

impl SubmissionRecorder {
    pub fn new(store: Arc<dyn StateStore>, audit_ttl: Duration) -> Self {
        Self { store, audit_ttl }
    }

    /// Record a validated submission. Returns whether this was the first
    /// write for (task, session); duplicates are no-ops.
    pub async fn record(&self, record: &SubmissionRecord) -> Result<bool> {
        let key = keys::submission(&record.task_id, &record.session_id);
        let written = self
            .store
            .set_nx(&key, serde_json::to_string(record)?, self.audit_ttl)
            .await?;

        if !written {
            debug!(
                task = %record.task_id,
                session = %record.session_id,
                "Duplicate submission ignored"
            );
            return Ok(false);
        }

        let completed = self
            .store
            .incr(&keys::tasks_completed(&record.session_id))
            .await?;

        info!(
            task = %record.task_id,
            session = %record.session_id,
            score = record.quality_score,
            completed,
            "Submission recorded"
        );

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    const DAY: Duration = Duration::from_secs(86400);

    fn record(task: &str, session: &str) -> SubmissionRecord {
        SubmissionRecord {
            task_id: task.to_string(),
            session_id: session.to_string(),
            publisher_id: "pub-1".to_string(),
            response: json!("Blue"),
            time_spent_ms: 4200,
            quality_score: 1.0,
            submitted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_first_submission_increments_counter() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(&keys::tasks_completed("sess_a"), "0".to_string(), DAY)
            .await
            .unwrap();
        let recorder = SubmissionRecorder::new(Arc::clone(&store) as Arc<dyn StateStore>, DAY);

        assert!(recorder.record(&record("t1", "sess_a")).await.unwrap());
        assert_eq!(
            store.get(&keys::tasks_completed("sess_a")).await.unwrap(),
            Some("1".to_string())
        );
        assert!(store
            .get(&keys::submission("t1", "sess_a"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_noop() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(&keys::tasks_completed("sess_a"), "0".to_string(), DAY)
            .await
            .unwrap();
        let recorder = SubmissionRecorder::new(Arc::clone(&store) as Arc<dyn StateStore>, DAY);

        assert!(recorder.record(&record("t1", "sess_a")).await.unwrap());
        // Retry of the same (task, session): no overwrite, no double count
        assert!(!recorder.record(&record("t1", "sess_a")).await.unwrap());
        assert_eq!(
            store.get(&keys::tasks_completed("sess_a")).await.unwrap(),
            Some("1".to_string())
        );
    }

    #[tokio::test]
    async fn test_distinct_tasks_count_separately() {
        let store = Arc::new(MemoryStore::new());
        let recorder = SubmissionRecorder::new(Arc::clone(&store) as Arc<dyn StateStore>, DAY);

        assert!(recorder.record(&record("t1", "sess_a")).await.unwrap());
        assert!(recorder.record(&record("t2", "sess_a")).await.unwrap());
        assert_eq!(
            store.get(&keys::tasks_completed("sess_a")).await.unwrap(),
            Some("2".to_string())
        );
    }
}
