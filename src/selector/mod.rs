//! Task selection
//!
//! Chooses the next task for a session and decides when to inject a hidden
//! golden-set calibration task. Selection is profile-driven: language and
//! complexity cap come from the session profile, with the platform ceiling
//! applied on top.
//!
//! Golden-set injection is a fixed policy, not randomized: the very first
//! task a new beginner receives is always a calibration task with a known
//! answer, so every new labeler is calibrated once before being trusted.
//!
//! Handing out a task writes two records: the assignment (read back by the
//! validator at submission time) and a shorter-lived lease that keeps the
//! same task instance from being handed to two sessions at once. The lease
//! expires on its own; an abandoned task frees up for reassignment while the
//! assignment stays valid for late submissions.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::{TaskContent, TaskFilters, TaskSource};
use crate::quality::ValidationMethod;
use crate::session::UserProfile;
use crate::store::{keys, StateStore};
use crate::types::Result;

/// Assignment record, read exactly once by the validator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task_id: Uuid,
    pub task_type: String,
    #[serde(flatten)]
    pub method: ValidationMethod,
    pub publisher_id: String,
    pub session_id: String,
    pub complexity_level: u8,
    pub created_at: DateTime<Utc>,
}

/// Outward task view; never carries the expected answer
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub task_id: Uuid,
    pub task_type: String,
    pub content: TaskContent,
    pub options: Vec<String>,
    pub time_estimate_seconds: u32,
    pub complexity_level: u8,
    pub golden_set: bool,
    pub expires_at: DateTime<Utc>,
}

/// Task summary inside a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: Uuid,
    pub task_type: String,
    pub content: TaskContent,
    pub options: Vec<String>,
    pub complexity_level: u8,
}

/// Outward batch view
#[derive(Debug, Clone, Serialize)]
pub struct BatchView {
    pub batch_id: String,
    pub tasks: Vec<TaskSummary>,
    pub expires_at: DateTime<Utc>,
}

/// Stored batch record
#[derive(Debug, Serialize, Deserialize)]
struct BatchRecord {
    batch_id: String,
    publisher_id: String,
    tasks: Vec<TaskSummary>,
    created_at: DateTime<Utc>,
}

/// Selection tunables, all from configuration
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Hard ceiling on task complexity regardless of profile
    pub platform_max_complexity: u8,
    pub assignment_ttl: Duration,
    pub lease_ttl: Duration,
    pub batch_ttl: Duration,
}

/// Chooses tasks for sessions and records assignments
#[derive(Clone)]
pub struct TaskSelector {
    store: Arc<dyn StateStore>,
    source: Arc<dyn TaskSource>,
    config: SelectorConfig,
}

impl TaskSelector {
    pub fn new(
        store: Arc<dyn StateStore>,
        source: Arc<dyn TaskSource>,
        config: SelectorConfig,
    ) -> Self {
        Self { store, source, config }
    }

    /// Next task for a session, or `None` when the session is unknown or the
    /// catalog has nothing matching
    pub async fn select_next(
        &self,
        session_id: &str,
        publisher_id: &str,
        language: Option<&str>,
        category: Option<&str>,
    ) -> Result<Option<TaskView>> {
        // No session, no task
        let Some(profile_json) = self
            .store
            .get(&keys::profile(publisher_id, session_id))
            .await?
        else {
            return Ok(None);
        };
        let profile: UserProfile = serde_json::from_str(&profile_json)?;

        let language = language.unwrap_or(&profile.language);
        let complexity_cap = profile
            .max_complexity
            .min(self.config.platform_max_complexity);

        let inject_golden = profile.expertise_level == crate::session::ExpertiseLevel::Beginner
            && self.tasks_completed(session_id).await? == 0;

        let picked = if inject_golden {
            match self
                .source
                .find_golden_task(language, category, complexity_cap)
                .await?
            {
                Some(task) => Some(task),
                // No calibration task for these filters: serve a regular one
                // now; the rule re-applies next request since the counter
                // has not advanced
                None => self.source.find_task(language, category, complexity_cap).await?,
            }
        } else {
            self.source.find_task(language, category, complexity_cap).await?
        };

        let Some(task) = picked else {
            debug!(
                session = session_id,
                language, complexity_cap, "No catalog task matches"
            );
            return Ok(None);
        };

        let task_id = Uuid::new_v4();
        let golden_set = inject_golden && task.golden_answer.is_some();
        let method = match (&task.golden_answer, golden_set) {
            (Some(expected), true) => ValidationMethod::GoldenSet {
                expected: expected.clone(),
            },
            _ => ValidationMethod::Consensus,
        };

        // Lease first so no concurrent request can hand out the same
        // instance, then the assignment the validator will read
        self.store
            .set(
                &keys::lease(&task_id.to_string()),
                session_id.to_string(),
                self.config.lease_ttl,
            )
            .await?;

        let assignment = TaskAssignment {
            task_id,
            task_type: task.task_type.clone(),
            method,
            publisher_id: publisher_id.to_string(),
            session_id: session_id.to_string(),
            complexity_level: task.complexity_level,
            created_at: Utc::now(),
        };
        self.store
            .set(
                &keys::assignment(&task_id.to_string()),
                serde_json::to_string(&assignment)?,
                self.config.assignment_ttl,
            )
            .await?;

        info!(
            session = session_id,
            task = %task_id,
            task_type = %task.task_type,
            golden_set,
            complexity = task.complexity_level,
            "Task assigned"
        );

        Ok(Some(TaskView {
            task_id,
            task_type: task.task_type,
            content: task.content,
            options: task.options,
            time_estimate_seconds: task.time_estimate_seconds,
            complexity_level: task.complexity_level,
            golden_set,
            expires_at: Utc::now() + ChronoDuration::seconds(self.config.lease_ttl.as_secs() as i64),
        }))
    }

    /// Batch selection for publishers: same filter resolution, no golden-set
    /// injection and no per-task leases, one expiring batch record
    pub async fn select_batch(
        &self,
        publisher_id: &str,
        count: usize,
        filters: TaskFilters,
    ) -> Result<BatchView> {
        let count = count.clamp(1, 100);
        let found = self.source.find_tasks(count, &filters).await?;

        let tasks: Vec<TaskSummary> = found
            .into_iter()
            .map(|task| TaskSummary {
                task_id: Uuid::new_v4(),
                task_type: task.task_type,
                content: task.content,
                options: task.options,
                complexity_level: task.complexity_level,
            })
            .collect();

        let now = Utc::now();
        let batch_id = format!("batch_{}", now.timestamp());
        let record = BatchRecord {
            batch_id: batch_id.clone(),
            publisher_id: publisher_id.to_string(),
            tasks: tasks.clone(),
            created_at: now,
        };
        self.store
            .set(
                &keys::batch(&batch_id),
                serde_json::to_string(&record)?,
                self.config.batch_ttl,
            )
            .await?;

        debug!(publisher = publisher_id, count = tasks.len(), batch = %batch_id, "Batch selected");

        Ok(BatchView {
            batch_id,
            tasks,
            expires_at: now + ChronoDuration::seconds(self.config.batch_ttl.as_secs() as i64),
        })
    }

    async fn tasks_completed(&self, session_id: &str) -> Result<u64> {
        Ok(self
            .store
            .get(&keys::tasks_completed(session_id))
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }
}
