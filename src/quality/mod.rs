//! Quality validation
//!
//! Scores a submitted label against the task assignment it answers. Golden
//! set tasks compare against the known answer; everything else falls back to
//! behavioral heuristics on response timing. Quality issues are warnings,
//! not errors: they lower the score and are recorded for audit, the
//! submission itself still succeeds.
//!
//! True cross-labeler consensus is a designed extension point; an external
//! aggregation step may revise scores later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::selector::TaskAssignment;
use crate::store::{keys, StateStore};
use crate::types::Result;

/// Issue tags recorded on validation results
pub mod issues {
    pub const TASK_NOT_FOUND: &str = "task_not_found";
    pub const INCORRECT_GOLDEN_SET_ANSWER: &str = "incorrect_golden_set_answer";
    pub const SUSPICIOUSLY_FAST_RESPONSE: &str = "suspiciously_fast_response";
    pub const SLOW_RESPONSE: &str = "slow_response";
}

/// How a submission will be scored, fixed at assignment time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ValidationMethod {
    /// Calibration task with a known correct answer
    GoldenSet { expected: Value },
    /// No ground truth; score from behavioral signals
    Consensus,
}

/// Method tag on a validation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodTag {
    GoldenSet,
    Consensus,
    /// Assignment missing or expired; nothing to score against
    Unknown,
}

/// Scoring confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Outcome of scoring one submission
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub validation_id: String,
    pub quality_score: f64,
    pub validation_method: MethodTag,
    pub issues_detected: Vec<String>,
    pub confidence: Confidence,
    pub feedback: String,
}

impl ValidationResult {
    /// Whether the assignment behind this submission was found at all
    pub fn task_found(&self) -> bool {
        self.validation_method != MethodTag::Unknown
    }
}

/// Audit record persisted per validation
#[derive(Debug, Serialize, Deserialize)]
struct ValidationRecord {
    validation_id: String,
    task_id: String,
    session_id: String,
    publisher_id: String,
    response: Value,
    time_spent_ms: u64,
    quality_score: f64,
    validation_method: MethodTag,
    issues_detected: Vec<String>,
    validated_at: DateTime<Utc>,
}

/// Scores submissions against their assignments
#[derive(Clone)]
pub struct QualityValidator {
    store: Arc<dyn StateStore>,
    audit_ttl: Duration,
}

impl QualityValidator {
    pub fn new(store: Arc<dyn StateStore>, audit_ttl: Duration) -> Self {
        Self { store, audit_ttl }
    }

    /// Score a submission. Reads the assignment exactly once; an absent or
    /// expired assignment yields the lowest-confidence result and writes no
    /// audit record.
    pub async fn validate(
        &self,
        task_id: &str,
        session_id: &str,
        publisher_id: &str,
        response: &Value,
        time_spent_ms: u64,
    ) -> Result<ValidationResult> {
        let validation_id = format!("val_{}", &Uuid::new_v4().simple().to_string()[..10]);

        let Some(json) = self.store.get(&keys::assignment(task_id)).await? else {
            return Ok(ValidationResult {
                validation_id,
                quality_score: 0.2,
                validation_method: MethodTag::Unknown,
                issues_detected: vec![issues::TASK_NOT_FOUND.to_string()],
                confidence: Confidence::Low,
                feedback: "Task not found or expired".to_string(),
            });
        };
        let assignment: TaskAssignment = serde_json::from_str(&json)?;

        let mut issues_detected = Vec::new();
        let mut feedback = String::new();

        let (quality_score, method, confidence) = match &assignment.method {
            ValidationMethod::GoldenSet { expected } => {
                let score = if response == expected {
                    feedback = "Correct response matches expected answer".to_string();
                    1.0
                } else {
                    issues_detected.push(issues::INCORRECT_GOLDEN_SET_ANSWER.to_string());
                    feedback = "Response does not match expected answer".to_string();
                    0.3
                };
                (score, MethodTag::GoldenSet, Confidence::High)
            }
            ValidationMethod::Consensus => {
                let mut score: f64 = 0.8;
                if time_spent_ms < 500 {
                    score *= 0.5;
                    issues_detected.push(issues::SUSPICIOUSLY_FAST_RESPONSE.to_string());
                    feedback = "Response time was suspiciously fast".to_string();
                } else if time_spent_ms > 30_000 {
                    score *= 0.9;
                    issues_detected.push(issues::SLOW_RESPONSE.to_string());
                    feedback = "Response time was slower than expected".to_string();
                }
                (score, MethodTag::Consensus, Confidence::Medium)
            }
        };

        let record = ValidationRecord {
            validation_id: validation_id.clone(),
            task_id: task_id.to_string(),
            session_id: session_id.to_string(),
            publisher_id: publisher_id.to_string(),
            response: response.clone(),
            time_spent_ms,
            quality_score,
            validation_method: method,
            issues_detected: issues_detected.clone(),
            validated_at: Utc::now(),
        };
        self.store
            .set(
                &keys::validation(&validation_id),
                serde_json::to_string(&record)?,
                self.audit_ttl,
            )
            .await?;

        debug!(
            task = task_id,
            session = session_id,
            method = ?method,
            score = quality_score,
            "Submission validated"
        );

        Ok(ValidationResult {
            validation_id,
            quality_score,
            validation_method: method,
            issues_detected,
            confidence,
            feedback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    const DAY: Duration = Duration::from_secs(86400);

    async fn validate_against(
        method: ValidationMethod,
        response: Value,
        time_spent_ms: u64,
    ) -> ValidationResult {
        let store = Arc::new(MemoryStore::new());
        let task_id = Uuid::new_v4().to_string();
        let assignment = TaskAssignment {
            task_id: task_id.parse().unwrap(),
            task_type: "vqa".to_string(),
            method,
            publisher_id: "pub-1".to_string(),
            session_id: "sess_a".to_string(),
            complexity_level: 1,
            created_at: Utc::now(),
        };
        store
            .set(
                &keys::assignment(&task_id),
                serde_json::to_string(&assignment).unwrap(),
                DAY,
            )
            .await
            .unwrap();

        let validator = QualityValidator::new(store, DAY);
        validator
            .validate(&task_id, "sess_a", "pub-1", &response, time_spent_ms)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_golden_match_scores_full() {
        let result = validate_against(
            ValidationMethod::GoldenSet { expected: json!("Blue") },
            json!("Blue"),
            5000,
        )
        .await;
        assert_eq!(result.quality_score, 1.0);
        assert_eq!(result.validation_method, MethodTag::GoldenSet);
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.issues_detected.is_empty());
    }

    #[tokio::test]
    async fn test_golden_mismatch_scores_low_with_issue() {
        let result = validate_against(
            ValidationMethod::GoldenSet { expected: json!("Blue") },
            json!("Red"),
            5000,
        )
        .await;
        assert_eq!(result.quality_score, 0.3);
        assert_eq!(
            result.issues_detected,
            vec![issues::INCORRECT_GOLDEN_SET_ANSWER]
        );
        assert_eq!(result.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_consensus_baseline() {
        let result = validate_against(ValidationMethod::Consensus, json!("Two"), 5000).await;
        assert_eq!(result.quality_score, 0.8);
        assert_eq!(result.confidence, Confidence::Medium);
        assert!(result.issues_detected.is_empty());
    }

    #[tokio::test]
    async fn test_consensus_fast_response_penalty() {
        let result = validate_against(ValidationMethod::Consensus, json!("Two"), 400).await;
        // 0.8 * 0.5
        assert!((result.quality_score - 0.4).abs() < 1e-9);
        assert_eq!(
            result.issues_detected,
            vec![issues::SUSPICIOUSLY_FAST_RESPONSE]
        );
    }

    #[tokio::test]
    async fn test_consensus_slow_response_penalty() {
        let result = validate_against(ValidationMethod::Consensus, json!("Two"), 40_000).await;
        // 0.8 * 0.9
        assert!((result.quality_score - 0.72).abs() < 1e-9);
        assert_eq!(result.issues_detected, vec![issues::SLOW_RESPONSE]);
    }

    #[tokio::test]
    async fn test_missing_assignment_lowest_confidence() {
        let validator = QualityValidator::new(Arc::new(MemoryStore::new()), DAY);
        let result = validator
            .validate("not-a-task", "sess_a", "pub-1", &json!("Blue"), 5000)
            .await
            .unwrap();
        assert_eq!(result.quality_score, 0.2);
        assert_eq!(result.validation_method, MethodTag::Unknown);
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.issues_detected, vec![issues::TASK_NOT_FOUND]);
        assert!(!result.task_found());
    }

    #[tokio::test]
    async fn test_audit_record_persisted_for_scored_submissions() {
        let store = Arc::new(MemoryStore::new());
        let task_id = Uuid::new_v4().to_string();
        let assignment = TaskAssignment {
            task_id: task_id.parse().unwrap(),
            task_type: "vqa".to_string(),
            method: ValidationMethod::Consensus,
            publisher_id: "pub-1".to_string(),
            session_id: "sess_a".to_string(),
            complexity_level: 1,
            created_at: Utc::now(),
        };
        store
            .set(
                &keys::assignment(&task_id),
                serde_json::to_string(&assignment).unwrap(),
                DAY,
            )
            .await
            .unwrap();

        let validator = QualityValidator::new(Arc::clone(&store) as Arc<dyn StateStore>, DAY);
        let result = validator
            .validate(&task_id, "sess_a", "pub-1", &json!("Two"), 5000)
            .await
            .unwrap();

        let audit = store
            .get(&keys::validation(&result.validation_id))
            .await
            .unwrap();
        assert!(audit.is_some(), "scored submissions leave an audit record");
    }

    #[tokio::test]
    async fn test_missing_assignment_leaves_no_audit_record() {
        let store = Arc::new(MemoryStore::new());
        let validator = QualityValidator::new(Arc::clone(&store) as Arc<dyn StateStore>, DAY);
        let result = validator
            .validate("not-a-task", "sess_a", "pub-1", &json!("Blue"), 5000)
            .await
            .unwrap();

        let audit = store
            .get(&keys::validation(&result.validation_id))
            .await
            .unwrap();
        assert!(audit.is_none());
    }
}
