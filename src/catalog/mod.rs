//! Task catalog
//!
//! The catalog is the external task source: the gateway does not define how
//! tasks are authored or stored long-term, it only asks for "a task matching
//! these filters". [`TaskSource`] is the seam; [`StaticCatalog`] is a seeded
//! in-memory implementation used for serving and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::types::Result;

/// Content of a task, fields vary by task type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// A task template held by the catalog
///
/// `golden_answer` marks a calibration task with a known correct response;
/// it never leaves the catalog except inside a task assignment.
#[derive(Debug, Clone)]
pub struct CatalogTask {
    pub task_type: String,
    pub content: TaskContent,
    pub options: Vec<String>,
    pub language: String,
    pub category: String,
    pub complexity_level: u8,
    pub time_estimate_seconds: u32,
    pub golden_answer: Option<Value>,
}

/// Filters for batch selection
#[derive(Debug, Clone, Default)]
pub struct TaskFilters {
    pub language: Option<String>,
    pub category: Option<String>,
    pub complexity_max: Option<u8>,
}

/// Abstract catalog lookup
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// A task matching (language, category, complexity <= cap), or `None`
    async fn find_task(
        &self,
        language: &str,
        category: Option<&str>,
        complexity_max: u8,
    ) -> Result<Option<CatalogTask>>;

    /// A calibration task (known answer) under the same filters
    async fn find_golden_task(
        &self,
        language: &str,
        category: Option<&str>,
        complexity_max: u8,
    ) -> Result<Option<CatalogTask>>;

    /// Up to `count` tasks matching the filters
    async fn find_tasks(&self, count: usize, filters: &TaskFilters) -> Result<Vec<CatalogTask>>;
}

/// Seeded in-memory catalog
///
/// Selection rotates through matching templates so repeat callers do not
/// always see the same task first.
pub struct StaticCatalog {
    tasks: Vec<CatalogTask>,
    cursor: AtomicUsize,
}

impl StaticCatalog {
    pub fn new(tasks: Vec<CatalogTask>) -> Self {
        Self {
            tasks,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Catalog seeded with sample VQA and classification templates
    pub fn with_samples() -> Self {
        Self::new(sample_tasks())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn matches(
        task: &CatalogTask,
        language: &str,
        category: Option<&str>,
        complexity_max: u8,
    ) -> bool {
        task.language == language
            && task.complexity_level <= complexity_max
            && category.map_or(true, |c| task.category == c)
    }

    fn rotated_find(&self, pred: impl Fn(&CatalogTask) -> bool) -> Option<CatalogTask> {
        if self.tasks.is_empty() {
            return None;
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % self.tasks.len();
        (0..self.tasks.len())
            .map(|i| &self.tasks[(start + i) % self.tasks.len()])
            .find(|t| pred(t))
            .cloned()
    }
}

#[async_trait]
impl TaskSource for StaticCatalog {
    async fn find_task(
        &self,
        language: &str,
        category: Option<&str>,
        complexity_max: u8,
    ) -> Result<Option<CatalogTask>> {
        Ok(self.rotated_find(|t| Self::matches(t, language, category, complexity_max)))
    }

    async fn find_golden_task(
        &self,
        language: &str,
        category: Option<&str>,
        complexity_max: u8,
    ) -> Result<Option<CatalogTask>> {
        Ok(self.rotated_find(|t| {
            t.golden_answer.is_some() && Self::matches(t, language, category, complexity_max)
        }))
    }

    async fn find_tasks(&self, count: usize, filters: &TaskFilters) -> Result<Vec<CatalogTask>> {
        let out: Vec<CatalogTask> = self
            .tasks
            .iter()
            .filter(|t| {
                filters.language.as_deref().map_or(true, |l| t.language == l)
                    && filters.category.as_deref().map_or(true, |c| t.category == c)
                    && filters.complexity_max.map_or(true, |m| t.complexity_level <= m)
            })
            .take(count)
            .cloned()
            .collect();
        Ok(out)
    }
}

/// Sample task templates across languages, categories and complexity levels
fn sample_tasks() -> Vec<CatalogTask> {
    vec![
        CatalogTask {
            task_type: "vqa".to_string(),
            content: TaskContent {
                image_url: Some("https://assets.labelgate.dev/samples/street-01.jpg".to_string()),
                question: Some("What color is the car in this image?".to_string()),
                ..TaskContent::default()
            },
            options: vec![
                "Red".to_string(),
                "Blue".to_string(),
                "Green".to_string(),
                "Yellow".to_string(),
            ],
            language: "en".to_string(),
            category: "general".to_string(),
            complexity_level: 1,
            time_estimate_seconds: 5,
            golden_answer: Some(json!("Blue")),
        },
        CatalogTask {
            task_type: "vqa".to_string(),
            content: TaskContent {
                image_url: Some("https://assets.labelgate.dev/samples/kitchen-04.jpg".to_string()),
                question: Some("How many mugs are on the table?".to_string()),
                ..TaskContent::default()
            },
            options: vec![
                "One".to_string(),
                "Two".to_string(),
                "Three".to_string(),
                "Four".to_string(),
            ],
            language: "en".to_string(),
            category: "general".to_string(),
            complexity_level: 2,
            time_estimate_seconds: 8,
            golden_answer: None,
        },
        CatalogTask {
            task_type: "text_classification".to_string(),
            content: TaskContent {
                text: Some("The package arrived two days late and the box was crushed.".to_string()),
                question: Some("What is the sentiment of this review?".to_string()),
                ..TaskContent::default()
            },
            options: vec![
                "Positive".to_string(),
                "Neutral".to_string(),
                "Negative".to_string(),
            ],
            language: "en".to_string(),
            category: "ecommerce".to_string(),
            complexity_level: 1,
            time_estimate_seconds: 6,
            golden_answer: Some(json!("Negative")),
        },
        CatalogTask {
            task_type: "text_classification".to_string(),
            content: TaskContent {
                text: Some(
                    "Central banks held rates steady while signaling cuts later this year."
                        .to_string(),
                ),
                question: Some("Which topic best describes this headline?".to_string()),
                ..TaskContent::default()
            },
            options: vec![
                "Finance".to_string(),
                "Sports".to_string(),
                "Technology".to_string(),
                "Health".to_string(),
            ],
            language: "en".to_string(),
            category: "news".to_string(),
            complexity_level: 3,
            time_estimate_seconds: 10,
            golden_answer: None,
        },
        CatalogTask {
            task_type: "vqa".to_string(),
            content: TaskContent {
                image_url: Some("https://assets.labelgate.dev/samples/parc-09.jpg".to_string()),
                question: Some("Quel animal voyez-vous sur cette image ?".to_string()),
                ..TaskContent::default()
            },
            options: vec![
                "Chien".to_string(),
                "Chat".to_string(),
                "Oiseau".to_string(),
            ],
            language: "fr".to_string(),
            category: "general".to_string(),
            complexity_level: 1,
            time_estimate_seconds: 5,
            golden_answer: Some(json!("Chien")),
        },
        CatalogTask {
            task_type: "text_classification".to_string(),
            content: TaskContent {
                text: Some("El envío llegó antes de lo previsto, todo perfecto.".to_string()),
                question: Some("¿Cuál es el sentimiento de esta reseña?".to_string()),
                ..TaskContent::default()
            },
            options: vec![
                "Positivo".to_string(),
                "Neutral".to_string(),
                "Negativo".to_string(),
            ],
            language: "es".to_string(),
            category: "ecommerce".to_string(),
            complexity_level: 2,
            time_estimate_seconds: 6,
            golden_answer: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_respects_complexity_cap() {
        let catalog = StaticCatalog::with_samples();
        for _ in 0..catalog.len() {
            let task = catalog
                .find_task("en", None, 2)
                .await
                .unwrap()
                .expect("samples include en tasks under cap 2");
            assert!(task.complexity_level <= 2);
        }
    }

    #[tokio::test]
    async fn test_find_golden_requires_known_answer() {
        let catalog = StaticCatalog::with_samples();
        let task = catalog
            .find_golden_task("en", None, 2)
            .await
            .unwrap()
            .expect("samples include an en golden task");
        assert!(task.golden_answer.is_some());
    }

    #[tokio::test]
    async fn test_find_filters_by_category() {
        let catalog = StaticCatalog::with_samples();
        let task = catalog
            .find_task("en", Some("ecommerce"), 3)
            .await
            .unwrap()
            .expect("samples include an en ecommerce task");
        assert_eq!(task.category, "ecommerce");
    }

    #[tokio::test]
    async fn test_find_unmatched_language_is_none() {
        let catalog = StaticCatalog::with_samples();
        assert!(catalog.find_task("ja", None, 5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batch_respects_count_and_filters() {
        let catalog = StaticCatalog::with_samples();
        let filters = TaskFilters {
            language: Some("en".to_string()),
            category: None,
            complexity_max: Some(3),
        };
        let tasks = catalog.find_tasks(2, &filters).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.language == "en"));
    }

    #[tokio::test]
    async fn test_rotation_varies_selection() {
        let catalog = StaticCatalog::with_samples();
        let first = catalog.find_task("en", None, 3).await.unwrap().unwrap();
        let second = catalog.find_task("en", None, 3).await.unwrap().unwrap();
        // Rotation advances the starting point; with several en templates the
        // second pick differs from the first
        assert_ne!(
            first.content.question, second.content.question,
            "rotation should advance"
        );
    }
}
