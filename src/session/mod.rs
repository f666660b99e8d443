//! Session and profile service
//!
//! A session is a short-lived anonymous labeling identity: a profile with
//! language, expertise level and task preferences, plus a completion
//! counter. Profiles personalize task selection; the counter drives the
//! golden-set calibration rule. Everything here expires with the session
//! (24h TTL by default), there is no durable user record.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{keys, StateStore};
use crate::types::Result;

/// Labeler expertise level, upgraded from performance over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpertiseLevel {
    Beginner,
    Intermediate,
    Expert,
}

impl ExpertiseLevel {
    /// Fixed complexity ceiling per level
    pub fn max_complexity(self) -> u8 {
        match self {
            ExpertiseLevel::Beginner => 2,
            ExpertiseLevel::Intermediate => 3,
            ExpertiseLevel::Expert => 5,
        }
    }
}

/// Per-session labeler profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub language: String,
    pub expertise_level: ExpertiseLevel,
    pub task_preferences: Vec<String>,
    /// Derived from expertise_level via the fixed map; stored so readers
    /// never recompute it
    pub max_complexity: u8,
    #[serde(default)]
    pub expertise_areas: Vec<String>,
    #[serde(default)]
    pub preferred_languages: Vec<String>,
}

/// Client context reported by the embedding widget at session init
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub screen_resolution: String,
    pub language: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub referring_url: Option<String>,
    /// desktop, mobile, tablet
    #[serde(default)]
    pub device_type: Option<String>,
}

/// User consent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentSettings {
    #[serde(default = "default_true")]
    pub functional: bool,
    #[serde(default = "default_true")]
    pub analytics: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionInitRequest {
    pub publisher_id: String,
    pub client_info: ClientInfo,
    pub consent: ConsentSettings,
}

/// Widget pacing configuration returned at init
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    pub task_interval_seconds: u32,
    pub minimum_view_time_seconds: u32,
    pub ui_theme: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            task_interval_seconds: 300,
            minimum_view_time_seconds: 3,
            ui_theme: "light".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInitResponse {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub profile: UserProfile,
    pub config: SessionConfig,
}

/// Rolling performance metrics supplied by the profile updater
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceMetrics {
    pub accuracy: f64,
    pub average_time_ms: u64,
    pub task_completions: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileUpdateRequest {
    pub publisher_id: String,
    #[serde(default)]
    pub expertise_areas: Option<Vec<String>>,
    #[serde(default)]
    pub task_preferences: Option<Vec<String>>,
    /// Language -> proficiency ("native", "fluent", "intermediate", "beginner")
    #[serde(default)]
    pub language_proficiency: Option<HashMap<String, String>>,
    #[serde(default)]
    pub performance_metrics: Option<PerformanceMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatedProfile {
    pub expertise_level: ExpertiseLevel,
    pub preferred_languages: Vec<String>,
    pub expertise_areas: Vec<String>,
    pub max_complexity: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdateResponse {
    pub success: bool,
    pub updated_profile: UpdatedProfile,
}

/// Stored session record, audit only
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    session_id: String,
    publisher_id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    client_info: ClientInfo,
    consent: ConsentSettings,
}

/// Session lifecycle over the shared store
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn StateStore>,
    session_ttl: Duration,
}

impl SessionService {
    pub fn new(store: Arc<dyn StateStore>, session_ttl: Duration) -> Self {
        Self { store, session_ttl }
    }

    /// Initialize a session: mint an id, derive the starting profile from
    /// client info, zero the completion counter. All records share the
    /// session TTL.
    pub async fn init_session(&self, req: SessionInitRequest) -> Result<SessionInitResponse> {
        let session_id = format!("sess_{}", &Uuid::new_v4().simple().to_string()[..12]);
        let now = Utc::now();
        let expires_at = now + ChronoDuration::seconds(self.session_ttl.as_secs() as i64);

        let profile = starting_profile(&req.client_info);

        let record = SessionRecord {
            session_id: session_id.clone(),
            publisher_id: req.publisher_id.clone(),
            created_at: now,
            expires_at,
            client_info: req.client_info,
            consent: req.consent,
        };

        self.store
            .set(
                &keys::session(&req.publisher_id, &session_id),
                serde_json::to_string(&record)?,
                self.session_ttl,
            )
            .await?;
        self.store
            .set(
                &keys::profile(&req.publisher_id, &session_id),
                serde_json::to_string(&profile)?,
                self.session_ttl,
            )
            .await?;
        self.store
            .set(
                &keys::tasks_completed(&session_id),
                "0".to_string(),
                self.session_ttl,
            )
            .await?;

        info!(
            session = %session_id,
            publisher = %req.publisher_id,
            language = %profile.language,
            "Session initialized"
        );

        Ok(SessionInitResponse {
            session_id,
            expires_at,
            profile,
            config: SessionConfig::default(),
        })
    }

    /// Load the profile for a session, `None` if absent or expired
    pub async fn profile(
        &self,
        publisher_id: &str,
        session_id: &str,
    ) -> Result<Option<UserProfile>> {
        match self
            .store
            .get(&keys::profile(publisher_id, session_id))
            .await?
        {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Apply a profile update; `None` when the session is unknown
    pub async fn update_profile(
        &self,
        session_id: &str,
        update: ProfileUpdateRequest,
    ) -> Result<Option<ProfileUpdateResponse>> {
        let key = keys::profile(&update.publisher_id, session_id);
        let Some(json) = self.store.get(&key).await? else {
            return Ok(None);
        };
        let mut profile: UserProfile = serde_json::from_str(&json)?;

        // Expertise upgrades are earned, never revoked
        if let Some(metrics) = &update.performance_metrics {
            if metrics.accuracy >= 0.85 && metrics.task_completions >= 10 {
                profile.expertise_level = ExpertiseLevel::Intermediate;
            }
            if metrics.accuracy >= 0.9 && metrics.task_completions >= 50 {
                profile.expertise_level = ExpertiseLevel::Expert;
            }
        }
        profile.max_complexity = profile.expertise_level.max_complexity();

        if let Some(areas) = update.expertise_areas {
            profile.expertise_areas = areas;
        }
        if let Some(prefs) = update.task_preferences {
            profile.task_preferences = prefs;
        }
        profile.preferred_languages = match &update.language_proficiency {
            Some(proficiency) => rank_languages(proficiency),
            None => vec![profile.language.clone()],
        };

        self.store
            .set(&key, serde_json::to_string(&profile)?, self.session_ttl)
            .await?;

        debug!(
            session = session_id,
            level = ?profile.expertise_level,
            "Profile updated"
        );

        Ok(Some(ProfileUpdateResponse {
            success: true,
            updated_profile: UpdatedProfile {
                expertise_level: profile.expertise_level,
                preferred_languages: profile.preferred_languages.clone(),
                expertise_areas: profile.expertise_areas.clone(),
                max_complexity: profile.max_complexity,
            },
        }))
    }

    /// Completed-task count for a session (0 when the counter is absent)
    pub async fn tasks_completed(&self, session_id: &str) -> Result<u64> {
        let count = self
            .store
            .get(&keys::tasks_completed(session_id))
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        Ok(count)
    }
}

/// Starting profile derived from client info: primary language subtag,
/// beginner expertise, reduced preference set on mobile
fn starting_profile(client: &ClientInfo) -> UserProfile {
    let language = client
        .language
        .split('-')
        .next()
        .unwrap_or(&client.language)
        .to_string();

    let task_preferences = if client.device_type.as_deref() == Some("mobile") {
        vec!["vqa".to_string()]
    } else {
        vec!["vqa".to_string(), "text_classification".to_string()]
    };

    UserProfile {
        language,
        expertise_level: ExpertiseLevel::Beginner,
        task_preferences,
        max_complexity: ExpertiseLevel::Beginner.max_complexity(),
        expertise_areas: Vec::new(),
        preferred_languages: Vec::new(),
    }
}

/// Order languages by declared proficiency, strongest first
fn rank_languages(proficiency: &HashMap<String, String>) -> Vec<String> {
    fn weight(level: &str) -> i32 {
        match level {
            "native" => 3,
            "fluent" => 2,
            "intermediate" => 1,
            "beginner" => 0,
            _ => -1,
        }
    }

    let mut ranked: Vec<(&String, i32)> = proficiency
        .iter()
        .map(|(lang, level)| (lang, weight(level)))
        .collect();
    // Alphabetical tiebreak keeps the order deterministic
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().map(|(lang, _)| lang.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> SessionService {
        SessionService::new(Arc::new(MemoryStore::new()), Duration::from_secs(86400))
    }

    fn init_request(language: &str, device: Option<&str>) -> SessionInitRequest {
        SessionInitRequest {
            publisher_id: "pub-1".to_string(),
            client_info: ClientInfo {
                browser: "Firefox".to_string(),
                browser_version: "130".to_string(),
                os: "Linux".to_string(),
                screen_resolution: "1920x1080".to_string(),
                language: language.to_string(),
                timezone: None,
                referring_url: None,
                device_type: device.map(str::to_string),
            },
            consent: ConsentSettings {
                functional: true,
                analytics: true,
            },
        }
    }

    #[tokio::test]
    async fn test_init_derives_primary_language_subtag() {
        let svc = service();
        let resp = svc.init_session(init_request("en-US", None)).await.unwrap();
        assert_eq!(resp.profile.language, "en");
        assert!(resp.session_id.starts_with("sess_"));
    }

    #[tokio::test]
    async fn test_init_starts_beginner_with_cap_two() {
        let svc = service();
        let resp = svc.init_session(init_request("fr", None)).await.unwrap();
        assert_eq!(resp.profile.expertise_level, ExpertiseLevel::Beginner);
        assert_eq!(resp.profile.max_complexity, 2);
        assert_eq!(svc.tasks_completed(&resp.session_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mobile_gets_reduced_preferences() {
        let svc = service();
        let mobile = svc
            .init_session(init_request("en", Some("mobile")))
            .await
            .unwrap();
        assert_eq!(mobile.profile.task_preferences, vec!["vqa"]);

        let desktop = svc
            .init_session(init_request("en", Some("desktop")))
            .await
            .unwrap();
        assert_eq!(
            desktop.profile.task_preferences,
            vec!["vqa", "text_classification"]
        );
    }

    #[tokio::test]
    async fn test_profile_roundtrip() {
        let svc = service();
        let resp = svc.init_session(init_request("en", None)).await.unwrap();
        let profile = svc
            .profile("pub-1", &resp.session_id)
            .await
            .unwrap()
            .expect("profile should exist");
        assert_eq!(profile.language, "en");

        assert!(svc.profile("pub-1", "sess_missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_upgrades_expertise_from_metrics() {
        let svc = service();
        let resp = svc.init_session(init_request("en", None)).await.unwrap();

        let update = ProfileUpdateRequest {
            publisher_id: "pub-1".to_string(),
            expertise_areas: None,
            task_preferences: None,
            language_proficiency: None,
            performance_metrics: Some(PerformanceMetrics {
                accuracy: 0.87,
                average_time_ms: 4000,
                task_completions: 12,
            }),
        };
        let out = svc
            .update_profile(&resp.session_id, update)
            .await
            .unwrap()
            .expect("session exists");
        assert_eq!(out.updated_profile.expertise_level, ExpertiseLevel::Intermediate);
        assert_eq!(out.updated_profile.max_complexity, 3);
    }

    #[tokio::test]
    async fn test_update_expert_threshold() {
        let svc = service();
        let resp = svc.init_session(init_request("en", None)).await.unwrap();

        let update = ProfileUpdateRequest {
            publisher_id: "pub-1".to_string(),
            expertise_areas: None,
            task_preferences: None,
            language_proficiency: None,
            performance_metrics: Some(PerformanceMetrics {
                accuracy: 0.95,
                average_time_ms: 3000,
                task_completions: 60,
            }),
        };
        let out = svc
            .update_profile(&resp.session_id, update)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.updated_profile.expertise_level, ExpertiseLevel::Expert);
        assert_eq!(out.updated_profile.max_complexity, 5);
    }

    #[tokio::test]
    async fn test_update_unknown_session_is_none() {
        let svc = service();
        let update = ProfileUpdateRequest {
            publisher_id: "pub-1".to_string(),
            expertise_areas: None,
            task_preferences: None,
            language_proficiency: None,
            performance_metrics: None,
        };
        assert!(svc
            .update_profile("sess_missing", update)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_language_ranking_by_proficiency() {
        let mut proficiency = HashMap::new();
        proficiency.insert("fr".to_string(), "fluent".to_string());
        proficiency.insert("en".to_string(), "native".to_string());
        proficiency.insert("de".to_string(), "beginner".to_string());
        assert_eq!(rank_languages(&proficiency), vec!["en", "fr", "de"]);
    }
}
