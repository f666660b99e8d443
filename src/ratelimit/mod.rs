//! Sliding-window rate limiter
//!
//! Counts requests per (caller, path) key in a trailing window backed by the
//! shared store's atomic `window_add` operation. Every request is counted,
//! including rejected ones, so hammering a closed door keeps it closed.
//!
//! If the store is unreachable the limiter fails OPEN and allows the
//! request: availability is prioritized over strict enforcement.

pub mod rules;

pub use rules::{PathClass, Quota, RateRule, RuleTable};

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::store::{keys, StateStore};

/// Outcome of a rate limit check, surfaced as X-RateLimit-* headers
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the window is expected to reset. For windows longer
    /// than a minute this is `window - (now mod window)`; shorter windows
    /// report the window length verbatim. An accepted approximation, not a
    /// true time-to-next-slot.
    pub reset_seconds: u64,
    pub window_seconds: u64,
}

/// Sliding-window rate limiter over the shared store
pub struct RateLimiter {
    store: Arc<dyn StateStore>,
    table: RuleTable,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn StateStore>, table: RuleTable) -> Self {
        Self { store, table }
    }

    /// Rule table snapshot for the status endpoint
    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Check the caller's quota for `path`, counting this request
    pub async fn check(&self, caller_id: &str, path: &str) -> RateDecision {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.check_at(caller_id, path, now).await
    }

    /// Check with an explicit clock, one atomic store round trip
    pub async fn check_at(&self, caller_id: &str, path: &str, now: u64) -> RateDecision {
        let (class, quota) = self.table.resolve(path);
        // Windows are keyed by class, so every task submit shares one
        // window regardless of the task id in the path
        let key = keys::rate_window(caller_id, class.as_str());

        match self
            .store
            .window_add(&key, now, quota.window_secs)
            .await
        {
            Ok(count_before) => {
                let allowed = count_before < u64::from(quota.limit);
                let remaining = u64::from(quota.limit)
                    .saturating_sub(count_before)
                    .saturating_sub(1) as u32;

                if !allowed {
                    debug!(
                        caller = caller_id,
                        path,
                        class = ?class,
                        count = count_before,
                        limit = quota.limit,
                        "Rate limit exceeded"
                    );
                }

                RateDecision {
                    allowed,
                    limit: quota.limit,
                    remaining,
                    reset_seconds: reset_estimate(now, quota.window_secs),
                    window_seconds: quota.window_secs,
                }
            }
            Err(e) => {
                // Fail open: a broken store must not block traffic
                warn!(caller = caller_id, path, error = %e, "Rate limit store error, failing open");
                RateDecision {
                    allowed: true,
                    limit: quota.limit,
                    remaining: quota.limit,
                    reset_seconds: quota.window_secs,
                    window_seconds: quota.window_secs,
                }
            }
        }
    }
}

/// Policy-chosen reset estimate; see [`RateDecision::reset_seconds`]
fn reset_estimate(now: u64, window_secs: u64) -> u64 {
    if window_secs > 60 {
        window_secs - (now % window_secs)
    } else {
        window_secs
    }
}
