//! Configuration for Labelgate
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

use crate::ratelimit::Quota;

/// Labelgate - task-serving gateway for crowdsourced micro-task labeling
#[derive(Parser, Debug, Clone)]
#[command(name = "labelgate")]
#[command(about = "Task-serving gateway for crowdsourced micro-task labeling")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Rate limit configuration
    #[command(flatten)]
    pub rate: RateLimitArgs,

    /// Hard complexity ceiling applied on top of per-profile caps
    #[arg(long, env = "PLATFORM_MAX_COMPLEXITY", default_value = "3")]
    pub platform_max_complexity: u8,

    /// Task assignment lifetime in seconds (submissions after expiry are
    /// treated as "task not found")
    #[arg(long, env = "ASSIGNMENT_TTL_SECONDS", default_value = "3600")]
    pub assignment_ttl_seconds: u64,

    /// Assignment lease lifetime in seconds. Shorter than the assignment so
    /// an abandoned task frees up for reassignment while late submissions
    /// still validate.
    #[arg(long, env = "LEASE_TTL_SECONDS", default_value = "300")]
    pub lease_ttl_seconds: u64,

    /// Batch record lifetime in seconds
    #[arg(long, env = "BATCH_TTL_SECONDS", default_value = "1800")]
    pub batch_ttl_seconds: u64,

    /// Session and profile lifetime in seconds
    #[arg(long, env = "SESSION_TTL_SECONDS", default_value = "86400")]
    pub session_ttl_seconds: u64,

    /// Validation and submission audit record lifetime in seconds
    #[arg(long, env = "AUDIT_TTL_SECONDS", default_value = "86400")]
    pub audit_ttl_seconds: u64,

    /// Interval between expired-entry sweeps of the state store
    #[arg(long, env = "STORE_SWEEP_INTERVAL_SECONDS", default_value = "60")]
    pub store_sweep_interval_seconds: u64,
}

/// Rate limit quotas, each as a "N/period" string with
/// period one of second, minute, hour, day
#[derive(Parser, Debug, Clone)]
pub struct RateLimitArgs {
    /// Quota for task fetch and submit endpoints
    #[arg(long, env = "RATE_LIMIT_TASKS", default_value = "30/minute")]
    pub tasks: String,

    /// Quota for batch task fetches
    #[arg(long, env = "RATE_LIMIT_TASKS_BATCH", default_value = "10/minute")]
    pub tasks_batch: String,

    /// Quota for session initialization
    #[arg(long, env = "RATE_LIMIT_USERS_SESSIONS", default_value = "10/minute")]
    pub users_sessions: String,

    /// Quota for everything else
    #[arg(long, env = "RATE_LIMIT_DEFAULT", default_value = "60/minute")]
    pub rate_default: String,
}

impl Args {
    pub fn assignment_ttl(&self) -> Duration {
        Duration::from_secs(self.assignment_ttl_seconds)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_seconds)
    }

    pub fn batch_ttl(&self) -> Duration {
        Duration::from_secs(self.batch_ttl_seconds)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    pub fn audit_ttl(&self) -> Duration {
        Duration::from_secs(self.audit_ttl_seconds)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("RATE_LIMIT_TASKS", &self.rate.tasks),
            ("RATE_LIMIT_TASKS_BATCH", &self.rate.tasks_batch),
            ("RATE_LIMIT_USERS_SESSIONS", &self.rate.users_sessions),
            ("RATE_LIMIT_DEFAULT", &self.rate.rate_default),
        ] {
            Quota::parse(value).map_err(|e| format!("{name}: {e}"))?;
        }

        if self.platform_max_complexity == 0 || self.platform_max_complexity > 5 {
            return Err("PLATFORM_MAX_COMPLEXITY must be between 1 and 5".to_string());
        }

        if self.lease_ttl_seconds > self.assignment_ttl_seconds {
            return Err(
                "LEASE_TTL_SECONDS must not exceed ASSIGNMENT_TTL_SECONDS".to_string(),
            );
        }

        for (name, value) in [
            ("ASSIGNMENT_TTL_SECONDS", self.assignment_ttl_seconds),
            ("LEASE_TTL_SECONDS", self.lease_ttl_seconds),
            ("BATCH_TTL_SECONDS", self.batch_ttl_seconds),
            ("SESSION_TTL_SECONDS", self.session_ttl_seconds),
            ("AUDIT_TTL_SECONDS", self.audit_ttl_seconds),
            (
                "STORE_SWEEP_INTERVAL_SECONDS",
                self.store_sweep_interval_seconds,
            ),
        ] {
            if value == 0 {
                return Err(format!("{name} must be greater than zero"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args::parse_from(["labelgate"])
    }

    #[test]
    fn test_defaults_validate() {
        assert!(args().validate().is_ok());
    }

    #[test]
    fn test_lease_longer_than_assignment_rejected() {
        let mut a = args();
        a.lease_ttl_seconds = 7200;
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_bad_quota_rejected() {
        let mut a = args();
        a.rate.tasks = "lots/minute".to_string();
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_complexity_ceiling_bounds() {
        let mut a = args();
        a.platform_max_complexity = 0;
        assert!(a.validate().is_err());
        a.platform_max_complexity = 6;
        assert!(a.validate().is_err());
        a.platform_max_complexity = 5;
        assert!(a.validate().is_ok());
    }
}
