//! Rate limit rule table
//!
//! Path classes are resolved by an ordered table of matchers evaluated
//! top-down, each mapped to a quota parsed from a "N/period" string. The
//! table is data-driven so operators can retune quotas from the environment
//! without code changes.

use serde::Serialize;

use crate::config::RateLimitArgs;

/// Endpoint class for rate limiting purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathClass {
    TaskFetch,
    TaskSubmit,
    BatchFetch,
    SessionInit,
    Default,
}

impl PathClass {
    /// Stable name used inside rate window keys
    pub fn as_str(self) -> &'static str {
        match self {
            PathClass::TaskFetch => "task_fetch",
            PathClass::TaskSubmit => "task_submit",
            PathClass::BatchFetch => "batch_fetch",
            PathClass::SessionInit => "session_init",
            PathClass::Default => "default",
        }
    }
}

/// A request quota: `limit` requests per `window_secs` sliding window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quota {
    pub limit: u32,
    pub window_secs: u64,
}

impl Quota {
    /// Parse a "N/period" quota string, period one of second, minute, hour;
    /// anything else falls back to daily.
    pub fn parse(s: &str) -> Result<Self, String> {
        let (limit, period) = s
            .split_once('/')
            .ok_or_else(|| format!("quota '{s}' is not of the form N/period"))?;

        let limit: u32 = limit
            .trim()
            .parse()
            .map_err(|_| format!("quota '{s}' has a non-numeric limit"))?;
        if limit == 0 {
            return Err(format!("quota '{s}' has a zero limit"));
        }

        let window_secs = match period.trim() {
            "second" => 1,
            "minute" => 60,
            "hour" => 3600,
            _ => 86400,
        };

        Ok(Self { limit, window_secs })
    }
}

/// Path matcher for one rule
#[derive(Debug, Clone)]
enum Matcher {
    Prefix(&'static str),
    PrefixSuffix(&'static str, &'static str),
}

impl Matcher {
    fn matches(&self, path: &str) -> bool {
        match self {
            Matcher::Prefix(prefix) => path.starts_with(prefix),
            Matcher::PrefixSuffix(prefix, suffix) => {
                path.starts_with(prefix)
                    && path.ends_with(suffix)
                    && path.len() > prefix.len() + suffix.len()
            }
        }
    }
}

/// One entry in the ordered rule table
#[derive(Debug, Clone)]
pub struct RateRule {
    pub class: PathClass,
    matcher: Matcher,
    pub quota: Quota,
}

/// Ordered rule table, evaluated top-down with a default fallback
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<RateRule>,
    default_quota: Quota,
}

impl RuleTable {
    /// Build the table from configured quota strings
    pub fn from_config(rate: &RateLimitArgs) -> Result<Self, String> {
        let tasks = Quota::parse(&rate.tasks)?;
        let batch = Quota::parse(&rate.tasks_batch)?;
        let sessions = Quota::parse(&rate.users_sessions)?;
        let default_quota = Quota::parse(&rate.rate_default)?;

        Ok(Self {
            rules: vec![
                RateRule {
                    class: PathClass::TaskFetch,
                    matcher: Matcher::Prefix("/v1/tasks/next"),
                    quota: tasks,
                },
                RateRule {
                    class: PathClass::TaskSubmit,
                    matcher: Matcher::PrefixSuffix("/v1/tasks/", "/submit"),
                    quota: tasks,
                },
                RateRule {
                    class: PathClass::BatchFetch,
                    matcher: Matcher::Prefix("/v1/tasks/batch"),
                    quota: batch,
                },
                RateRule {
                    class: PathClass::SessionInit,
                    matcher: Matcher::Prefix("/v1/users/sessions"),
                    quota: sessions,
                },
            ],
            default_quota,
        })
    }

    /// Resolve a request path to its class and quota
    pub fn resolve(&self, path: &str) -> (PathClass, Quota) {
        for rule in &self.rules {
            if rule.matcher.matches(path) {
                return (rule.class, rule.quota);
            }
        }
        (PathClass::Default, self.default_quota)
    }

    /// Snapshot of the table for the status endpoint
    pub fn describe(&self) -> Vec<(PathClass, Quota)> {
        let mut out: Vec<(PathClass, Quota)> =
            self.rules.iter().map(|r| (r.class, r.quota)).collect();
        out.push((PathClass::Default, self.default_quota));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RuleTable {
        RuleTable::from_config(&RateLimitArgs {
            tasks: "30/minute".to_string(),
            tasks_batch: "10/minute".to_string(),
            users_sessions: "5/minute".to_string(),
            rate_default: "100/hour".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_quota_parse_periods() {
        assert_eq!(
            Quota::parse("10/second").unwrap(),
            Quota { limit: 10, window_secs: 1 }
        );
        assert_eq!(
            Quota::parse("30/minute").unwrap(),
            Quota { limit: 30, window_secs: 60 }
        );
        assert_eq!(
            Quota::parse("100/hour").unwrap(),
            Quota { limit: 100, window_secs: 3600 }
        );
        // Unknown periods fall back to daily
        assert_eq!(
            Quota::parse("1000/fortnight").unwrap(),
            Quota { limit: 1000, window_secs: 86400 }
        );
    }

    #[test]
    fn test_quota_parse_rejects_garbage() {
        assert!(Quota::parse("minute").is_err());
        assert!(Quota::parse("lots/minute").is_err());
        assert!(Quota::parse("0/minute").is_err());
    }

    #[test]
    fn test_path_class_resolution() {
        let t = table();
        assert_eq!(t.resolve("/v1/tasks/next").0, PathClass::TaskFetch);
        assert_eq!(t.resolve("/v1/tasks/abc-123/submit").0, PathClass::TaskSubmit);
        assert_eq!(t.resolve("/v1/tasks/batch").0, PathClass::BatchFetch);
        assert_eq!(t.resolve("/v1/users/sessions").0, PathClass::SessionInit);
        assert_eq!(
            t.resolve("/v1/users/sessions/sess_1/profile").0,
            PathClass::SessionInit
        );
        assert_eq!(t.resolve("/v1/publishers/42").0, PathClass::Default);
    }

    #[test]
    fn test_submit_requires_task_segment() {
        let t = table();
        // No task id between prefix and suffix: not a submit path
        assert_eq!(t.resolve("/v1/tasks//submit").0, PathClass::Default);
    }

    #[test]
    fn test_resolution_order_is_stable() {
        let t = table();
        // "next" wins over the generic submit matcher even though both
        // share the /v1/tasks/ prefix
        let (class, quota) = t.resolve("/v1/tasks/next");
        assert_eq!(class, PathClass::TaskFetch);
        assert_eq!(quota.limit, 30);
    }
}
