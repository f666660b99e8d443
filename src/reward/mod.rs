//! Reward calculation
//!
//! Maps a quality score to a graduated content-access reward. Pure step
//! function with inclusive thresholds, evaluated top-down, first match wins.
//!
//! A submission whose assignment could not be found gets no reward at all:
//! the calculator is bypassed rather than awarding the floor tier.

use serde::Serialize;

/// Reward handed back to the widget after a submission
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reward {
    ContentAccess { duration_seconds: u64 },
    None,
}

/// Quality tiers, highest first; anything below the last threshold earns
/// the floor
const TIERS: &[(f64, u64)] = &[(0.9, 7200), (0.8, 5400), (0.7, 3600)];
const FLOOR_SECONDS: u64 = 1800;

/// Reward for a validated quality score
pub fn reward_for(quality_score: f64) -> Reward {
    for &(threshold, duration_seconds) in TIERS {
        if quality_score >= threshold {
            return Reward::ContentAccess { duration_seconds };
        }
    }
    Reward::ContentAccess {
        duration_seconds: FLOOR_SECONDS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duration(reward: Reward) -> u64 {
        match reward {
            Reward::ContentAccess { duration_seconds } => duration_seconds,
            Reward::None => panic!("expected a content access reward"),
        }
    }

    #[test]
    fn test_tiers_are_inclusive() {
        assert_eq!(duration(reward_for(1.0)), 7200);
        assert_eq!(duration(reward_for(0.9)), 7200);
        assert_eq!(duration(reward_for(0.89999)), 5400);
        assert_eq!(duration(reward_for(0.8)), 5400);
        assert_eq!(duration(reward_for(0.7)), 3600);
    }

    #[test]
    fn test_floor_tier() {
        assert_eq!(duration(reward_for(0.69999)), 1800);
        assert_eq!(duration(reward_for(0.5)), 1800);
        assert_eq!(duration(reward_for(0.0)), 1800);
    }

    #[test]
    fn test_reward_serializes_with_type_tag() {
        let json = serde_json::to_value(reward_for(0.95)).unwrap();
        assert_eq!(json["type"], "content_access");
        assert_eq!(json["duration_seconds"], 7200);

        let none = serde_json::to_value(Reward::None).unwrap();
        assert_eq!(none["type"], "none");
    }
}
