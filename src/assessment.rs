//! Assessment completion reporting
//!
//! An assessment run reports pass/fail exactly once, after a short settle
//! delay, together with a recommendation for what to study next.

use serde::{Deserialize, Serialize};

use crate::settings::Tier;

/// Callbacks exposed to the enclosing assessment flow
pub trait CompletionHandler {
    fn on_pass(&mut self, final_score: u64);
    fn on_fail(&mut self);
}

/// Handler for training runs and tests that do not care
impl CompletionHandler for () {
    fn on_pass(&mut self, _final_score: u64) {}
    fn on_fail(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationStatus {
    /// 80% or better
    Mastery,
    /// 50% or better
    Passing,
    Remedial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub status: RecommendationStatus,
    pub message: String,
    pub next_step: String,
    /// Suggested tier for the next attempt
    pub difficulty_adjustment: Tier,
}

/// Recommend a next step from the run's tally
pub fn recommend(topic: &str, tier: Tier, correct: u32, total: u32) -> Recommendation {
    let percent = if total == 0 {
        0.0
    } else {
        correct as f32 * 100.0 / total as f32
    };

    if percent >= 80.0 {
        Recommendation {
            status: RecommendationStatus::Mastery,
            message: format!("Excellent work! You have mastered {topic} ({percent:.0}%)."),
            next_step: "Move on to the next lesson.".to_string(),
            difficulty_adjustment: Tier::from_index(tier.index().saturating_add(1)),
        }
    } else if percent >= 50.0 {
        Recommendation {
            status: RecommendationStatus::Passing,
            message: format!("Good effort on {topic} ({percent:.0}%)."),
            next_step: "Review the explanations for the questions you missed.".to_string(),
            difficulty_adjustment: tier,
        }
    } else {
        Recommendation {
            status: RecommendationStatus::Remedial,
            message: format!("{topic} needs more practice ({percent:.0}%)."),
            next_step: "Revisit the lesson notes before trying again.".to_string(),
            difficulty_adjustment: Tier::from_index(tier.index().saturating_sub(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(recommend("Sparta", Tier::Medium, 8, 10).status, RecommendationStatus::Mastery);
        assert_eq!(recommend("Sparta", Tier::Medium, 5, 10).status, RecommendationStatus::Passing);
        assert_eq!(recommend("Sparta", Tier::Medium, 4, 10).status, RecommendationStatus::Remedial);
        assert_eq!(recommend("Sparta", Tier::Medium, 0, 0).status, RecommendationStatus::Remedial);
    }

    #[test]
    fn test_difficulty_adjustment_saturates() {
        assert_eq!(recommend("x", Tier::Spartan, 10, 10).difficulty_adjustment, Tier::Spartan);
        assert_eq!(recommend("x", Tier::Easy, 0, 10).difficulty_adjustment, Tier::Easy);
        assert_eq!(recommend("x", Tier::Medium, 10, 10).difficulty_adjustment, Tier::Hard);
    }
}
