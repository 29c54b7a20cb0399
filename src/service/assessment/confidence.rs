//! Confidence and provenance for scenarios and batches

use crate::model::{BatchMode, Confidence, RiskScenario, ScoringMode};

/// Answered share at or above which data coverage is considered high
const HIGH_COVERAGE: f64 = 0.75;
/// Answered share at or above which data coverage is considered medium
const MEDIUM_COVERAGE: f64 = 0.40;

/// Confidence of an algorithmic scenario produced without any AI configured
pub fn coverage_confidence(coverage: f64) -> Confidence {
    if coverage >= HIGH_COVERAGE {
        Confidence::High
    } else if coverage >= MEDIUM_COVERAGE {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// The weakest confidence among the scenarios (high when there are none)
pub fn batch_confidence<'a>(scenarios: impl IntoIterator<Item = &'a RiskScenario>) -> Confidence {
    scenarios
        .into_iter()
        .fold(Confidence::High, |acc, s| acc.weakest(s.confidence))
}

/// `ai` if nothing fell back, `algorithmic` if nothing was AI-scored, else `hybrid`
pub fn batch_mode<'a>(scenarios: impl IntoIterator<Item = &'a RiskScenario>) -> BatchMode {
    let (mut ai, mut algorithmic) = (0usize, 0usize);
    for scenario in scenarios {
        match scenario.mode {
            ScoringMode::Ai => ai += 1,
            ScoringMode::Algorithmic => algorithmic += 1,
        }
    }

    match (ai, algorithmic) {
        (_, 0) if ai > 0 => BatchMode::Ai,
        (0, _) => BatchMode::Algorithmic,
        _ => BatchMode::Hybrid,
    }
}
