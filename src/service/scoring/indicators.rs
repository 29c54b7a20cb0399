//! Incident-history indicators (e.g. `cargo_theft_risk`)

use crate::model::{DomainProfile, IncidentIndicator, IndicatorResult, InterviewResponseSet, RiskLevel};
use crate::service::scoring::matcher::evaluate;

/// Classify every indicator declared by the profile
pub fn classify_indicators(
    profile: &DomainProfile,
    responses: &InterviewResponseSet,
) -> Vec<IndicatorResult> {
    profile
        .indicators
        .iter()
        .map(|indicator| classify(indicator, responses))
        .collect()
}

fn classify(indicator: &IncidentIndicator, responses: &InterviewResponseSet) -> IndicatorResult {
    let mut evidence: Vec<String> = indicator
        .conditions
        .iter()
        .filter(|c| evaluate(c, responses))
        .map(|c| c.describe())
        .collect();
    let satisfied = evidence.len();

    let escalations: Vec<String> = indicator
        .high_severity
        .iter()
        .filter(|c| evaluate(c, responses))
        .map(|c| format!("{} (high severity)", c.describe()))
        .collect();
    let escalated = !escalations.is_empty();
    evidence.extend(escalations);

    let level = if satisfied >= indicator.critical_count || escalated {
        RiskLevel::Critical
    } else if satisfied >= indicator.high_count {
        RiskLevel::High
    } else if satisfied >= 1 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    IndicatorResult {
        id: indicator.id.clone(),
        name: indicator.name.clone(),
        level,
        satisfied,
        evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnswerValue;
    use crate::service::catalog::builtin_profile;

    fn cargo_theft_risk(responses: &InterviewResponseSet) -> IndicatorResult {
        let profile = builtin_profile("warehouse").unwrap();
        classify_indicators(&profile, responses)
            .into_iter()
            .find(|r| r.id == "cargo_theft_risk")
            .unwrap()
    }

    #[test]
    fn test_three_incidents_are_critical() {
        let responses = InterviewResponseSet::new()
            .with("incident_1", AnswerValue::text("yes"))
            .with("incident_2", AnswerValue::text("yes"))
            .with("incident_7", AnswerValue::text("yes"));

        let result = cargo_theft_risk(&responses);
        assert_eq!(result.level, RiskLevel::Critical);
        assert_eq!(result.satisfied, 3);
        assert_eq!(result.evidence.len(), 3);
    }

    #[test]
    fn test_counts_below_critical() {
        let two = InterviewResponseSet::new()
            .with("incident_1", AnswerValue::Flag(true))
            .with("incident_6", AnswerValue::text("Yes, twice"));
        assert_eq!(cargo_theft_risk(&two).level, RiskLevel::High);

        let one = InterviewResponseSet::new().with("incident_3", AnswerValue::text("yes"));
        assert_eq!(cargo_theft_risk(&one).level, RiskLevel::Medium);

        let none = InterviewResponseSet::new().with("incident_1", AnswerValue::text("no"));
        assert_eq!(cargo_theft_risk(&none).level, RiskLevel::Low);
    }

    #[test]
    fn test_high_severity_escalates() {
        let responses = InterviewResponseSet::new().with("incident_4", AnswerValue::text("yes"));
        let result = cargo_theft_risk(&responses);
        assert_eq!(result.level, RiskLevel::Critical);
        assert_eq!(result.satisfied, 1);
        assert!(result.evidence.iter().any(|e| e.contains("high severity")));
    }

    #[test]
    fn test_every_indicator_reported() {
        let profile = builtin_profile("executive_protection").unwrap();
        let results = classify_indicators(&profile, &InterviewResponseSet::new());
        assert_eq!(results.len(), profile.indicators.len());
        assert!(results.iter().all(|r| r.level == RiskLevel::Low));
    }
}
