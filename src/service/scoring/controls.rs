//! Control recommendation mapping
//!
//! Threat-driven controls come first, in catalog order, followed by controls
//! suggested by interview gaps. Each control id appears at most once.

use std::collections::HashSet;

use crate::model::{ControlRecommendation, DomainProfile, InterviewResponseSet};
use crate::service::scoring::tally::is_gap;

/// Recommend controls for one threat, or for every gap in the interview when
/// `threat_id` is `None`
pub fn recommend(
    profile: &DomainProfile,
    responses: &InterviewResponseSet,
    threat_id: Option<&str>,
) -> Vec<ControlRecommendation> {
    let mut seen = HashSet::new();
    let mut recommendations = Vec::new();

    if let Some(threat_id) = threat_id
        && let Some(controls) = profile.threat_controls.get(threat_id)
    {
        let threat_name = profile
            .threat(threat_id)
            .map(|t| t.name.as_str())
            .unwrap_or(threat_id);
        for control_id in controls {
            push_control(
                profile,
                &mut seen,
                &mut recommendations,
                control_id,
                format!("Baseline mitigation for {}", threat_name),
            );
        }
    }

    let questions = profile
        .questions
        .iter()
        .filter(|q| threat_id.is_none_or(|t| q.applies_to(t)));

    for question in questions {
        if question.suggests_controls.is_empty() {
            continue;
        }
        let answer = responses.get(&question.id);
        if !is_gap(question, answer) {
            continue;
        }
        let display = answer.map(|a| a.display()).unwrap_or_default();
        for control_id in &question.suggests_controls {
            push_control(
                profile,
                &mut seen,
                &mut recommendations,
                control_id,
                format!("Gap: \"{}\" answered '{}'", question.prompt, display),
            );
        }
    }

    recommendations
}

fn push_control(
    profile: &DomainProfile,
    seen: &mut HashSet<String>,
    recommendations: &mut Vec<ControlRecommendation>,
    control_id: &str,
    rationale: String,
) {
    if seen.contains(control_id) {
        return;
    }
    let Some(control) = profile.control(control_id) else {
        tracing::warn!(profile = %profile.id, control = %control_id, "Skipping unknown control");
        return;
    };
    seen.insert(control_id.to_string());

    let rationale = match &control.standards_reference {
        Some(reference) => format!("{} ({})", rationale, reference),
        None => rationale,
    };

    recommendations.push(ControlRecommendation {
        control_id: control.id.clone(),
        name: control.name.clone(),
        rationale,
        urgency: control.urgency,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerValue, Urgency};
    use crate::service::catalog::builtin_profile;

    fn ids(recs: &[ControlRecommendation]) -> Vec<&str> {
        recs.iter().map(|r| r.control_id.as_str()).collect()
    }

    #[test]
    fn test_threat_driven_first_then_gaps() {
        let profile = builtin_profile("warehouse").unwrap();
        let responses = InterviewResponseSet::new()
            .with("perimeter_fence", AnswerValue::Flag(false))
            .with("seal_verification", AnswerValue::text("no"));

        let recs = recommend(&profile, &responses, Some("cargo_theft"));
        assert_eq!(
            ids(&recs),
            vec![
                "seal_program",
                "driver_verification",
                "cctv_upgrade",
                "yard_security",
                "perimeter_fencing",
            ]
        );
        assert!(recs[0].rationale.contains("Cargo Theft"));
        assert!(recs[4].rationale.contains("answered 'no'"));
    }

    #[test]
    fn test_recommendations_are_deduplicated() {
        let profile = builtin_profile("warehouse").unwrap();
        // cctv_upgrade is both a threat-driven control and a gap suggestion
        let responses = InterviewResponseSet::new()
            .with("cctv_coverage", AnswerValue::list(["Interior", "Not recorded"]));

        let recs = recommend(&profile, &responses, Some("cargo_theft"));
        let unique: HashSet<&str> = ids(&recs).into_iter().collect();
        assert_eq!(unique.len(), recs.len());
        assert_eq!(ids(&recs).iter().filter(|id| **id == "cctv_upgrade").count(), 1);
    }

    #[test]
    fn test_urgency_from_catalog() {
        let profile = builtin_profile("warehouse").unwrap();
        let recs = recommend(&profile, &InterviewResponseSet::new(), Some("fire"));
        let suppression = recs.iter().find(|r| r.control_id == "fire_suppression").unwrap();
        assert_eq!(suppression.urgency, Urgency::Immediate);
        let inspection = recs.iter().find(|r| r.control_id == "fire_inspection").unwrap();
        assert_eq!(inspection.urgency, Urgency::ShortTerm);
    }

    #[test]
    fn test_gap_only_mode_without_threat() {
        let profile = builtin_profile("executive_protection").unwrap();
        let responses = InterviewResponseSet::new()
            .with("route_variation", AnswerValue::Flag(false))
            .with("residence_alarm", AnswerValue::Flag(true));

        let recs = recommend(&profile, &responses, None);
        assert_eq!(ids(&recs), vec!["route_planning"]);
    }

    #[test]
    fn test_empty_responses_only_threat_driven() {
        let profile = builtin_profile("executive_protection").unwrap();
        let recs = recommend(&profile, &InterviewResponseSet::new(), Some("doxxing"));
        assert_eq!(ids(&recs), vec!["digital_footprint_reduction", "account_hardening"]);
    }
}
