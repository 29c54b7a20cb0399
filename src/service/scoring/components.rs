//! Component scorers: threat likelihood, vulnerability, impact and exposure
//!
//! All scorers are pure functions of the profile, the responses and (for
//! likelihood) the supplemental context. Integer scores are clamped into
//! `1..=scale_max`; exposure is clamped into `1.0..=min(exposure.max, 5.0)`.
Sums saturate so hostile profile weights cannot overflow.

use crate::model::{DomainProfile, InterviewResponseSet, SupplementalContext, ThreatDefinition};
use crate::service::scoring::matcher::{evaluate, matches};
use crate::service::scoring::tally::RiskFactorTally;

/// Maximum likelihood boost taken from recorded incident history
const MAX_HISTORY_BOOST: i32 = 2;

/// Hard ceiling on the exposure multiplier, whatever a profile declares
pub const MAX_EXPOSURE: f64 = 5.0;

/// A clamped component score and the reasons behind it
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentScore {
    pub value: u8,
    pub evidence: Vec<String>,
}

/// Run-wide exposure multiplier (person-centric domains only)
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureScore {
    pub value: f64,
    pub evidence: Vec<String>,
}

pub(crate) fn clamp_to_scale(value: i32, scale_max: u8) -> u8 {
    value.clamp(1, i32::from(scale_max.max(1))) as u8
}

fn targets(threats: &[String], threat_id: &str) -> bool {
    threats.iter().any(|t| t == threat_id)
}

/// Baseline likelihood plus categorical boosts, summed before the clamp
pub fn threat_likelihood(
    profile: &DomainProfile,
    threat: &ThreatDefinition,
    responses: &InterviewResponseSet,
    context: &SupplementalContext,
) -> ComponentScore {
    let mut raw = i32::from(threat.baseline_threat);
    let mut evidence = Vec::new();

    for boost in profile
        .likelihood_boosts
        .iter()
        .filter(|b| targets(&b.threats, &threat.id))
    {
        if evaluate(&boost.when, responses) {
            raw = raw.saturating_add(boost.boost);
            evidence.push(format!("{} ({:+} likelihood)", boost.evidence, boost.boost));
        }
    }

    let recorded = context.incidents_for(&threat.id).count() as i32;
    if recorded > 0 {
        let boost = recorded.min(MAX_HISTORY_BOOST);
        raw = raw.saturating_add(boost);
        evidence.push(format!(
            "{} recorded incident(s) attributed to this threat ({:+} likelihood)",
            recorded, boost
        ));
    }

    if threat.crime_sensitive
        && let Some(level) = context.neighborhood_crime
    {
        let boost = level.likelihood_boost();
        if boost > 0 {
            raw = raw.saturating_add(boost);
            evidence.push(format!("Neighborhood crime level {:?} ({:+} likelihood)", level, boost));
        }
    }

    ComponentScore {
        value: clamp_to_scale(raw, profile.scoring.scale_max),
        evidence,
    }
}

/// `baseline + floor(tally / divisor)`, clamped
pub fn vulnerability(profile: &DomainProfile, tally: &RiskFactorTally) -> ComponentScore {
    let config = &profile.scoring;
    let divisor = config.vulnerability_divisor.max(1);
    let adjustment = tally.total.div_euclid(divisor);
    let raw = i32::from(config.vulnerability_baseline).saturating_add(adjustment);

    let mut evidence = tally.evidence.clone();
    if tally.total != 0 {
        evidence.push(format!(
            "Risk factor tally {} / {} adjusts vulnerability by {:+}",
            tally.total, divisor, adjustment
        ));
    }

    ComponentScore {
        value: clamp_to_scale(raw, config.scale_max),
        evidence,
    }
}

/// Baseline impact plus modifiers, then category floors via `max`
pub fn impact(
    profile: &DomainProfile,
    threat: &ThreatDefinition,
    responses: &InterviewResponseSet,
) -> ComponentScore {
    let scale_max = profile.scoring.scale_max;
    let mut raw = i32::from(threat.baseline_impact);
    let mut evidence = Vec::new();

    for modifier in profile
        .impact_modifiers
        .iter()
        .filter(|m| targets(&m.threats, &threat.id))
    {
        if evaluate(&modifier.when, responses) {
            raw = raw.saturating_add(modifier.modifier);
            evidence.push(format!("{} ({:+} impact)", modifier.evidence, modifier.modifier));
        }
    }

    let mut value = clamp_to_scale(raw, scale_max);

    for floor in profile
        .impact_floors
        .iter()
        .filter(|f| f.category == threat.category)
    {
        let floor_value = floor.floor.min(scale_max);
        if floor_value > value {
            evidence.push(format!(
                "Impact floored at {} for {} threats",
                floor_value, floor.category
            ));
            value = floor_value;
        }
    }

    ComponentScore { value, evidence }
}

/// Exposure multiplier from visibility, predictability, social media and
/// digital footprint. Returns `None` for domains without exposure.
pub fn exposure(profile: &DomainProfile, responses: &InterviewResponseSet) -> Option<ExposureScore> {
    let config = profile.exposure.as_ref()?;
    let max = if config.max >= 1.0 { config.max.min(MAX_EXPOSURE) } else { 1.0 };
    let mut raw = 1.0;
    let mut evidence = Vec::new();

    for factor in &config.factors {
        let answer = responses.get(&factor.question);
        let matched = factor
            .levels
            .iter()
            .filter(|level| matches(answer, &level.pattern));

        let increments: Vec<f64> = if factor.cumulative {
            matched.map(|l| l.increment).collect()
        } else {
            matched.take(1).map(|l| l.increment).collect()
        };

        let sum: f64 = increments.iter().sum();
        if sum > 0.0 {
            raw += sum;
            evidence.push(format!("{} adds {:.1} exposure", factor.name, sum));
        }
    }

    Some(ExposureScore {
        value: raw.clamp(1.0, max),
        evidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::profile::{ImpactModifier, LikelihoodBoost};
    use crate::model::{AnswerValue, Condition, ConditionRule, CrimeLevel, IncidentRecord};
    use crate::service::catalog::builtin_profile;
    use crate::service::scoring::tally::tally;

    #[test]
    fn test_likelihood_boosts_are_additive_and_clamped() {
        let profile = builtin_profile("warehouse").unwrap();
        let threat = profile.threat("cargo_theft").unwrap();

        let baseline = threat_likelihood(
            &profile,
            threat,
            &InterviewResponseSet::new(),
            &SupplementalContext::default(),
        );
        assert_eq!(baseline.value, threat.baseline_threat);
        assert!(baseline.evidence.is_empty());

        let responses = InterviewResponseSet::new()
            .with("incident_1", AnswerValue::text("yes"))
            .with("incident_4", AnswerValue::Flag(true))
            .with("incident_7", AnswerValue::text("Yes"));
        let boosted = threat_likelihood(&profile, threat, &responses, &SupplementalContext::default());
        assert_eq!(boosted.value, profile.scoring.scale_max);
        assert_eq!(boosted.evidence.len(), 3);
    }

    #[test]
    fn test_context_boosts() {
        let profile = builtin_profile("warehouse").unwrap();
        let threat = profile.threat("vandalism").unwrap();
        let context = SupplementalContext {
            incident_history: vec![IncidentRecord {
                threat_id: Some("vandalism".to_string()),
                description: "Graffiti on dock doors".to_string(),
                occurred_on: None,
            }],
            neighborhood_crime: Some(CrimeLevel::High),
            ..Default::default()
        };

        let score = threat_likelihood(&profile, threat, &InterviewResponseSet::new(), &context);
        assert_eq!(score.value, threat.baseline_threat + 2);
        assert_eq!(score.evidence.len(), 2);
    }

    #[test]
    fn test_vulnerability_uses_floor_division() {
        let profile = builtin_profile("warehouse").unwrap();
        let baseline = profile.scoring.vulnerability_baseline;

        let mut t = RiskFactorTally {
            total: 3,
            ..Default::default()
        };
        assert_eq!(vulnerability(&profile, &t).value, baseline + 1);

        t.total = -1;
        assert_eq!(vulnerability(&profile, &t).value, baseline - 1);

        t.total = 100;
        assert_eq!(vulnerability(&profile, &t).value, profile.scoring.scale_max);

        t.total = -100;
        assert_eq!(vulnerability(&profile, &t).value, 1);
    }

    #[test]
    fn test_person_domain_divisor_is_more_conservative() {
        let profile = builtin_profile("executive_protection").unwrap();
        let t = RiskFactorTally {
            total: 5,
            ..Default::default()
        };
        assert_eq!(vulnerability(&profile, &t).value, profile.scoring.vulnerability_baseline + 1);
    }

    #[test]
    fn test_person_tally_feeds_vulnerability() {
        let profile = builtin_profile("executive_protection").unwrap();
        assert_eq!(profile.scoring.vulnerability_divisor, 3);
        let responses = InterviewResponseSet::new()
            .with("residence_access_control", AnswerValue::text("Open access, no gate"))
            .with("residence_alarm", AnswerValue::Flag(false))
            .with("route_variation", AnswerValue::text("No"));

        let t = tally(&profile, &responses, "kidnapping");
        assert_eq!(t.total, 8);
        let score = vulnerability(&profile, &t);
        assert_eq!(score.value, profile.scoring.vulnerability_baseline + 2);
        assert!(score.evidence.iter().any(|e| e.contains("8 / 3")));

        // one protective answer alone: -2 floors to -1
        let protected = InterviewResponseSet::new().with("protection_detail", AnswerValue::Flag(true));
        let t = tally(&profile, &protected, "kidnapping");
        assert_eq!(t.total, -2);
        assert_eq!(vulnerability(&profile, &t).value, profile.scoring.vulnerability_baseline - 1);
    }

    #[test]
    fn test_extreme_profile_weights_clamp() {
        let mut profile = builtin_profile("warehouse").unwrap();
        let when = Condition::new("trigger", ConditionRule::Affirmative);
        profile.likelihood_boosts = vec![
            LikelihoodBoost {
                when: when.clone(),
                threats: vec!["vandalism".to_string()],
                boost: i32::MAX,
                evidence: "runaway boost".to_string(),
            };
            2
        ];
        profile.impact_modifiers = vec![
            ImpactModifier {
                when,
                threats: vec!["vandalism".to_string()],
                modifier: i32::MIN,
                evidence: "runaway modifier".to_string(),
            };
            2
        ];
        let threat = profile.threat("vandalism").unwrap().clone();
        let responses = InterviewResponseSet::new().with("trigger", AnswerValue::Flag(true));
        let context = SupplementalContext {
            neighborhood_crime: Some(CrimeLevel::High),
            ..Default::default()
        };

        let likelihood = threat_likelihood(&profile, &threat, &responses, &context);
        assert_eq!(likelihood.value, profile.scoring.scale_max);
        assert_eq!(impact(&profile, &threat, &responses).value, 1);

        let t = RiskFactorTally {
            total: i32::MAX,
            ..Default::default()
        };
        assert_eq!(vulnerability(&profile, &t).value, profile.scoring.scale_max);
    }

    #[test]
    fn test_exposure_never_exceeds_five() {
        let mut profile = builtin_profile("executive_protection").unwrap();
        if let Some(config) = profile.exposure.as_mut() {
            config.max = 8.0;
        }
        let responses = InterviewResponseSet::new()
            .with("public_profile", AnswerValue::text("Very high - frequent media"))
            .with("routine_predictability", AnswerValue::text("Highly predictable"))
            .with("social_media_presence", AnswerValue::text("Very active"))
            .with(
                "digital_footprint",
                AnswerValue::list(["Home address online", "Family details online", "Travel posted"]),
            );
        let score = exposure(&profile, &responses).unwrap();
        assert_eq!(score.value, MAX_EXPOSURE);
    }

    #[test]
    fn test_impact_floor_never_lowers() {
        let profile = builtin_profile("warehouse").unwrap();
        let fire = profile.threat("fire").unwrap();
        let score = impact(&profile, fire, &InterviewResponseSet::new());
        assert_eq!(score.value, profile.scoring.scale_max);

        let vandalism = profile.threat("vandalism").unwrap();
        let score = impact(&profile, vandalism, &InterviewResponseSet::new());
        assert_eq!(score.value, vandalism.baseline_impact);
    }

    #[test]
    fn test_impact_modifiers() {
        let profile = builtin_profile("warehouse").unwrap();
        let threat = profile.threat("cargo_theft").unwrap();
        let responses = InterviewResponseSet::new()
            .with("high_value_goods", AnswerValue::list(["Consumer electronics"]));
        let score = impact(&profile, threat, &responses);
        assert_eq!(score.value, threat.baseline_impact + 1);
    }

    #[test]
    fn test_exposure_absent_for_facility() {
        let profile = builtin_profile("warehouse").unwrap();
        assert!(exposure(&profile, &InterviewResponseSet::new()).is_none());
    }

    #[test]
    fn test_exposure_baseline_and_cap() {
        let profile = builtin_profile("executive_protection").unwrap();

        let empty = exposure(&profile, &InterviewResponseSet::new()).unwrap();
        assert_eq!(empty.value, 1.0);

        let responses = InterviewResponseSet::new()
            .with("public_profile", AnswerValue::text("Very high - frequent media"))
            .with("routine_predictability", AnswerValue::text("Highly predictable"))
            .with("social_media_presence", AnswerValue::text("Very active"))
            .with(
                "digital_footprint",
                AnswerValue::list(["Home address online", "Family details online", "Travel posted"]),
            );
        let full = exposure(&profile, &responses).unwrap();
        assert_eq!(full.value, 5.0);
        assert_eq!(full.evidence.len(), 4);
    }

    #[test]
    fn test_first_match_wins_for_exposure_levels() {
        let profile = builtin_profile("executive_protection").unwrap();
        let responses =
            InterviewResponseSet::new().with("public_profile", AnswerValue::text("Very high"));
        let score = exposure(&profile, &responses).unwrap();
        assert_eq!(score.value, 2.5);
    }

    #[test]
    fn test_scores_stay_in_bounds() {
        for id in ["warehouse", "executive_protection"] {
            let profile = builtin_profile(id).unwrap();
            let max = profile.scoring.scale_max;
            let worst: InterviewResponseSet = profile
                .questions
                .iter()
                .map(|q| (q.id.clone(), AnswerValue::text("no")))
                .collect();
            for threat in &profile.threats {
                let t = threat_likelihood(&profile, threat, &worst, &SupplementalContext::default());
                let v = vulnerability(&profile, &tally(&profile, &worst, &threat.id));
                let i = impact(&profile, threat, &worst);
                for value in [t.value, v.value, i.value] {
                    assert!((1..=max).contains(&value), "{} out of bounds for {}", value, threat.id);
                }
            }
        }
    }
}
