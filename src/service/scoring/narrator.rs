//! Deterministic scenario prose for a scored threat

use crate::model::{DomainProfile, InterviewResponseSet, ThreatDefinition};
use crate::service::scoring::ComponentScores;
use crate::service::scoring::matcher::evaluate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    VeryHigh,
    High,
    Moderate,
    Low,
}

impl Tier {
    fn of(value: f64, max: f64) -> Self {
        let share = if max > 0.0 { value / max } else { 0.0 };
        if share >= 0.8 {
            Tier::VeryHigh
        } else if share >= 0.6 {
            Tier::High
        } else if share >= 0.4 {
            Tier::Moderate
        } else {
            Tier::Low
        }
    }
}

fn likelihood_phrase(tier: Tier) -> &'static str {
    match tier {
        Tier::VeryHigh => "is highly likely to be attempted",
        Tier::High => "is likely to be attempted",
        Tier::Moderate => "is a plausible threat",
        Tier::Low => "is considered unlikely",
    }
}

fn vulnerability_phrase(tier: Tier) -> &'static str {
    match tier {
        Tier::VeryHigh => "Existing measures leave critical gaps",
        Tier::High => "Existing measures leave significant gaps",
        Tier::Moderate => "Existing measures leave some gaps",
        Tier::Low => "Existing measures are largely effective",
    }
}

fn impact_phrase(tier: Tier) -> &'static str {
    match tier {
        Tier::VeryHigh => "the consequences would be severe",
        Tier::High => "the consequences would be serious",
        Tier::Moderate => "the consequences would be moderate",
        Tier::Low => "the consequences would be limited",
    }
}

fn exposure_sentence(tier: Tier) -> Option<&'static str> {
    match tier {
        Tier::VeryHigh => Some("A very high public exposure amplifies the risk considerably."),
        Tier::High => Some("High public exposure makes the principal an easier target."),
        Tier::Moderate => Some("Moderate public exposure adds to the risk."),
        Tier::Low => None,
    }
}

/// Compose the scenario description from tiered phrases and the first
/// matching threat-specific clause
pub fn narrate(
    profile: &DomainProfile,
    threat: &ThreatDefinition,
    scores: &ComponentScores,
    responses: &InterviewResponseSet,
) -> String {
    let scale = f64::from(profile.scoring.scale_max);
    let mut text = format!(
        "{} {}. {}, and {}.",
        threat.name,
        likelihood_phrase(Tier::of(f64::from(scores.threat_likelihood), scale)),
        vulnerability_phrase(Tier::of(f64::from(scores.vulnerability), scale)),
        impact_phrase(Tier::of(f64::from(scores.impact), scale)),
    );

    if let Some(exposure) = scores.exposure {
        let max = profile.exposure.as_ref().map(|e| e.max).unwrap_or(5.0);
        if let Some(sentence) = exposure_sentence(Tier::of(exposure, max)) {
            text.push(' ');
            text.push_str(sentence);
        }
    }

    if let Some(clause) = profile
        .narrative_clauses
        .iter()
        .filter(|c| c.threat == threat.id)
        .find(|c| evaluate(&c.when, responses))
    {
        text.push(' ');
        text.push_str(&clause.clause);
    }

    text
}
