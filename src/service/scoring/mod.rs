//! Algorithmic risk scoring
//!
//! Pipeline per threat: factor tally, component scores, composition, then
//! control mapping and narration. Every step is a pure function of the
//! profile and the run inputs, so repeated runs give identical results.

pub mod components;
pub mod composer;
pub mod controls;
pub mod indicators;
pub mod matcher;
pub mod narrator;
pub mod tally;

pub use components::ExposureScore;
pub use composer::{ComposedRisk, compose};
pub use controls::recommend;
pub use indicators::classify_indicators;
pub use narrator::narrate;

use crate::model::{
    ControlRecommendation, DomainProfile, InterviewResponseSet, SupplementalContext,
    ThreatDefinition,
};

/// T, V, I and the optional run-wide exposure for one threat
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentScores {
    pub threat_likelihood: u8,
    pub vulnerability: u8,
    pub impact: u8,
    pub exposure: Option<f64>,
}

/// Everything the algorithmic evaluator produces for one threat
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmicScore {
    pub scores: ComponentScores,
    pub risk: ComposedRisk,
    pub evidence_trail: Vec<String>,
    pub scenario_description: String,
    pub suggested_controls: Vec<ControlRecommendation>,
    /// Answered share of the threat's relevant questions
    pub coverage: f64,
}

/// Score one threat without any AI involvement
pub fn score_threat(
    profile: &DomainProfile,
    threat: &ThreatDefinition,
    responses: &InterviewResponseSet,
    context: &SupplementalContext,
    exposure: Option<&ExposureScore>,
) -> AlgorithmicScore {
    let scale = profile.scoring.scale_max;
    let factor_tally = tally::tally(profile, responses, &threat.id);

    let likelihood = components::threat_likelihood(profile, threat, responses, context);
    let vulnerability = components::vulnerability(profile, &factor_tally);
    let impact = components::impact(profile, threat, responses);

    let scores = ComponentScores {
        threat_likelihood: likelihood.value,
        vulnerability: vulnerability.value,
        impact: impact.value,
        exposure: exposure.map(|e| e.value),
    };
    let risk = compose(
        scores.threat_likelihood,
        scores.vulnerability,
        scores.impact,
        scores.exposure,
        &profile.scoring,
    );

    let mut evidence_trail = Vec::new();
    evidence_trail.push(format!("Threat likelihood {}/{}", likelihood.value, scale));
    evidence_trail.extend(likelihood.evidence);
    evidence_trail.push(format!("Vulnerability {}/{}", vulnerability.value, scale));
    evidence_trail.extend(vulnerability.evidence);
    evidence_trail.push(format!("Impact {}/{}", impact.value, scale));
    evidence_trail.extend(impact.evidence);
    if let Some(exposure) = exposure {
        evidence_trail.push(format!("Exposure {:.1}", exposure.value));
        evidence_trail.extend(exposure.evidence.iter().cloned());
    }

    AlgorithmicScore {
        scenario_description: narrate(profile, threat, &scores, responses),
        suggested_controls: recommend(profile, responses, Some(&threat.id)),
        coverage: factor_tally.coverage(),
        scores,
        risk,
        evidence_trail,
    }
}
