//! Converters from extracted LLM output to validated scores

use crate::model::assessment::{ExtractedConfidence, ExtractedRiskScores};
use crate::model::{Confidence, ControlRecommendation, DomainProfile};
use crate::service::scoring::components::clamp_to_scale;

/// AI scores after rounding, clamping and catalog filtering
#[derive(Debug, Clone, PartialEq)]
pub struct AiScore {
    pub threat_likelihood: u8,
    pub vulnerability: u8,
    pub impact: u8,
    pub confidence: Confidence,
    pub evidence: Vec<String>,
    pub scenario_description: Option<String>,
    /// Known control ids only, in the order the model gave them
    pub suggested_controls: Vec<String>,
}

pub fn convert_confidence(extracted: Option<ExtractedConfidence>) -> Confidence {
    match extracted {
        Some(ExtractedConfidence::High) => Confidence::High,
        Some(ExtractedConfidence::Medium) | None => Confidence::Medium,
        Some(ExtractedConfidence::Low) => Confidence::Low,
    }
}

fn convert_component(value: Option<f64>, scale_max: u8) -> Option<u8> {
    let v = value.filter(|v| v.is_finite())?.round();
    let v = v.clamp(i32::MIN as f64, i32::MAX as f64) as i32;
    Some(clamp_to_scale(v, scale_max))
}

/// Convert validated output; `None` when a component score is unusable
pub fn convert_scores(extracted: ExtractedRiskScores, profile: &DomainProfile) -> Option<AiScore> {
    let scale_max = profile.scoring.scale_max;

    let suggested_controls = extracted
        .suggested_controls
        .unwrap_or_default()
        .into_iter()
        .filter(|id| profile.control(id).is_some())
        .collect();

    Some(AiScore {
        threat_likelihood: convert_component(extracted.threat_likelihood, scale_max)?,
        vulnerability: convert_component(extracted.vulnerability, scale_max)?,
        impact: convert_component(extracted.impact, scale_max)?,
        confidence: convert_confidence(extracted.confidence),
        evidence: extracted
            .evidence
            .unwrap_or_default()
            .into_iter()
            .filter(|e| !e.trim().is_empty())
            .collect(),
        scenario_description: extracted
            .scenario_description
            .filter(|d| !d.trim().is_empty()),
        suggested_controls,
    })
}

/// Catalog entries for the model's suggested control ids
pub fn ai_controls(profile: &DomainProfile, control_ids: &[String]) -> Vec<ControlRecommendation> {
    control_ids
        .iter()
        .filter_map(|id| profile.control(id))
        .map(|control| ControlRecommendation {
            control_id: control.id.clone(),
            name: control.name.clone(),
            rationale: "Recommended by the AI evaluator".to_string(),
            urgency: control.urgency,
        })
        .collect()
}
