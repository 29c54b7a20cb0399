//! Validation logic for LLM-extracted risk scores
//!
//! Missing or non-numeric component scores are fatal; everything else is
//! repaired in the converter and reported as a warning.

use crate::model::DomainProfile;
use crate::model::assessment::ExtractedRiskScores;

/// Result of score validation
#[derive(Debug)]
pub struct ScoreValidationResult {
    /// Whether the scores can be used
    pub is_valid: bool,
    /// Problems that force the algorithmic fallback
    pub errors: Vec<String>,
    /// Problems that were repaired (clamped, defaulted or dropped)
    pub warnings: Vec<String>,
}

impl ScoreValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

fn check_component(
    name: &str,
    value: Option<f64>,
    scale_max: u8,
    result: &mut ScoreValidationResult,
) {
    match value {
        None => result.add_error(format!("{} is missing", name)),
        Some(v) if !v.is_finite() => result.add_error(format!("{} is not a finite number", name)),
        Some(v) => {
            if v.fract() != 0.0 {
                result.add_warning(format!("{} {} rounded to an integer", name, v));
            }
            let rounded = v.round();
            if rounded < 1.0 || rounded > f64::from(scale_max) {
                result.add_warning(format!("{} {} clamped into 1..={}", name, v, scale_max));
            }
        }
    }
}

/// Validate extracted scores against the profile's scale and control catalog
///
/// Checks:
/// 1. T, V and I are present and finite (errors)
/// 2. T, V and I are integers within the scale (warnings, repaired by clamping)
/// 3. Confidence and evidence are present (warnings)
/// 4. Suggested control ids exist in the catalog (warnings, unknown ids dropped)
pub fn validate_extracted_scores(
    extracted: &ExtractedRiskScores,
    profile: &DomainProfile,
) -> ScoreValidationResult {
    let mut result = ScoreValidationResult::valid();
    let scale_max = profile.scoring.scale_max;

    check_component("threat_likelihood", extracted.threat_likelihood, scale_max, &mut result);
    check_component("vulnerability", extracted.vulnerability, scale_max, &mut result);
    check_component("impact", extracted.impact, scale_max, &mut result);

    if extracted.confidence.is_none() {
        result.add_warning("confidence missing, defaulting to medium".to_string());
    }

    match &extracted.evidence {
        None => result.add_warning("evidence missing".to_string()),
        Some(evidence) if evidence.iter().all(|e| e.trim().is_empty()) => {
            result.add_warning("evidence is empty".to_string())
        }
        Some(_) => {}
    }

    if extracted
        .scenario_description
        .as_deref()
        .is_none_or(|d| d.trim().is_empty())
    {
        result.add_warning("scenario_description missing, narrating locally".to_string());
    }

    for control in extracted.suggested_controls.iter().flatten() {
        if profile.control(control).is_none() {
            result.add_warning(format!("unknown control '{}' dropped", control));
        }
    }

    result
}
