//! LLM-extractable models for AI-assisted risk scoring
//!
//! Every field is optional so that a partially filled response can still be
//! decoded; `service::assessment::validation` decides what is usable.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Structured output requested from the language model for one threat
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedRiskScores {
    /// Threat likelihood on the requested integer scale
    pub threat_likelihood: Option<f64>,
    /// Vulnerability on the requested integer scale
    pub vulnerability: Option<f64>,
    /// Impact on the requested integer scale
    pub impact: Option<f64>,
    pub confidence: Option<ExtractedConfidence>,
    /// Interview facts that justify the scores
    pub evidence: Option<Vec<String>>,
    pub scenario_description: Option<String>,
    /// Control ids taken from the catalog supplied in the prompt
    pub suggested_controls: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractedConfidence {
    High,
    Medium,
    Low,
}
