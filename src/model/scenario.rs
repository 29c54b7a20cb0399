//! Scored risk scenarios and the per-run batch summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::profile::Urgency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Classify a normalized (0–100) score. Never call this with a raw product.
    pub fn from_normalized(normalized: f64) -> Self {
        if normalized >= 75.0 {
            RiskLevel::Critical
        } else if normalized >= 50.0 {
            RiskLevel::High
        } else if normalized >= 25.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Which evaluator produced a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    Ai,
    Algorithmic,
}

impl ScoringMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringMode::Ai => "ai",
            ScoringMode::Algorithmic => "algorithmic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
    /// Scored algorithmically after the AI evaluator failed
    Fallback,
}

impl Confidence {
    fn rank(&self) -> u8 {
        match self {
            Confidence::High => 3,
            Confidence::Medium => 2,
            Confidence::Low => 1,
            Confidence::Fallback => 0,
        }
    }

    /// The weaker of two confidence values
    pub fn weakest(self, other: Confidence) -> Confidence {
        if other.rank() < self.rank() { other } else { self }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlRecommendation {
    pub control_id: String,
    pub name: String,
    pub rationale: String,
    pub urgency: Urgency,
}

/// Primary engine output: one scored threat for one assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScenario {
    pub id: String,
    pub assessment_id: String,
    pub threat_id: String,
    pub threat_name: String,
    pub threat_likelihood: u8,
    pub vulnerability: u8,
    pub impact: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure: Option<f64>,
    pub inherent_risk: f64,
    pub normalized_risk: f64,
    pub risk_level: RiskLevel,
    pub scenario_description: String,
    pub evidence_trail: Vec<String>,
    pub suggested_controls: Vec<ControlRecommendation>,
    pub mode: ScoringMode,
    pub confidence: Confidence,
    pub created_at: DateTime<Utc>,
}

/// Provenance of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    Ai,
    Algorithmic,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPosture {
    Critical,
    Elevated,
    Moderate,
    Strong,
}

impl SecurityPosture {
    /// Posture follows the most severe scenario level
    pub fn from_levels(levels: impl IntoIterator<Item = RiskLevel>) -> Self {
        match levels.into_iter().max() {
            Some(RiskLevel::Critical) => SecurityPosture::Critical,
            Some(RiskLevel::High) => SecurityPosture::Elevated,
            Some(RiskLevel::Medium) => SecurityPosture::Moderate,
            Some(RiskLevel::Low) | None => SecurityPosture::Strong,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorResult {
    pub id: String,
    pub name: String,
    pub level: RiskLevel,
    pub satisfied: usize,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentBatchResult {
    pub success: bool,
    pub assessment_id: String,
    pub profile: String,
    pub mode: BatchMode,
    pub generated_scenarios: usize,
    pub critical_risks: usize,
    pub high_risks: usize,
    pub medium_risks: usize,
    pub low_risks: usize,
    pub risk_scenario_ids: Vec<String>,
    pub overall_posture: SecurityPosture,
    pub confidence: Confidence,
    pub processing_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure: Option<f64>,
    pub indicators: Vec<IndicatorResult>,
    pub scenarios: Vec<RiskScenario>,
}

impl AssessmentBatchResult {
    /// Highest-risk scenarios first, for the narrative report renderer
    pub fn top_scenarios(&self, n: usize) -> Vec<&RiskScenario> {
        let mut sorted: Vec<&RiskScenario> = self.scenarios.iter().collect();
        sorted.sort_by(|a, b| {
            b.normalized_risk
                .total_cmp(&a.normalized_risk)
                .then_with(|| a.threat_id.cmp(&b.threat_id))
        });
        sorted.truncate(n);
        sorted
    }
}
