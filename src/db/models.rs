//! Database models for risk scenarios

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::model::{Confidence, ControlRecommendation, RiskLevel, RiskScenario, ScoringMode};

/// Database representation of a risk scenario
#[derive(Debug, Clone, FromRow)]
pub struct RiskScenarioRow {
    pub id: String,
    pub assessment_id: String,
    pub threat_id: String,
    pub threat_name: String,
    pub threat_likelihood: i16,
    pub vulnerability: i16,
    pub impact: i16,
    pub exposure: Option<f64>,
    pub inherent_risk: f64,
    pub normalized_risk: f64,
    pub risk_level: String,
    pub scenario_description: String,
    pub evidence_trail: serde_json::Value,
    pub suggested_controls: serde_json::Value,
    pub mode: String,
    pub confidence: String,
    pub created_at: DateTime<Utc>,
}

fn score_from_db(column: &str, value: i16) -> Result<u8, String> {
    u8::try_from(value).map_err(|_| format!("{} out of range: {}", column, value))
}

impl RiskScenarioRow {
    /// Convert database row to domain model
    pub fn into_domain(self) -> Result<RiskScenario, String> {
        let evidence_trail: Vec<String> = serde_json::from_value(self.evidence_trail)
            .map_err(|e| format!("Invalid evidence_trail: {}", e))?;
        let suggested_controls: Vec<ControlRecommendation> =
            serde_json::from_value(self.suggested_controls)
                .map_err(|e| format!("Invalid suggested_controls: {}", e))?;

        Ok(RiskScenario {
            id: self.id,
            assessment_id: self.assessment_id,
            threat_id: self.threat_id,
            threat_name: self.threat_name,
            threat_likelihood: score_from_db("threat_likelihood", self.threat_likelihood)?,
            vulnerability: score_from_db("vulnerability", self.vulnerability)?,
            impact: score_from_db("impact", self.impact)?,
            exposure: self.exposure,
            inherent_risk: self.inherent_risk,
            normalized_risk: self.normalized_risk,
            risk_level: risk_level_from_string(&self.risk_level)?,
            scenario_description: self.scenario_description,
            evidence_trail,
            suggested_controls,
            mode: scoring_mode_from_string(&self.mode)?,
            confidence: confidence_from_string(&self.confidence)?,
            created_at: self.created_at,
        })
    }
}

pub fn risk_level_from_string(value: &str) -> Result<RiskLevel, String> {
    match value {
        "low" => Ok(RiskLevel::Low),
        "medium" => Ok(RiskLevel::Medium),
        "high" => Ok(RiskLevel::High),
        "critical" => Ok(RiskLevel::Critical),
        other => Err(format!("Unknown risk level: {}", other)),
    }
}

pub fn scoring_mode_from_string(value: &str) -> Result<ScoringMode, String> {
    match value {
        "ai" => Ok(ScoringMode::Ai),
        "algorithmic" => Ok(ScoringMode::Algorithmic),
        other => Err(format!("Unknown scoring mode: {}", other)),
    }
}

pub fn confidence_from_string(value: &str) -> Result<Confidence, String> {
    match value {
        "high" => Ok(Confidence::High),
        "medium" => Ok(Confidence::Medium),
        "low" => Ok(Confidence::Low),
        "fallback" => Ok(Confidence::Fallback),
        other => Err(format!("Unknown confidence: {}", other)),
    }
}
