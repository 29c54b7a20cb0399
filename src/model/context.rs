//! Optional side-channel inputs to an assessment run

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrimeLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl CrimeLevel {
    /// Likelihood boost for crime-sensitive threats
    pub fn likelihood_boost(&self) -> i32 {
        match self {
            CrimeLevel::Low | CrimeLevel::Moderate => 0,
            CrimeLevel::High => 1,
            CrimeLevel::VeryHigh => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// Threat the incident is attributed to, when known
    #[serde(default)]
    pub threat_id: Option<String>,
    pub description: String,
    #[serde(default)]
    pub occurred_on: Option<NaiveDate>,
}

/// Photo findings, incident history and area profile. Only the AI prompt
/// builder and a few likelihood modifiers read these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplementalContext {
    #[serde(default)]
    pub photo_findings: Vec<String>,
    #[serde(default)]
    pub incident_history: Vec<IncidentRecord>,
    #[serde(default)]
    pub neighborhood_crime: Option<CrimeLevel>,
    #[serde(default)]
    pub industry: Option<String>,
}

impl SupplementalContext {
    pub fn is_empty(&self) -> bool {
        self.photo_findings.is_empty()
            && self.incident_history.is_empty()
            && self.neighborhood_crime.is_none()
            && self.industry.is_none()
    }

    /// Recorded incidents attributed to a threat
    pub fn incidents_for<'a>(&'a self, threat_id: &'a str) -> impl Iterator<Item = &'a IncidentRecord> + 'a {
        self.incident_history
            .iter()
            .filter(move |i| i.threat_id.as_deref() == Some(threat_id))
    }
}
