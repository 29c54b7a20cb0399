//! Risk composition: product of component scores, normalization and tiering

use crate::model::{RiskLevel, ScoringConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposedRisk {
    pub inherent_risk: f64,
    pub normalized_risk: f64,
    pub risk_level: RiskLevel,
}

/// Map an inherent risk onto 0–100 against the domain's ceiling
pub fn normalize(inherent_risk: f64, config: &ScoringConfig) -> f64 {
    if config.normalization_ceiling <= 0.0 || !inherent_risk.is_finite() {
        return 0.0;
    }
    (inherent_risk / config.normalization_ceiling * 100.0).clamp(0.0, 100.0)
}

/// `T × V × I × (E or 1)`, normalized and classified on the normalized score
pub fn compose(
    threat_likelihood: u8,
    vulnerability: u8,
    impact: u8,
    exposure: Option<f64>,
    config: &ScoringConfig,
) -> ComposedRisk {
    let inherent_risk = f64::from(threat_likelihood)
        * f64::from(vulnerability)
        * f64::from(impact)
        * exposure.unwrap_or(1.0);
    let normalized_risk = normalize(inherent_risk, config);

    ComposedRisk {
        inherent_risk,
        normalized_risk,
        risk_level: RiskLevel::from_normalized(normalized_risk),
    }
}
