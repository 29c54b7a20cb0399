//! Repository for risk scenario database operations

use async_trait::async_trait;
use sqlx::PgPool;

use super::models::RiskScenarioRow;
use super::{DbError, ScenarioStore};
use crate::model::RiskScenario;

/// Repository for risk scenario operations
#[derive(Clone)]
pub struct RiskScenarioRepository {
    pool: PgPool,
}

impl RiskScenarioRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or update the scenario for its `(assessment_id, threat_id)`
    pub async fn upsert(&self, scenario: &RiskScenario) -> Result<(), DbError> {
        let evidence_json = serde_json::to_value(&scenario.evidence_trail)
            .map_err(|e| DbError::Serialization(e.to_string()))?;
        let controls_json = serde_json::to_value(&scenario.suggested_controls)
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO risk_scenarios (
                id, assessment_id, threat_id, threat_name,
                threat_likelihood, vulnerability, impact, exposure,
                inherent_risk, normalized_risk, risk_level,
                scenario_description, evidence_trail, suggested_controls,
                mode, confidence, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (assessment_id, threat_id) DO UPDATE SET
                id = EXCLUDED.id,
                threat_name = EXCLUDED.threat_name,
                threat_likelihood = EXCLUDED.threat_likelihood,
                vulnerability = EXCLUDED.vulnerability,
                impact = EXCLUDED.impact,
                exposure = EXCLUDED.exposure,
                inherent_risk = EXCLUDED.inherent_risk,
                normalized_risk = EXCLUDED.normalized_risk,
                risk_level = EXCLUDED.risk_level,
                scenario_description = EXCLUDED.scenario_description,
                evidence_trail = EXCLUDED.evidence_trail,
                suggested_controls = EXCLUDED.suggested_controls,
                mode = EXCLUDED.mode,
                confidence = EXCLUDED.confidence,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(&scenario.id)
        .bind(&scenario.assessment_id)
        .bind(&scenario.threat_id)
        .bind(&scenario.threat_name)
        .bind(i16::from(scenario.threat_likelihood))
        .bind(i16::from(scenario.vulnerability))
        .bind(i16::from(scenario.impact))
        .bind(scenario.exposure)
        .bind(scenario.inherent_risk)
        .bind(scenario.normalized_risk)
        .bind(scenario.risk_level.as_str())
        .bind(&scenario.scenario_description)
        .bind(&evidence_json)
        .bind(&controls_json)
        .bind(scenario.mode.as_str())
        .bind(scenario.confidence.as_str())
        .bind(scenario.created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            id = %scenario.id,
            assessment_id = %scenario.assessment_id,
            threat = %scenario.threat_id,
            "Upserted risk scenario"
        );
        Ok(())
    }

    /// Get a risk scenario by ID
    pub async fn get_by_id(&self, id: &str) -> Result<RiskScenario, DbError> {
        let row: RiskScenarioRow = sqlx::query_as(
            r#"
            SELECT * FROM risk_scenarios WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(id.to_string()))?;

        row.into_domain().map_err(DbError::Serialization)
    }

    /// List the scenarios of one assessment, ordered by threat id
    pub async fn list(&self, assessment_id: &str) -> Result<Vec<RiskScenario>, DbError> {
        let rows: Vec<RiskScenarioRow> = sqlx::query_as(
            r#"
            SELECT * FROM risk_scenarios
            WHERE assessment_id = $1
            ORDER BY threat_id
            "#,
        )
        .bind(assessment_id)
        .fetch_all(&self.pool)
        .await?;

        let mut scenarios = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_domain() {
                Ok(scenario) => scenarios.push(scenario),
                Err(e) => {
                    tracing::warn!(assessment_id = %assessment_id, error = %e, "Skipping unreadable risk scenario row");
                }
            }
        }
        Ok(scenarios)
    }

    /// Delete all scenarios of an assessment, returning how many were removed
    pub async fn delete_for_assessment(&self, assessment_id: &str) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            DELETE FROM risk_scenarios WHERE assessment_id = $1
            "#,
        )
        .bind(assessment_id)
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            tracing::debug!(assessment_id = %assessment_id, deleted = deleted, "Deleted risk scenarios");
        }

        Ok(deleted)
    }
}

#[async_trait]
impl ScenarioStore for RiskScenarioRepository {
    async fn save(&self, scenario: &RiskScenario) -> Result<(), DbError> {
        self.upsert(scenario).await
    }

    async fn list_for_assessment(&self, assessment_id: &str) -> Result<Vec<RiskScenario>, DbError> {
        self.list(assessment_id).await
    }
}
