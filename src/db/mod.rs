//! Scenario persistence: the `ScenarioStore` collaborator and its PostgreSQL
//! and in-memory implementations

pub mod memory;
pub mod models;
pub mod repository;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::env;

use crate::model::RiskScenario;

// Environment variable names
const ENV_POSTGRES_HOST: &str = "RISK_ENGINE_POSTGRES_HOST";
const ENV_POSTGRES_PORT: &str = "RISK_ENGINE_POSTGRES_PORT";
const ENV_POSTGRES_USER: &str = "RISK_ENGINE_POSTGRES_USER";
const ENV_POSTGRES_PASSWORD: &str = "RISK_ENGINE_POSTGRES_PASSWORD";
const ENV_POSTGRES_DB: &str = "RISK_ENGINE_POSTGRES_DB";

// Default values
const DEFAULT_POSTGRES_PORT: &str = "5432";
const DEFAULT_POSTGRES_USER: &str = "risk_engine";
const DEFAULT_POSTGRES_PASSWORD: &str = "risk_engine";
const DEFAULT_POSTGRES_DB: &str = "risk_engine";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Where finished scenarios are written
#[async_trait]
pub trait ScenarioStore: Send + Sync {
    /// Insert or replace the scenario for `(assessment_id, threat_id)`
    async fn save(&self, scenario: &RiskScenario) -> Result<(), DbError>;

    /// All scenarios stored for an assessment, ordered by threat id
    async fn list_for_assessment(&self, assessment_id: &str) -> Result<Vec<RiskScenario>, DbError>;
}

/// PostgreSQL persistence is enabled only when a host is configured
pub fn postgres_configured() -> bool {
    env::var(ENV_POSTGRES_HOST).is_ok_and(|h| !h.trim().is_empty())
}

/// Create a new database connection pool
pub async fn create_pool() -> Result<PgPool, DbError> {
    let host = env::var(ENV_POSTGRES_HOST)
        .map_err(|_| DbError::NotFound(ENV_POSTGRES_HOST.to_string()))?;
    let port = env::var(ENV_POSTGRES_PORT).unwrap_or_else(|_| DEFAULT_POSTGRES_PORT.to_string());
    let user = env::var(ENV_POSTGRES_USER).unwrap_or_else(|_| DEFAULT_POSTGRES_USER.to_string());
    let password =
        env::var(ENV_POSTGRES_PASSWORD).unwrap_or_else(|_| DEFAULT_POSTGRES_PASSWORD.to_string());
    let database = env::var(ENV_POSTGRES_DB).unwrap_or_else(|_| DEFAULT_POSTGRES_DB.to_string());

    let database_url = format!(
        "postgres://{}:{}@{}:{}/{}",
        user, password, host, port, database
    );

    tracing::debug!(host = %host, port = %port, database = %database, "Connecting to PostgreSQL");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    tracing::info!(host = %host, port = %port, "PostgreSQL connection established");

    Ok(pool)
}

/// Initialize database schema
pub async fn init_schema(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS risk_scenarios (
            id VARCHAR(64) PRIMARY KEY,
            assessment_id VARCHAR(128) NOT NULL,
            threat_id VARCHAR(128) NOT NULL,
            threat_name TEXT NOT NULL,
            threat_likelihood SMALLINT NOT NULL,
            vulnerability SMALLINT NOT NULL,
            impact SMALLINT NOT NULL,
            exposure DOUBLE PRECISION,
            inherent_risk DOUBLE PRECISION NOT NULL,
            normalized_risk DOUBLE PRECISION NOT NULL,
            risk_level VARCHAR(16) NOT NULL,
            scenario_description TEXT NOT NULL,
            evidence_trail JSONB NOT NULL DEFAULT '[]',
            suggested_controls JSONB NOT NULL DEFAULT '[]',
            mode VARCHAR(16) NOT NULL,
            confidence VARCHAR(16) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (assessment_id, threat_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_risk_scenarios_risk_level ON risk_scenarios(risk_level)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_risk_scenarios_created_at ON risk_scenarios(created_at)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database schema initialized");

    Ok(())
}
