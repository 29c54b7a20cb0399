//! Application state and service initialization
//!
//! This module centralizes all service initialization and dependency injection,
//! so the binary and tests build the engine the same way.

use std::sync::Arc;

use crate::db::ScenarioStore;
use crate::db::repository::RiskScenarioRepository;
use crate::model::{Config, DomainProfile};
use crate::service::{
    AssessmentEngine, EngineError, OpenAiRiskScorer, ProfileCatalog, ProfileError, ScoreCache,
};

/// Application state containing all services and shared resources
pub struct AppState {
    /// Loaded domain profiles
    pub catalog: ProfileCatalog,
    /// Dual-mode assessment engine
    pub engine: Arc<AssessmentEngine>,
    /// Scenario store (PostgreSQL, optional)
    pub store: Option<Arc<dyn ScenarioStore>>,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// This performs:
    /// 1. Profile catalog loading (built-in plus configured directory)
    /// 2. Database connection and schema initialization, when configured
    /// 3. Redis cache initialization (optional)
    /// 4. AI scorer initialization, when OPENAI_API_KEY is set
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let catalog = ProfileCatalog::load(&config.profiles)?;

        let store = if crate::db::postgres_configured() {
            let db_pool = crate::db::create_pool()
                .await
                .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

            crate::db::init_schema(&db_pool)
                .await
                .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

            Some(Arc::new(RiskScenarioRepository::new(db_pool)) as Arc<dyn ScenarioStore>)
        } else {
            tracing::info!("PostgreSQL not configured, scenarios will not be persisted");
            None
        };

        let scorer = match std::env::var("OPENAI_API_KEY") {
            Ok(api_key) if !api_key.trim().is_empty() => {
                let cache = Self::build_cache().await;
                let scorer = OpenAiRiskScorer::new(&api_key, cache)
                    .map_err(|_| AppError::InvalidConfig("Invalid OPENAI_API_KEY"))?;
                Some(scorer)
            }
            _ => {
                tracing::info!("OPENAI_API_KEY not set, running algorithmic scoring only");
                None
            }
        };

        let mut engine = AssessmentEngine::new(config.engine);
        if let Some(scorer) = scorer {
            engine = engine.with_scorer(Arc::new(scorer));
        }
        if let Some(store) = &store {
            engine = engine.with_store(Arc::clone(store));
        }

        Ok(Self::from_parts(catalog, engine, store))
    }

    /// Assemble state from already-built services
    pub fn from_parts(
        catalog: ProfileCatalog,
        engine: AssessmentEngine,
        store: Option<Arc<dyn ScenarioStore>>,
    ) -> Self {
        Self {
            catalog,
            engine: Arc::new(engine),
            store,
        }
    }

    /// Look up a loaded profile by id
    pub fn profile(&self, id: &str) -> Result<Arc<DomainProfile>, EngineError> {
        self.catalog
            .get(id)
            .ok_or_else(|| EngineError::UnknownProfile(id.to_string()))
    }

    /// Initialize Redis cache (optional - will log warning if Redis is unavailable)
    async fn build_cache() -> Option<ScoreCache> {
        match ScoreCache::new().await {
            Ok(cache) => {
                tracing::info!("Redis cache enabled");
                Some(cache)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis cache unavailable, running without cache");
                None
            }
        }
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Database initialization failed
    #[error("Database initialization failed: {0}")]
    DatabaseInit(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// A domain profile could not be loaded
    #[error(transparent)]
    Profile(#[from] ProfileError),
}
