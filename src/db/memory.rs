//! In-process scenario store, used when PostgreSQL is not configured

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DbError, ScenarioStore};
use crate::model::RiskScenario;

/// Scenarios keyed by `(assessment_id, threat_id)`
#[derive(Default)]
pub struct InMemoryScenarioStore {
    scenarios: RwLock<BTreeMap<(String, String), RiskScenario>>,
}

impl InMemoryScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.scenarios.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.scenarios.read().await.is_empty()
    }
}

#[async_trait]
impl ScenarioStore for InMemoryScenarioStore {
    async fn save(&self, scenario: &RiskScenario) -> Result<(), DbError> {
        let key = (scenario.assessment_id.clone(), scenario.threat_id.clone());
        self.scenarios.write().await.insert(key, scenario.clone());
        Ok(())
    }

    async fn list_for_assessment(&self, assessment_id: &str) -> Result<Vec<RiskScenario>, DbError> {
        let scenarios = self.scenarios.read().await;
        Ok(scenarios
            .iter()
            .filter(|((id, _), _)| id == assessment_id)
            .map(|(_, scenario)| scenario.clone())
            .collect())
    }
}
