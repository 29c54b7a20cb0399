pub mod assessment;
pub mod cache;
pub mod cache_keys;
pub mod catalog;
pub mod engine;
pub mod scoring;

pub use assessment::{AiRiskScorer, AiScoringError, OpenAiRiskScorer};
pub use cache::{CacheSettings, ScoreCache};
pub use catalog::{ProfileCatalog, ProfileError};
pub use engine::{AssessmentEngine, EngineError, RunOptions};
