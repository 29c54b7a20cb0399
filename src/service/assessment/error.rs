//! Error types for AI-assisted risk scoring

use std::time::Duration;

use thiserror::Error;

/// Any of these sends the threat down the algorithmic fallback path
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AiScoringError {
    #[error("AI scoring request failed: {0}")]
    Request(String),

    #[error("AI scoring timed out after {0:?}")]
    Timeout(Duration),

    #[error("AI scoring output rejected: {}", .0.join("; "))]
    InvalidOutput(Vec<String>),
}
