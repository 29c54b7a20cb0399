//! AI-assisted risk scoring using an LLM
//!
//! The scorer only produces raw structured output from a single request.
//! Pacing, retries, validation, clamping and the fallback decision belong to
//! the engine.

use async_trait::async_trait;
use rig::providers::openai;

use crate::model::assessment::ExtractedRiskScores;
use crate::model::{
    DomainProfile, IndicatorResult, InterviewResponseSet, SupplementalContext, ThreatDefinition,
};
use crate::service::cache::ScoreCache;
use crate::service::cache_keys::generate_score_cache_key;
use crate::service::assessment::prompts::{RISK_SCORING_SYSTEM_PROMPT, build_scoring_prompt};
use crate::service::assessment::validation::validate_extracted_scores;

/// Environment variable for the scoring model (defaults to gpt-4o-mini)
const ENV_SCORING_MODEL: &str = "RISK_SCORING_MODEL";

const DEFAULT_MODEL: &str = openai::GPT_4O_MINI;

pub mod confidence;
pub mod converters;
pub mod error;
pub mod prompts;
pub mod validation;

pub use converters::AiScore;
pub use error::AiScoringError;

/// Everything the AI evaluator sees for one threat
#[derive(Debug, Clone, Copy)]
pub struct AiScoringRequest<'a> {
    pub profile: &'a DomainProfile,
    pub threat: &'a ThreatDefinition,
    pub responses: &'a InterviewResponseSet,
    pub context: &'a SupplementalContext,
    /// Run-wide exposure, computed once before any threat is scored
    pub exposure: Option<f64>,
    pub indicators: &'a [IndicatorResult],
}

/// AI collaborator that proposes T, V and I for one threat
#[async_trait]
pub trait AiRiskScorer: Send + Sync {
    /// Model identifier, for logs and provenance
    fn model(&self) -> &str;

    /// One scoring attempt. Implementations must not retry internally: the
    /// engine paces every attempt against the provider.
    async fn score(
        &self,
        request: &AiScoringRequest<'_>,
    ) -> Result<ExtractedRiskScores, AiScoringError>;
}

/// OpenAI-backed scorer using a structured-output extractor
pub struct OpenAiRiskScorer {
    client: openai::Client,
    model: String,
    cache: Option<ScoreCache>,
}

impl OpenAiRiskScorer {
    /// Creates a new scorer
    ///
    /// Uses RISK_SCORING_MODEL when set, gpt-4o-mini otherwise.
    pub fn new(api_key: &str, cache: Option<ScoreCache>) -> Result<Self, String> {
        let client = openai::Client::new(api_key)
            .map_err(|e| format!("Failed to create OpenAI client: {}", e))?;

        let model =
            std::env::var(ENV_SCORING_MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        tracing::info!(
            model = %model,
            cache_enabled = cache.is_some(),
            "AI risk scorer initialized"
        );

        Ok(Self {
            client,
            model,
            cache,
        })
    }

    async fn extract(
        &self,
        threat_id: &str,
        prompt: &str,
    ) -> Result<ExtractedRiskScores, AiScoringError> {
        let start_time = std::time::Instant::now();
        let prompt_length = prompt.len();

        tracing::debug!(
            threat = %threat_id,
            model = %self.model,
            "Initiating OpenAI API call for risk scoring"
        );

        let extractor = self
            .client
            .extractor::<ExtractedRiskScores>(&self.model)
            .preamble(RISK_SCORING_SYSTEM_PROMPT)
            .build();

        match extractor.extract(prompt).await {
            Ok(result) => {
                tracing::info!(
                    threat = %threat_id,
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    prompt_length = prompt_length,
                    "OpenAI API call for risk scoring completed successfully"
                );
                Ok(result)
            }
            Err(e) => {
                tracing::error!(
                    threat = %threat_id,
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    prompt_length = prompt_length,
                    error = %e,
                    "OpenAI API call for risk scoring failed"
                );
                Err(AiScoringError::Request(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl AiRiskScorer for OpenAiRiskScorer {
    fn model(&self) -> &str {
        &self.model
    }

    async fn score(
        &self,
        request: &AiScoringRequest<'_>,
    ) -> Result<ExtractedRiskScores, AiScoringError> {
        let threat_id = request.threat.id.as_str();
        let prompt = build_scoring_prompt(request);
        let cache_key =
            generate_score_cache_key(&request.profile.id, threat_id, &prompt, &self.model);

        if let Some(cache) = &self.cache {
            match cache.get_score::<ExtractedRiskScores>(&cache_key).await {
                Ok(cached) => {
                    tracing::debug!(threat = %threat_id, "AI score served from cache");
                    return Ok(cached);
                }
                Err(e) => {
                    tracing::trace!(threat = %threat_id, error = %e, "AI score cache lookup missed");
                }
            }
        }

        let scores = self.extract(threat_id, &prompt).await?;

        // Only output that passes validation is cached
        if let Some(cache) = &self.cache
            && validate_extracted_scores(&scores, request.profile).is_valid
            && let Err(e) = cache.set_score(&cache_key, &scores).await
        {
            tracing::warn!(threat = %threat_id, error = %e, "Failed to cache AI score");
        }

        Ok(scores)
    }
}
