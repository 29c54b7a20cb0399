//! Dual-mode assessment orchestration
//!
//! Every threat of a profile runs through a small state machine:
//! `Pending -> AiAttempted -> AiSucceeded | AiFailed -> AlgorithmicFallback -> Done`.
//! Without an AI scorer (or with `algorithmic_only`) the machine goes straight
//! from `Pending` to `AlgorithmicFallback`. Whatever happens on the AI path, a
//! threat always ends with a valid scenario.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::db::ScenarioStore;
use crate::model::assessment::ExtractedRiskScores;
use crate::model::{
    AssessmentBatchResult, Confidence, ControlRecommendation, DomainProfile, EngineSettings,
    IndicatorResult, InterviewResponseSet, RiskLevel, RiskScenario, ScoringMode, SecurityPosture,
    SupplementalContext, ThreatDefinition,
};
use crate::service::assessment::confidence::{batch_confidence, batch_mode, coverage_confidence};
use crate::service::assessment::converters::{ai_controls, convert_scores};
use crate::service::assessment::validation::validate_extracted_scores;
use crate::service::assessment::{AiRiskScorer, AiScore, AiScoringError, AiScoringRequest};
use crate::service::scoring::components::exposure;
use crate::service::scoring::{
    ComponentScores, ExposureScore, classify_indicators, compose, narrate, recommend, score_threat,
};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("Unknown threat: {0}")]
    UnknownThreat(String),

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("An assessment run is already in progress for {0}")]
    RunInProgress(String),

    #[error("Profile {0} produced no risk scenarios")]
    NoScenarios(String),
}

/// Per-run switches
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip the AI evaluator even when one is configured
    pub algorithmic_only: bool,
}

/// Enforces a minimum spacing between AI calls across all workers
struct RatePacer {
    interval: Duration,
    last_call: tokio::sync::Mutex<Option<Instant>>,
}

impl RatePacer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: tokio::sync::Mutex::new(None),
        }
    }

    async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }

        // The lock is held through the sleep so waiting workers queue up
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

/// Releases an assessment id when its run ends, however it ends
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    assessment_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.assessment_id);
    }
}

/// Inputs shared by every threat of one run
struct RunContext<'a> {
    profile: &'a DomainProfile,
    assessment_id: &'a str,
    responses: &'a InterviewResponseSet,
    context: &'a SupplementalContext,
    exposure: Option<&'a ExposureScore>,
    indicators: &'a [IndicatorResult],
    scorer: Option<&'a dyn AiRiskScorer>,
}

enum ThreatState {
    Pending,
    AiAttempted,
    AiSucceeded(AiScore),
    AiFailed(AiScoringError),
    AlgorithmicFallback { ai_failed: bool },
    Done(RiskScenario),
}

/// Scores every threat of a profile and hands the scenarios to the store
pub struct AssessmentEngine {
    scorer: Option<Arc<dyn AiRiskScorer>>,
    store: Option<Arc<dyn ScenarioStore>>,
    settings: EngineSettings,
    pacer: RatePacer,
    in_flight: Mutex<HashSet<String>>,
}

impl AssessmentEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            scorer: None,
            store: None,
            pacer: RatePacer::new(settings.ai_pacing()),
            settings,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn AiRiskScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ScenarioStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn ai_enabled(&self) -> bool {
        self.scorer.is_some()
    }

    fn claim(&self, assessment_id: &str) -> Result<InFlightGuard<'_>, EngineError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(assessment_id.to_string()) {
            return Err(EngineError::RunInProgress(assessment_id.to_string()));
        }
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            assessment_id: assessment_id.to_string(),
        })
    }

    fn scorer_for(&self, options: RunOptions) -> Option<&dyn AiRiskScorer> {
        if options.algorithmic_only {
            None
        } else {
            self.scorer.as_deref()
        }
    }

    /// Score every threat of the profile and summarize the batch
    pub async fn run(
        &self,
        profile: Arc<DomainProfile>,
        assessment_id: &str,
        responses: &InterviewResponseSet,
        context: &SupplementalContext,
        options: RunOptions,
    ) -> Result<AssessmentBatchResult, EngineError> {
        let _guard = self.claim(assessment_id)?;
        let start_time = std::time::Instant::now();
        let scorer = self.scorer_for(options);

        tracing::info!(
            assessment_id = %assessment_id,
            profile = %profile.id,
            threats = profile.threats.len(),
            responses = responses.len(),
            ai_enabled = scorer.is_some(),
            "Starting risk assessment run"
        );

        // Exposure is a property of the subject, not of a threat
        let exposure_score = exposure(&profile, responses);
        let indicators = classify_indicators(&profile, responses);

        let ctx = RunContext {
            profile: &profile,
            assessment_id,
            responses,
            context,
            exposure: exposure_score.as_ref(),
            indicators: &indicators,
            scorer,
        };

        let results: BTreeMap<String, (RiskScenario, bool)> = stream::iter(profile.threats.iter())
            .map(|threat| self.assess_and_store(&ctx, threat))
            .buffer_unordered(self.settings.concurrency())
            .map(|(scenario, stored)| (scenario.threat_id.clone(), (scenario, stored)))
            .collect()
            .await;

        if results.is_empty() {
            tracing::error!(assessment_id = %assessment_id, profile = %profile.id, "Assessment run produced no scenarios");
            return Err(EngineError::NoScenarios(profile.id.clone()));
        }

        let mut risk_scenario_ids = Vec::with_capacity(results.len());
        let mut scenarios = Vec::with_capacity(results.len());
        for (scenario, stored) in results.into_values() {
            if stored {
                risk_scenario_ids.push(scenario.id.clone());
            }
            scenarios.push(scenario);
        }

        let count = |level: RiskLevel| scenarios.iter().filter(|s| s.risk_level == level).count();
        let batch = AssessmentBatchResult {
            success: true,
            assessment_id: assessment_id.to_string(),
            profile: profile.id.clone(),
            mode: batch_mode(&scenarios),
            generated_scenarios: scenarios.len(),
            critical_risks: count(RiskLevel::Critical),
            high_risks: count(RiskLevel::High),
            medium_risks: count(RiskLevel::Medium),
            low_risks: count(RiskLevel::Low),
            risk_scenario_ids,
            overall_posture: SecurityPosture::from_levels(scenarios.iter().map(|s| s.risk_level)),
            confidence: batch_confidence(&scenarios),
            processing_time_ms: start_time.elapsed().as_millis() as u64,
            exposure: exposure_score.map(|e| e.value),
            indicators,
            scenarios,
        };

        tracing::info!(
            assessment_id = %assessment_id,
            profile = %batch.profile,
            mode = ?batch.mode,
            scenarios = batch.generated_scenarios,
            critical = batch.critical_risks,
            high = batch.high_risks,
            elapsed_ms = batch.processing_time_ms,
            "Risk assessment run completed"
        );

        Ok(batch)
    }

    /// Score a single threat of the profile
    pub async fn assess_threat(
        &self,
        profile: Arc<DomainProfile>,
        assessment_id: &str,
        threat_id: &str,
        responses: &InterviewResponseSet,
        context: &SupplementalContext,
        options: RunOptions,
    ) -> Result<RiskScenario, EngineError> {
        let threat = profile
            .threat(threat_id)
            .ok_or_else(|| EngineError::UnknownThreat(threat_id.to_string()))?;
        let _guard = self.claim(assessment_id)?;

        let exposure_score = exposure(&profile, responses);
        let indicators = classify_indicators(&profile, responses);
        let ctx = RunContext {
            profile: &profile,
            assessment_id,
            responses,
            context,
            exposure: exposure_score.as_ref(),
            indicators: &indicators,
            scorer: self.scorer_for(options),
        };

        let (scenario, _) = self.assess_and_store(&ctx, threat).await;
        Ok(scenario)
    }

    /// Score one threat, then persist it; the flag reports whether the write succeeded
    async fn assess_and_store(
        &self,
        ctx: &RunContext<'_>,
        threat: &ThreatDefinition,
    ) -> (RiskScenario, bool) {
        let scenario = self.assess(ctx, threat).await;

        let Some(store) = &self.store else {
            return (scenario, true);
        };

        match store.save(&scenario).await {
            Ok(()) => (scenario, true),
            Err(e) => {
                tracing::error!(
                    assessment_id = %ctx.assessment_id,
                    threat = %threat.id,
                    error = %e,
                    "Failed to persist risk scenario"
                );
                (scenario, false)
            }
        }
    }

    async fn assess(&self, ctx: &RunContext<'_>, threat: &ThreatDefinition) -> RiskScenario {
        let mut state = ThreatState::Pending;
        loop {
            state = match state {
                ThreatState::Pending => match ctx.scorer {
                    Some(_) => ThreatState::AiAttempted,
                    None => ThreatState::AlgorithmicFallback { ai_failed: false },
                },
                ThreatState::AiAttempted => match self.try_ai(ctx, threat).await {
                    Ok(score) => ThreatState::AiSucceeded(score),
                    Err(e) => ThreatState::AiFailed(e),
                },
                ThreatState::AiSucceeded(score) => {
                    ThreatState::Done(self.ai_scenario(ctx, threat, score))
                }
                ThreatState::AiFailed(e) => {
                    tracing::warn!(
                        assessment_id = %ctx.assessment_id,
                        threat = %threat.id,
                        reason = %e,
                        "AI scoring failed, falling back to algorithmic scoring"
                    );
                    ThreatState::AlgorithmicFallback { ai_failed: true }
                }
                ThreatState::AlgorithmicFallback { ai_failed } => {
                    ThreatState::Done(algorithmic_scenario(ctx, threat, ai_failed))
                }
                ThreatState::Done(scenario) => return scenario,
            };
        }
    }

    async fn try_ai(
        &self,
        ctx: &RunContext<'_>,
        threat: &ThreatDefinition,
    ) -> Result<AiScore, AiScoringError> {
        let Some(scorer) = ctx.scorer else {
            return Err(AiScoringError::Request("No AI scorer configured".to_string()));
        };

        let request = AiScoringRequest {
            profile: ctx.profile,
            threat,
            responses: ctx.responses,
            context: ctx.context,
            exposure: ctx.exposure.map(|e| e.value),
            indicators: ctx.indicators,
        };

        let timeout = self.settings.ai_timeout();
        let extracted = tokio::time::timeout(timeout, self.score_paced(scorer, &request))
            .await
            .map_err(|_| AiScoringError::Timeout(timeout))??;

        let validation = validate_extracted_scores(&extracted, ctx.profile);
        if !validation.is_valid {
            return Err(AiScoringError::InvalidOutput(validation.errors));
        }
        for warning in &validation.warnings {
            tracing::warn!(threat = %threat.id, warning = %warning, "AI score repaired");
        }

        convert_scores(extracted, ctx.profile).ok_or_else(|| {
            AiScoringError::InvalidOutput(vec!["component scores unusable".to_string()])
        })
    }

    /// Request scores with bounded retries. Every attempt, first or retried,
    /// takes its turn at the pacer.
    async fn score_paced(
        &self,
        scorer: &dyn AiRiskScorer,
        request: &AiScoringRequest<'_>,
    ) -> Result<ExtractedRiskScores, AiScoringError> {
        let threat_id = request.threat.id.as_str();
        let max_retries = self.settings.ai_max_retries;
        let mut attempt = 0;

        loop {
            self.pacer.wait().await;
            match scorer.score(request).await {
                Ok(scores) => {
                    if attempt > 0 {
                        tracing::info!(threat = %threat_id, attempt, "AI scoring succeeded after retry");
                    }
                    return Ok(scores);
                }
                Err(AiScoringError::Request(reason)) if attempt < max_retries => {
                    let delay = self.settings.retry_delay(attempt);
                    attempt += 1;
                    tracing::warn!(
                        threat = %threat_id,
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis(),
                        error = %reason,
                        "AI scoring failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn ai_scenario(
        &self,
        ctx: &RunContext<'_>,
        threat: &ThreatDefinition,
        score: AiScore,
    ) -> RiskScenario {
        let profile = ctx.profile;
        let scale = profile.scoring.scale_max;
        let scores = ComponentScores {
            threat_likelihood: score.threat_likelihood,
            vulnerability: score.vulnerability,
            impact: score.impact,
            exposure: ctx.exposure.map(|e| e.value),
        };
        let risk = compose(
            scores.threat_likelihood,
            scores.vulnerability,
            scores.impact,
            scores.exposure,
            &profile.scoring,
        );

        let model = ctx.scorer.map(|s| s.model()).unwrap_or("unknown");
        let mut evidence_trail = vec![
            format!("Scored by AI evaluator ({})", model),
            format!("Threat likelihood {}/{}", scores.threat_likelihood, scale),
            format!("Vulnerability {}/{}", scores.vulnerability, scale),
            format!("Impact {}/{}", scores.impact, scale),
        ];
        if let Some(exposure) = ctx.exposure {
            evidence_trail.push(format!("Exposure {:.1}", exposure.value));
            evidence_trail.extend(exposure.evidence.iter().cloned());
        }
        evidence_trail.extend(score.evidence);

        let scenario_description = score
            .scenario_description
            .unwrap_or_else(|| narrate(profile, threat, &scores, ctx.responses));

        let suggested_controls = merge_controls(
            recommend(profile, ctx.responses, Some(&threat.id)),
            ai_controls(profile, &score.suggested_controls),
        );

        RiskScenario {
            id: uuid::Uuid::new_v4().to_string(),
            assessment_id: ctx.assessment_id.to_string(),
            threat_id: threat.id.clone(),
            threat_name: threat.name.clone(),
            threat_likelihood: scores.threat_likelihood,
            vulnerability: scores.vulnerability,
            impact: scores.impact,
            exposure: scores.exposure,
            inherent_risk: risk.inherent_risk,
            normalized_risk: risk.normalized_risk,
            risk_level: risk.risk_level,
            scenario_description,
            evidence_trail,
            suggested_controls,
            mode: ScoringMode::Ai,
            confidence: score.confidence,
            created_at: Utc::now(),
        }
    }
}

fn algorithmic_scenario(
    ctx: &RunContext<'_>,
    threat: &ThreatDefinition,
    ai_failed: bool,
) -> RiskScenario {
    let score = score_threat(ctx.profile, threat, ctx.responses, ctx.context, ctx.exposure);

    let confidence = if ai_failed {
        Confidence::Fallback
    } else {
        coverage_confidence(score.coverage)
    };

    let mut evidence_trail = score.evidence_trail;
    if ai_failed {
        evidence_trail.insert(0, "AI evaluator unavailable; scored algorithmically".to_string());
    }

    RiskScenario {
        id: uuid::Uuid::new_v4().to_string(),
        assessment_id: ctx.assessment_id.to_string(),
        threat_id: threat.id.clone(),
        threat_name: threat.name.clone(),
        threat_likelihood: score.scores.threat_likelihood,
        vulnerability: score.scores.vulnerability,
        impact: score.scores.impact,
        exposure: score.scores.exposure,
        inherent_risk: score.risk.inherent_risk,
        normalized_risk: score.risk.normalized_risk,
        risk_level: score.risk.risk_level,
        scenario_description: score.scenario_description,
        evidence_trail,
        suggested_controls: score.suggested_controls,
        mode: ScoringMode::Algorithmic,
        confidence,
        created_at: Utc::now(),
    }
}

/// Threat-driven controls keep their order; AI picks only append new ids
fn merge_controls(
    rules: Vec<ControlRecommendation>,
    ai: Vec<ControlRecommendation>,
) -> Vec<ControlRecommendation> {
    let mut seen = HashSet::new();
    rules
        .into_iter()
        .chain(ai)
        .filter(|c| seen.insert(c.control_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbError;
    use crate::db::memory::InMemoryScenarioStore;
    use crate::model::assessment::ExtractedConfidence;
    use crate::model::{AnswerValue, BatchMode};
    use crate::service::catalog::builtin_profile;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings() -> EngineSettings {
        EngineSettings {
            ai_timeout_secs: 1,
            ai_pacing_ms: 0,
            max_concurrency: 4,
            ai_max_retries: 0,
            ai_retry_delay_ms: 0,
        }
    }

    fn warehouse() -> Arc<DomainProfile> {
        Arc::new(builtin_profile("warehouse").unwrap())
    }

    fn responses() -> InterviewResponseSet {
        InterviewResponseSet::new()
            .with("perimeter_fence", AnswerValue::Flag(false))
            .with("alarm_system", AnswerValue::text("No alarm"))
            .with("incident_1", AnswerValue::text("yes"))
    }

    fn good_scores() -> ExtractedRiskScores {
        ExtractedRiskScores {
            threat_likelihood: Some(4.0),
            vulnerability: Some(3.0),
            impact: Some(5.0),
            confidence: Some(ExtractedConfidence::High),
            evidence: Some(vec!["Perimeter fence is missing".to_string()]),
            scenario_description: Some("A crew enters through the open perimeter.".to_string()),
            suggested_controls: Some(vec![
                "perimeter_fencing".to_string(),
                "perimeter_fencing".to_string(),
                "teleporter".to_string(),
            ]),
        }
    }

    struct FixedScorer {
        scores: ExtractedRiskScores,
        calls: AtomicUsize,
    }

    impl FixedScorer {
        fn new(scores: ExtractedRiskScores) -> Self {
            Self {
                scores,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AiRiskScorer for FixedScorer {
        fn model(&self) -> &str {
            "fixed"
        }

        async fn score(
            &self,
            _request: &AiScoringRequest<'_>,
        ) -> Result<ExtractedRiskScores, AiScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.scores.clone())
        }
    }

    struct FailingScorer;

    #[async_trait]
    impl AiRiskScorer for FailingScorer {
        fn model(&self) -> &str {
            "failing"
        }

        async fn score(
            &self,
            _request: &AiScoringRequest<'_>,
        ) -> Result<ExtractedRiskScores, AiScoringError> {
            Err(AiScoringError::Request("connection refused".to_string()))
        }
    }

    struct SlowScorer;

    #[async_trait]
    impl AiRiskScorer for SlowScorer {
        fn model(&self) -> &str {
            "slow"
        }

        async fn score(
            &self,
            _request: &AiScoringRequest<'_>,
        ) -> Result<ExtractedRiskScores, AiScoringError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(good_scores())
        }
    }

    /// Succeeds for fire only
    struct FireOnlyScorer;

    #[async_trait]
    impl AiRiskScorer for FireOnlyScorer {
        fn model(&self) -> &str {
            "fire-only"
        }

        async fn score(
            &self,
            request: &AiScoringRequest<'_>,
        ) -> Result<ExtractedRiskScores, AiScoringError> {
            if request.threat.id == "fire" {
                Ok(good_scores())
            } else {
                Err(AiScoringError::Request("rate limited".to_string()))
            }
        }
    }

    /// Fails the first attempt for every threat, then succeeds; records call times
    struct FlakyScorer {
        seen: Mutex<HashSet<String>>,
        call_times: Mutex<Vec<Instant>>,
    }

    impl FlakyScorer {
        fn new() -> Self {
            Self {
                seen: Mutex::new(HashSet::new()),
                call_times: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AiRiskScorer for FlakyScorer {
        fn model(&self) -> &str {
            "flaky"
        }

        async fn score(
            &self,
            request: &AiScoringRequest<'_>,
        ) -> Result<ExtractedRiskScores, AiScoringError> {
            self.call_times.lock().unwrap().push(Instant::now());
            let first_attempt = self.seen.lock().unwrap().insert(request.threat.id.clone());
            if first_attempt {
                Err(AiScoringError::Request("429 too many requests".to_string()))
            } else {
                Ok(good_scores())
            }
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ScenarioStore for FailingStore {
        async fn save(&self, _scenario: &RiskScenario) -> Result<(), DbError> {
            Err(DbError::Serialization("disk full".to_string()))
        }

        async fn list_for_assessment(&self, _assessment_id: &str) -> Result<Vec<RiskScenario>, DbError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_failing_ai_always_falls_back() {
        let engine = AssessmentEngine::new(settings()).with_scorer(Arc::new(FailingScorer));
        let profile = warehouse();

        let batch = engine
            .run(
                Arc::clone(&profile),
                "a-1",
                &responses(),
                &SupplementalContext::default(),
                RunOptions::default(),
            )
            .await
            .unwrap();

        assert!(batch.success);
        assert_eq!(batch.generated_scenarios, profile.threats.len());
        assert_eq!(batch.mode, BatchMode::Algorithmic);
        assert_eq!(batch.confidence, Confidence::Fallback);
        for scenario in &batch.scenarios {
            assert_eq!(scenario.mode, ScoringMode::Algorithmic);
            assert_eq!(scenario.confidence, Confidence::Fallback);
            assert!((1..=5).contains(&scenario.threat_likelihood));
            assert!((1..=5).contains(&scenario.vulnerability));
            assert!((1..=5).contains(&scenario.impact));
            assert!(!scenario.scenario_description.is_empty());
        }
    }

    #[tokio::test]
    async fn test_successful_ai_scores() {
        let scorer = Arc::new(FixedScorer::new(good_scores()));
        let engine = AssessmentEngine::new(settings()).with_scorer(scorer.clone());
        let profile = warehouse();

        let batch = engine
            .run(
                Arc::clone(&profile),
                "a-1",
                &responses(),
                &SupplementalContext::default(),
                RunOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(scorer.calls.load(Ordering::SeqCst), profile.threats.len());
        assert_eq!(batch.mode, BatchMode::Ai);
        assert_eq!(batch.confidence, Confidence::High);
        assert_eq!(batch.medium_risks, profile.threats.len());

        let cargo = batch
            .scenarios
            .iter()
            .find(|s| s.threat_id == "cargo_theft")
            .unwrap();
        assert_eq!(cargo.mode, ScoringMode::Ai);
        assert_eq!(cargo.inherent_risk, 60.0);
        assert!((cargo.normalized_risk - 48.0).abs() < 1e-9);
        assert_eq!(cargo.risk_level, RiskLevel::Medium);
        assert_eq!(cargo.scenario_description, "A crew enters through the open perimeter.");
        let expected_first = recommend(&profile, &responses(), Some("cargo_theft"));
        assert_eq!(cargo.suggested_controls[0].control_id, expected_first[0].control_id);
        assert_eq!(cargo.suggested_controls[0].control_id, "seal_program");
        assert_eq!(
            cargo
                .suggested_controls
                .iter()
                .filter(|c| c.control_id == "perimeter_fencing")
                .count(),
            1
        );
        assert!(cargo.suggested_controls.iter().all(|c| c.control_id != "teleporter"));
        assert!(cargo.evidence_trail.iter().any(|e| e.contains("(fixed)")));
    }

    #[tokio::test]
    async fn test_invalid_ai_output_falls_back() {
        let scores = ExtractedRiskScores {
            impact: None,
            ..good_scores()
        };
        let engine =
            AssessmentEngine::new(settings()).with_scorer(Arc::new(FixedScorer::new(scores)));

        let scenario = engine
            .assess_threat(
                warehouse(),
                "a-1",
                "cargo_theft",
                &responses(),
                &SupplementalContext::default(),
                RunOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(scenario.mode, ScoringMode::Algorithmic);
        assert_eq!(scenario.confidence, Confidence::Fallback);
    }

    #[tokio::test]
    async fn test_out_of_scale_ai_output_is_clamped() {
        let scores = ExtractedRiskScores {
            threat_likelihood: Some(9.4),
            vulnerability: Some(0.2),
            confidence: None,
            ..good_scores()
        };
        let engine =
            AssessmentEngine::new(settings()).with_scorer(Arc::new(FixedScorer::new(scores)));

        let scenario = engine
            .assess_threat(
                warehouse(),
                "a-1",
                "fire",
                &responses(),
                &SupplementalContext::default(),
                RunOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(scenario.mode, ScoringMode::Ai);
        assert_eq!(scenario.threat_likelihood, 5);
        assert_eq!(scenario.vulnerability, 1);
        assert_eq!(scenario.confidence, Confidence::Medium);
    }

    #[tokio::test]
    async fn test_slow_ai_times_out_to_fallback() {
        let engine = AssessmentEngine::new(EngineSettings {
            max_concurrency: 8,
            ..settings()
        })
        .with_scorer(Arc::new(SlowScorer));

        let batch = engine
            .run(
                warehouse(),
                "a-1",
                &responses(),
                &SupplementalContext::default(),
                RunOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(batch.mode, BatchMode::Algorithmic);
        assert!(batch.scenarios.iter().all(|s| s.confidence == Confidence::Fallback));
    }

    #[tokio::test]
    async fn test_partial_ai_success_is_hybrid() {
        let engine = AssessmentEngine::new(settings()).with_scorer(Arc::new(FireOnlyScorer));

        let batch = engine
            .run(
                warehouse(),
                "a-1",
                &responses(),
                &SupplementalContext::default(),
                RunOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(batch.mode, BatchMode::Hybrid);
        assert_eq!(batch.confidence, Confidence::Fallback);
        let ai: Vec<_> = batch
            .scenarios
            .iter()
            .filter(|s| s.mode == ScoringMode::Ai)
            .map(|s| s.threat_id.as_str())
            .collect();
        assert_eq!(ai, vec!["fire"]);
    }

    #[tokio::test]
    async fn test_algorithmic_only_skips_scorer() {
        let scorer = Arc::new(FixedScorer::new(good_scores()));
        let engine = AssessmentEngine::new(settings()).with_scorer(scorer.clone());

        let batch = engine
            .run(
                warehouse(),
                "a-1",
                &responses(),
                &SupplementalContext::default(),
                RunOptions {
                    algorithmic_only: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(batch.mode, BatchMode::Algorithmic);
        assert!(batch.scenarios.iter().all(|s| s.confidence != Confidence::Fallback));
    }

    #[tokio::test]
    async fn test_algorithmic_runs_are_idempotent() {
        let engine = AssessmentEngine::new(settings());
        let profile = warehouse();
        let context = SupplementalContext::default();

        let first = engine
            .run(Arc::clone(&profile), "a-1", &responses(), &context, RunOptions::default())
            .await
            .unwrap();
        let second = engine
            .run(Arc::clone(&profile), "a-1", &responses(), &context, RunOptions::default())
            .await
            .unwrap();

        assert_eq!(first.generated_scenarios, second.generated_scenarios);
        for (a, b) in first.scenarios.iter().zip(&second.scenarios) {
            assert_eq!(a.threat_id, b.threat_id);
            assert_eq!(a.inherent_risk, b.inherent_risk);
            assert_eq!(a.risk_level, b.risk_level);
            assert_eq!(a.confidence, b.confidence);
            assert_eq!(a.scenario_description, b.scenario_description);
            assert_eq!(a.evidence_trail, b.evidence_trail);
            assert_eq!(a.suggested_controls, b.suggested_controls);
        }
        assert_eq!(first.overall_posture, second.overall_posture);
    }

    #[tokio::test]
    async fn test_scenarios_reach_the_store() {
        let store = Arc::new(InMemoryScenarioStore::new());
        let engine = AssessmentEngine::new(settings()).with_store(store.clone());
        let profile = warehouse();

        let batch = engine
            .run(
                Arc::clone(&profile),
                "a-1",
                &responses(),
                &SupplementalContext::default(),
                RunOptions::default(),
            )
            .await
            .unwrap();

        let stored = store.list_for_assessment("a-1").await.unwrap();
        assert_eq!(stored.len(), profile.threats.len());
        assert_eq!(batch.risk_scenario_ids.len(), profile.threats.len());
        for scenario in &stored {
            assert!(batch.risk_scenario_ids.contains(&scenario.id));
        }
    }

    #[tokio::test]
    async fn test_store_failures_omit_ids_but_keep_scenarios() {
        let engine = AssessmentEngine::new(settings()).with_store(Arc::new(FailingStore));

        let batch = engine
            .run(
                warehouse(),
                "a-1",
                &responses(),
                &SupplementalContext::default(),
                RunOptions::default(),
            )
            .await
            .unwrap();

        assert!(batch.success);
        assert!(batch.risk_scenario_ids.is_empty());
        assert_eq!(batch.generated_scenarios, batch.scenarios.len());
        assert!(batch.generated_scenarios > 0);
    }

    #[tokio::test]
    async fn test_concurrent_run_for_same_assessment_is_rejected() {
        let engine = AssessmentEngine::new(settings());
        let guard = engine.claim("a-1").unwrap();

        let result = engine
            .run(
                warehouse(),
                "a-1",
                &responses(),
                &SupplementalContext::default(),
                RunOptions::default(),
            )
            .await;
        assert!(matches!(result, Err(EngineError::RunInProgress(id)) if id == "a-1"));

        drop(guard);
        assert!(
            engine
                .run(
                    warehouse(),
                    "a-1",
                    &responses(),
                    &SupplementalContext::default(),
                    RunOptions::default(),
                )
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_unknown_threat_fails_fast() {
        let engine = AssessmentEngine::new(settings());
        let result = engine
            .assess_threat(
                warehouse(),
                "a-1",
                "meteor_strike",
                &responses(),
                &SupplementalContext::default(),
                RunOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(EngineError::UnknownThreat(id)) if id == "meteor_strike"));
    }

    #[tokio::test]
    async fn test_person_profile_carries_exposure() {
        let engine = AssessmentEngine::new(settings());
        let profile = Arc::new(builtin_profile("executive_protection").unwrap());

        let batch = engine
            .run(
                profile,
                "exec-1",
                &InterviewResponseSet::new(),
                &SupplementalContext::default(),
                RunOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(batch.exposure, Some(1.0));
        let kidnapping = batch
            .scenarios
            .iter()
            .find(|s| s.threat_id == "kidnapping")
            .unwrap();
        assert_eq!(kidnapping.inherent_risk, 200.0);
        assert_eq!(kidnapping.risk_level, RiskLevel::Low);
        assert_eq!(kidnapping.confidence, Confidence::Low);
    }

    #[tokio::test]
    async fn test_retries_respect_pacing() {
        let scorer = Arc::new(FlakyScorer::new());
        let engine = AssessmentEngine::new(EngineSettings {
            ai_timeout_secs: 30,
            ai_pacing_ms: 100,
            max_concurrency: 4,
            ai_max_retries: 1,
            ai_retry_delay_ms: 0,
        })
        .with_scorer(scorer.clone());
        let profile = warehouse();

        let batch = engine
            .run(
                Arc::clone(&profile),
                "a-1",
                &responses(),
                &SupplementalContext::default(),
                RunOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(batch.mode, BatchMode::Ai);

        let mut times = scorer.call_times.lock().unwrap().clone();
        assert_eq!(times.len(), profile.threats.len() * 2);
        times.sort();
        for pair in times.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(90), "calls only {:?} apart", gap);
        }
    }

    #[tokio::test]
    async fn test_exhausted_retries_fall_back() {
        let engine = AssessmentEngine::new(EngineSettings {
            ai_max_retries: 2,
            ai_retry_delay_ms: 1,
            ..settings()
        })
        .with_scorer(Arc::new(FailingScorer));

        let scenario = engine
            .assess_threat(
                warehouse(),
                "a-1",
                "fire",
                &responses(),
                &SupplementalContext::default(),
                RunOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(scenario.mode, ScoringMode::Algorithmic);
        assert_eq!(scenario.confidence, Confidence::Fallback);
    }

    #[tokio::test]
    async fn test_pacer_spaces_calls() {
        let pacer = RatePacer::new(Duration::from_millis(50));
        let start = Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_merge_controls_dedupes() {
        let control = |id: &str| ControlRecommendation {
            control_id: id.to_string(),
            name: id.to_string(),
            rationale: String::new(),
            urgency: Default::default(),
        };
        let rules = vec![control("fence"), control("cctv")];
        let ai = vec![control("guard"), control("cctv")];
        let merged = merge_controls(rules, ai);
        let ids: Vec<_> = merged.iter().map(|c| c.control_id.as_str()).collect();
        assert_eq!(ids, vec!["fence", "cctv", "guard"]);
    }
}
