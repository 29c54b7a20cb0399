pub mod assessment;
pub mod config;
pub mod context;
pub mod profile;
pub mod response;
pub mod scenario;

pub use config::{Config, EngineSettings, ProfileSources};
pub use context::{CrimeLevel, IncidentRecord, SupplementalContext};
pub use profile::{
    Condition, ConditionRule, ControlDefinition, DomainKind, DomainProfile, ExposureConfig,
    GapAnswer, IncidentIndicator, QuestionKind, QuestionSpec, ScoringConfig, ThreatDefinition,
    Urgency,
};
pub use response::{AnswerValue, InterviewResponseSet};
pub use scenario::{
    AssessmentBatchResult, BatchMode, Confidence, ControlRecommendation, IndicatorResult,
    RiskLevel, RiskScenario, ScoringMode, SecurityPosture,
};
