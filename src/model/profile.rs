//! Domain profiles: the reference data that drives scoring for one assessment domain
//!
//! A profile bundles the scoring constants, the threat catalog, the interview
//! question rules and every lookup table the scorers consult. Profiles are
//! loaded once at startup (see `service::catalog`) and shared read-only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of subject being assessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    /// Sites and buildings, scored on a 1–5 scale
    Facility,
    /// Individuals (executive protection), scored on a 1–10 scale with Exposure
    Person,
}

/// Per-domain scoring constants, passed explicitly into every scorer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Upper bound of the T/V/I scale (lower bound is always 1)
    pub scale_max: u8,
    /// Vulnerability score before any risk factors are applied
    pub vulnerability_baseline: u8,
    /// Tally divisor; larger values grow vulnerability more conservatively
    pub vulnerability_divisor: i32,
    /// Denominator used to map inherent risk onto 0–100
    pub normalization_ceiling: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatDefinition {
    pub id: String,
    pub name: String,
    pub category: String,
    pub baseline_threat: u8,
    pub baseline_impact: u8,
    pub description: String,
    #[serde(default)]
    pub standards_reference: Option<String>,
    /// Receives the neighborhood crime boost from supplemental context
    #[serde(default)]
    pub crime_sensitive: bool,
}

/// Which answer to a yes/no question counts as a gap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapAnswer {
    /// A protective control is missing when the answer is "no"
    #[default]
    Negative,
    /// A risk condition is present when the answer is "yes"
    Affirmative,
}

fn one() -> i32 {
    1
}

fn two() -> i32 {
    2
}

fn poor_at_most() -> i64 {
    2
}

fn good_at_least() -> i64 {
    4
}

/// Type-specific weighting rule for one question
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
    Boolean {
        #[serde(default)]
        gap_when: GapAnswer,
        #[serde(default = "one")]
        weight: i32,
        #[serde(default)]
        protective_credit: i32,
    },
    Rating {
        #[serde(default = "poor_at_most")]
        poor_at_most: i64,
        #[serde(default = "two")]
        poor_weight: i32,
        #[serde(default = "good_at_least")]
        good_at_least: i64,
        #[serde(default)]
        good_credit: i32,
    },
    MultiSelect {
        #[serde(default)]
        risk_indicators: Vec<String>,
        #[serde(default = "one")]
        indicator_weight: i32,
        #[serde(default)]
        protective_tokens: Vec<String>,
        #[serde(default)]
        missing_penalty: i32,
    },
    Text {
        #[serde(default)]
        risk_indicators: Vec<String>,
        #[serde(default = "one")]
        indicator_weight: i32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub id: String,
    pub section: String,
    pub prompt: String,
    /// Threats this question bears on; empty means every threat in the profile
    #[serde(default)]
    pub threats: Vec<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub suggests_controls: Vec<String>,
}

impl QuestionSpec {
    pub fn applies_to(&self, threat_id: &str) -> bool {
        self.threats.is_empty() || self.threats.iter().any(|t| t == threat_id)
    }
}

/// Predicate over a single answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionRule {
    Contains(String),
    AnyOf(Vec<String>),
    Affirmative,
    Negative,
    RatingAtMost(i64),
    RatingAtLeast(i64),
}

/// A rule bound to a question id, e.g. `{ question: incident_1, affirmative: true }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "RawCondition")]
pub struct Condition {
    pub question: String,
    pub rule: ConditionRule,
}

impl Condition {
    pub fn new(question: impl Into<String>, rule: ConditionRule) -> Self {
        Self {
            question: question.into(),
            rule,
        }
    }

    /// Short description for evidence lines
    pub fn describe(&self) -> String {
        match &self.rule {
            ConditionRule::Contains(p) => format!("{} mentions '{}'", self.question, p),
            ConditionRule::AnyOf(ps) => format!("{} mentions one of [{}]", self.question, ps.join(", ")),
            ConditionRule::Affirmative => format!("{} = yes", self.question),
            ConditionRule::Negative => format!("{} = no", self.question),
            ConditionRule::RatingAtMost(n) => format!("{} rated <= {}", self.question, n),
            ConditionRule::RatingAtLeast(n) => format!("{} rated >= {}", self.question, n),
        }
    }
}

/// Flat on-disk shape of a condition; exactly one rule field must be set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCondition {
    question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contains: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    any_of: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    affirmative: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    negative: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rating_at_most: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rating_at_least: Option<i64>,
}

impl TryFrom<RawCondition> for Condition {
    type Error = String;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        let mut rules = Vec::new();
        if let Some(p) = raw.contains {
            rules.push(ConditionRule::Contains(p));
        }
        if !raw.any_of.is_empty() {
            rules.push(ConditionRule::AnyOf(raw.any_of));
        }
        if raw.affirmative {
            rules.push(ConditionRule::Affirmative);
        }
        if raw.negative {
            rules.push(ConditionRule::Negative);
        }
        if let Some(n) = raw.rating_at_most {
            rules.push(ConditionRule::RatingAtMost(n));
        }
        if let Some(n) = raw.rating_at_least {
            rules.push(ConditionRule::RatingAtLeast(n));
        }

        match rules.len() {
            1 => Ok(Condition {
                question: raw.question,
                rule: rules.remove(0),
            }),
            0 => Err(format!("condition on '{}' has no rule", raw.question)),
            _ => Err(format!("condition on '{}' has more than one rule", raw.question)),
        }
    }
}

impl From<Condition> for RawCondition {
    fn from(condition: Condition) -> Self {
        let mut raw = RawCondition {
            question: condition.question,
            ..Default::default()
        };
        match condition.rule {
            ConditionRule::Contains(p) => raw.contains = Some(p),
            ConditionRule::AnyOf(ps) => raw.any_of = ps,
            ConditionRule::Affirmative => raw.affirmative = true,
            ConditionRule::Negative => raw.negative = true,
            ConditionRule::RatingAtMost(n) => raw.rating_at_most = Some(n),
            ConditionRule::RatingAtLeast(n) => raw.rating_at_least = Some(n),
        }
        raw
    }
}

/// Additive threat-likelihood boost, applied before the final clamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikelihoodBoost {
    pub when: Condition,
    pub threats: Vec<String>,
    pub boost: i32,
    pub evidence: String,
}

/// Additive impact modifier (asset value, population, data sensitivity)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactModifier {
    pub when: Condition,
    pub threats: Vec<String>,
    pub modifier: i32,
    pub evidence: String,
}

/// Minimum impact for every threat of a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactFloor {
    pub category: String,
    pub floor: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureLevel {
    pub pattern: String,
    pub increment: f64,
}

/// One exposure dimension (visibility, predictability, social media, footprint)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureFactor {
    pub name: String,
    pub question: String,
    /// Checked in order; the first match wins unless `cumulative` is set
    pub levels: Vec<ExposureLevel>,
    #[serde(default)]
    pub cumulative: bool,
}

fn exposure_max() -> f64 {
    5.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureConfig {
    pub factors: Vec<ExposureFactor>,
    #[serde(default = "exposure_max")]
    pub max: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Immediate,
    #[default]
    ShortTerm,
    MediumTerm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub standards_reference: Option<String>,
}

/// Threat-specific sentence appended to a narrated scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeClause {
    pub threat: String,
    pub when: Condition,
    pub clause: String,
}

fn critical_count() -> usize {
    3
}

fn high_count() -> usize {
    2
}

/// Categorical indicator driven by incident-history answers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentIndicator {
    pub id: String,
    pub name: String,
    pub conditions: Vec<Condition>,
    /// Any of these alone escalates the indicator to critical
    #[serde(default)]
    pub high_severity: Vec<Condition>,
    #[serde(default = "critical_count")]
    pub critical_count: usize,
    #[serde(default = "high_count")]
    pub high_count: usize,
}

/// Complete reference data for one assessment domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainProfile {
    pub id: String,
    pub name: String,
    pub kind: DomainKind,
    pub scoring: ScoringConfig,
    pub threats: Vec<ThreatDefinition>,
    #[serde(default)]
    pub questions: Vec<QuestionSpec>,
    #[serde(default)]
    pub likelihood_boosts: Vec<LikelihoodBoost>,
    #[serde(default)]
    pub impact_modifiers: Vec<ImpactModifier>,
    #[serde(default)]
    pub impact_floors: Vec<ImpactFloor>,
    #[serde(default)]
    pub exposure: Option<ExposureConfig>,
    #[serde(default)]
    pub controls: Vec<ControlDefinition>,
    #[serde(default)]
    pub threat_controls: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub narrative_clauses: Vec<NarrativeClause>,
    #[serde(default)]
    pub indicators: Vec<IncidentIndicator>,
}

impl DomainProfile {
    pub fn threat(&self, threat_id: &str) -> Option<&ThreatDefinition> {
        self.threats.iter().find(|t| t.id == threat_id)
    }

    pub fn control(&self, control_id: &str) -> Option<&ControlDefinition> {
        self.controls.iter().find(|c| c.id == control_id)
    }

    /// Questions bearing on the given threat, in declaration order
    pub fn questions_for<'a>(&'a self, threat_id: &'a str) -> impl Iterator<Item = &'a QuestionSpec> + 'a {
        self.questions.iter().filter(move |q| q.applies_to(threat_id))
    }
}
