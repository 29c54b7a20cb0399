//! Factor aggregation: a signed risk-factor count per (responses, threat)

use std::collections::BTreeMap;

use crate::model::{
    AnswerValue, DomainProfile, GapAnswer, InterviewResponseSet, QuestionKind, QuestionSpec,
};
use crate::service::scoring::matcher::{is_affirmative, is_negative, matches, rating};

/// Transient aggregate used by the vulnerability scorer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiskFactorTally {
    /// Signed total; protective measures may bring it below zero
    pub total: i32,
    pub by_section: BTreeMap<String, i32>,
    pub evidence: Vec<String>,
    /// Relevant questions that had an answer, used for data-coverage confidence
    pub answered: usize,
    pub relevant: usize,
}

impl RiskFactorTally {
    /// Share of the relevant questions that were answered (1.0 when none apply)
    pub fn coverage(&self) -> f64 {
        if self.relevant == 0 {
            1.0
        } else {
            self.answered as f64 / self.relevant as f64
        }
    }
}

/// Signed weight of one answered question; positive values are gaps
pub fn contribution(question: &QuestionSpec, answer: Option<&AnswerValue>) -> i32 {
    let Some(answer) = answer else {
        return 0;
    };
    let answer = Some(answer);

    match &question.kind {
        QuestionKind::Boolean {
            gap_when,
            weight,
            protective_credit,
        } => {
            let (gap, protective) = match gap_when {
                GapAnswer::Negative => (is_negative(answer), is_affirmative(answer)),
                GapAnswer::Affirmative => (is_affirmative(answer), is_negative(answer)),
            };
            if gap {
                *weight
            } else if protective {
                protective_credit.saturating_neg()
            } else {
                0
            }
        }
        QuestionKind::Rating {
            poor_at_most,
            poor_weight,
            good_at_least,
            good_credit,
        } => match rating(answer) {
            Some(r) if r <= *poor_at_most => *poor_weight,
            Some(r) if r >= *good_at_least => good_credit.saturating_neg(),
            _ => 0,
        },
        QuestionKind::MultiSelect {
            risk_indicators,
            indicator_weight,
            protective_tokens,
            missing_penalty,
        } => {
            let matched = risk_indicators.iter().filter(|p| matches(answer, p)).count() as i32;
            let missing_protection = !protective_tokens.is_empty()
                && !protective_tokens.iter().any(|p| matches(answer, p));
            let penalty = if missing_protection { *missing_penalty } else { 0 };
            matched.saturating_mul(*indicator_weight).saturating_add(penalty)
        }
        QuestionKind::Text {
            risk_indicators,
            indicator_weight,
        } => {
            let matched = risk_indicators.iter().filter(|p| matches(answer, p)).count() as i32;
            matched.saturating_mul(*indicator_weight)
        }
    }
}

/// Whether the answer to `question` represents a control gap
pub fn is_gap(question: &QuestionSpec, answer: Option<&AnswerValue>) -> bool {
    contribution(question, answer) > 0
}

/// Walk the questions relevant to `threat_id` and accumulate weighted risk factors
pub fn tally(
    profile: &DomainProfile,
    responses: &InterviewResponseSet,
    threat_id: &str,
) -> RiskFactorTally {
    let mut result = RiskFactorTally::default();

    for question in profile.questions_for(threat_id) {
        result.relevant += 1;
        let answer = responses.get(&question.id);
        if answer.is_none() {
            continue;
        }
        result.answered += 1;

        let weight = contribution(question, answer);
        if weight == 0 {
            continue;
        }

        result.total = result.total.saturating_add(weight);
        let section = result.by_section.entry(question.section.clone()).or_insert(0);
        *section = section.saturating_add(weight);
        result.evidence.push(format!(
            "{} answered '{}' ({:+})",
            question.id,
            answer.map(AnswerValue::display).unwrap_or_default(),
            weight
        ));
    }

    result
}
