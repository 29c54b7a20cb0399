//! Response predicates
//!
//! Every fuzzy comparison between an interview answer and reference data goes
//! through this module, so scoring stays reproducible and the string heuristics
//! can later be swapped for structured answers in one place.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{AnswerValue, Condition, ConditionRule, InterviewResponseSet};

static LEADING_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(-?\d+)").expect("valid leading integer regex"));

/// Case-insensitive substring test of `pattern` against a text or list answer.
///
/// Ratings, flags and absent answers never match.
pub fn matches(answer: Option<&AnswerValue>, pattern: &str) -> bool {
    let pattern = pattern.to_lowercase();
    match answer {
        Some(AnswerValue::Text(s)) => s.to_lowercase().contains(&pattern),
        Some(AnswerValue::List(items)) => items.iter().any(|s| s.to_lowercase().contains(&pattern)),
        _ => false,
    }
}

/// True when `answer` is a yes: `Flag(true)` or text such as "yes", "Yes - weekly"
pub fn is_affirmative(answer: Option<&AnswerValue>) -> bool {
    match answer {
        Some(AnswerValue::Flag(b)) => *b,
        Some(AnswerValue::Text(s)) => {
            let s = s.trim().to_lowercase();
            matches!(s.as_str(), "y" | "true") || starts_with_word(&s, "yes")
        }
        _ => false,
    }
}

/// True when `answer` is a no: `Flag(false)` or text such as "no", "No, never", "none"
pub fn is_negative(answer: Option<&AnswerValue>) -> bool {
    match answer {
        Some(AnswerValue::Flag(b)) => !*b,
        Some(AnswerValue::Text(s)) => {
            let s = s.trim().to_lowercase();
            matches!(s.as_str(), "n" | "false" | "none") || starts_with_word(&s, "no")
        }
        _ => false,
    }
}

/// Integer rating, either given directly or as the leading number of a label ("4 - Good")
pub fn rating(answer: Option<&AnswerValue>) -> Option<i64> {
    match answer {
        Some(AnswerValue::Rating(n)) => Some(*n),
        Some(AnswerValue::Text(s)) => LEADING_INTEGER
            .captures(s)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        _ => None,
    }
}

/// Evaluate a reference-data condition against the response set
pub fn evaluate(condition: &Condition, responses: &InterviewResponseSet) -> bool {
    let answer = responses.get(&condition.question);
    match &condition.rule {
        ConditionRule::Contains(pattern) => matches(answer, pattern),
        ConditionRule::AnyOf(patterns) => patterns.iter().any(|p| matches(answer, p)),
        ConditionRule::Affirmative => is_affirmative(answer),
        ConditionRule::Negative => is_negative(answer),
        ConditionRule::RatingAtMost(n) => rating(answer).is_some_and(|r| r <= *n),
        ConditionRule::RatingAtLeast(n) => rating(answer).is_some_and(|r| r >= *n),
    }
}

// "no" must not match "none of the above" or "not sure" through a bare prefix check
fn starts_with_word(s: &str, word: &str) -> bool {
    s.strip_prefix(word)
        .is_some_and(|rest| rest.chars().next().is_none_or(|c| !c.is_alphanumeric()))
}
