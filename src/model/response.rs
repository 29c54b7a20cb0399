//! Interview answers as supplied by the questionnaire front end

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// A single interview answer.
///
/// Decoding is untagged: JSON booleans become `Flag`, integers `Rating`,
/// arrays `List` and strings `Text` (free text and single-choice answers alike).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Flag(bool),
    Rating(i64),
    List(Vec<String>),
    Text(String),
}

impl AnswerValue {
    pub fn text(value: impl Into<String>) -> Self {
        AnswerValue::Text(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AnswerValue::List(values.into_iter().map(Into::into).collect())
    }

    /// Short rendering used in prompts and evidence lines
    pub fn display(&self) -> String {
        match self {
            AnswerValue::Flag(true) => "yes".to_string(),
            AnswerValue::Flag(false) => "no".to_string(),
            AnswerValue::Rating(n) => n.to_string(),
            AnswerValue::List(items) if items.is_empty() => "(none selected)".to_string(),
            AnswerValue::List(items) => items.join(", "),
            AnswerValue::Text(s) => s.clone(),
        }
    }
}

/// Full set of answers for one assessment run, keyed by question id.
///
/// Keys are kept ordered so that prompts and evidence trails are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InterviewResponseSet {
    answers: BTreeMap<String, AnswerValue>,
}

impl InterviewResponseSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, question_id: impl Into<String>, answer: AnswerValue) -> Self {
        self.insert(question_id, answer);
        self
    }

    pub fn insert(&mut self, question_id: impl Into<String>, answer: AnswerValue) {
        self.answers.insert(question_id.into(), answer);
    }

    /// Look up an answer. Unknown keys are simply absent.
    pub fn get(&self, question_id: &str) -> Option<&AnswerValue> {
        self.answers.get(question_id)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AnswerValue)> {
        self.answers.iter()
    }
}

impl FromIterator<(String, AnswerValue)> for InterviewResponseSet {
    fn from_iter<T: IntoIterator<Item = (String, AnswerValue)>>(iter: T) -> Self {
        Self {
            answers: iter.into_iter().collect(),
        }
    }
}

// Nulls and values of unsupported shape (objects, floats) are treated as absent
// rather than rejecting the whole response set.
impl<'de> Deserialize<'de> for InterviewResponseSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: BTreeMap<String, serde_json::Value> = BTreeMap::deserialize(deserializer)?;
        let answers = raw
            .into_iter()
            .filter_map(|(key, value)| {
                if value.is_null() {
                    return None;
                }
                match serde_json::from_value::<AnswerValue>(value) {
                    Ok(answer) => Some((key, answer)),
                    Err(e) => {
                        tracing::debug!(question = %key, error = %e, "Ignoring unsupported answer value");
                        None
                    }
                }
            })
            .collect();
        Ok(Self { answers })
    }
}
