//! Submission bodies accepted per element type

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{GradeIssue, IssueKind};
use crate::payload::SharingMode;

/// One quiz answer; true-false questions also accept "true"/"false"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Text(String),
}

impl AnswerValue {
    pub fn to_value(&self) -> Value {
        match self {
            AnswerValue::Bool(b) => Value::Bool(*b),
            AnswerValue::Text(s) => Value::String(s.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuizSubmission {
    pub answers: BTreeMap<String, AnswerValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReflectionSubmission {
    pub response: String,
    #[serde(default)]
    pub sharing_mode: Option<SharingMode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscussionSubmission {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub topic_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallToActionSubmission {
    #[serde(default)]
    pub action_type: Option<String>,
    #[serde(default)]
    pub action_data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollSubmission {
    pub option_ids: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Decode a submission object, mapping any mismatch to `InvalidSubmissionShape`
pub fn decode<T: DeserializeOwned>(submission: &Value) -> Result<T, GradeIssue> {
    if !submission.is_object() {
        return Err(GradeIssue::new(
            IssueKind::InvalidSubmissionShape,
            "submission must be an object",
        ));
    }
    serde_json::from_value(submission.clone())
        .map_err(|e| GradeIssue::new(IssueKind::InvalidSubmissionShape, e.to_string()))
}
