//! Grader
//!
//! Pure function from (element, submission) to [`Outcome`]. Never performs
//! I/O and never fails: every problem is reported in `Outcome::errors`.
//!
//! Evaluation order:
//! 1. stored payload corrupt → `PayloadCorrupt`
//! 2. `completion_type = none` completes any submission, except that poll
//!    votes are still validated
//! 3. submission does not match the variant's shape → `InvalidSubmissionShape`
//! 4. variant validation (option ids, cardinality, offered sharing modes)
//! 5. completion-type rules
//!
//! Outcomes carrying a rejection kind are not recorded as responses.

mod quiz;
pub mod submission;

pub use quiz::quiz_score;

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;

use crate::models::{CompletionStatus, CompletionType, Element, ElementContent};
use crate::payload::{
    CallToActionPayload, DiscussionPromptPayload, Payload, PollPayload, ReflectionPayload,
};
use submission::{
    decode, CallToActionSubmission, DiscussionSubmission, PollSubmission, ReflectionSubmission,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueKind {
    InvalidSubmissionShape,
    UnknownOptionId,
    /// Submission accepted but did not meet the completion minimum
    MissingRequired,
    PayloadCorrupt,
}

impl IssueKind {
    /// Whether the submission must be refused instead of recorded
    pub fn is_rejection(&self) -> bool {
        !matches!(self, IssueKind::MissingRequired)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeIssue {
    pub kind: IssueKind,
    pub message: String,
}

impl GradeIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Grader verdict for one submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub score: i64,
    pub status: CompletionStatus,
    pub points: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GradeIssue>,
}

impl Outcome {
    pub fn completed(points: i64) -> Self {
        Self {
            score: 100,
            status: CompletionStatus::Completed,
            points,
            feedback: None,
            errors: Vec::new(),
        }
    }

    pub fn partial(reason: impl Into<String>) -> Self {
        Self {
            score: 0,
            status: CompletionStatus::Partial,
            points: 0,
            feedback: None,
            errors: vec![GradeIssue::new(IssueKind::MissingRequired, reason)],
        }
    }

    pub fn rejected(issue: GradeIssue) -> Self {
        Self {
            score: 0,
            status: CompletionStatus::Failed,
            points: 0,
            feedback: None,
            errors: vec![issue],
        }
    }

    /// First issue that forbids recording this outcome
    pub fn rejection(&self) -> Option<&GradeIssue> {
        self.errors.iter().find(|e| e.kind.is_rejection())
    }

    pub fn is_rejection(&self) -> bool {
        self.rejection().is_some()
    }
}

/// Grade `submission` against `element`
pub fn grade(element: &Element, submission: &Value) -> Outcome {
    let payload = match &element.content {
        ElementContent::Valid(payload) => payload,
        ElementContent::Corrupt { error, .. } => {
            return Outcome::rejected(GradeIssue::new(
                IssueKind::PayloadCorrupt,
                format!(
                    "stored {} payload for element {} is invalid: {}",
                    element.element_type, element.id, error
                ),
            ));
        }
    };

    if element.completion_type == CompletionType::None && !matches!(payload, Payload::Poll(_)) {
        return Outcome::completed(element.points_value);
    }

    let result = match payload {
        Payload::Quiz(p) => quiz::grade_quiz(element, p, submission),
        Payload::Reflection(p) => grade_reflection(element, p, submission),
        Payload::CallToAction(p) => grade_call_to_action(element, p, submission),
        Payload::DiscussionPrompt(p) => grade_discussion(element, p, submission),
        Payload::Poll(p) => grade_poll(element, p, submission),
    };

    result.unwrap_or_else(Outcome::rejected)
}

/// Self-check and graded rule for variants judged by a minimum constraint
fn minimum_met(element: &Element, satisfied: bool, missing: impl FnOnce() -> String) -> Outcome {
    if satisfied {
        Outcome::completed(element.points_value)
    } else {
        Outcome::partial(missing())
    }
}

fn shape(message: impl Into<String>) -> GradeIssue {
    GradeIssue::new(IssueKind::InvalidSubmissionShape, message)
}

fn grade_reflection(
    element: &Element,
    payload: &ReflectionPayload,
    submission: &Value,
) -> Result<Outcome, GradeIssue> {
    let submission: ReflectionSubmission = decode(submission)?;

    if let Some(mode) = submission.sharing_mode {
        if !payload.sharing_options.contains(&mode) {
            return Err(shape(format!(
                "sharing mode {:?} is not offered",
                mode.as_str()
            )));
        }
    }

    let length = submission.response.trim().chars().count();
    if let Some(max) = payload.max_response_length {
        if length > max as usize {
            return Err(shape(format!(
                "response is {} characters, maximum is {}",
                length, max
            )));
        }
    }

    let min = payload.min_response_length.map_or(1, |m| m as usize);
    Ok(minimum_met(element, length >= min, || {
        format!("response is {} characters, minimum is {}", length, min)
    }))
}

fn grade_discussion(
    element: &Element,
    _payload: &DiscussionPromptPayload,
    submission: &Value,
) -> Result<Outcome, GradeIssue> {
    let submission: DiscussionSubmission = decode(submission)?;

    let has_response = submission
        .response
        .as_deref()
        .is_some_and(|r| !r.trim().is_empty());
    let has_topic = submission.topic_id.is_some();

    Ok(minimum_met(element, has_response && has_topic, || {
        match (has_response, has_topic) {
            (false, false) => "response and topic_id are required".to_string(),
            (false, true) => "response is required".to_string(),
            _ => "topic_id is required".to_string(),
        }
    }))
}

fn grade_call_to_action(
    element: &Element,
    _payload: &CallToActionPayload,
    submission: &Value,
) -> Result<Outcome, GradeIssue> {
    let submission: CallToActionSubmission = decode(submission)?;

    let has_type = submission
        .action_type
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty());
    let has_data = submission.action_data.as_ref().is_some_and(|d| !d.is_null());

    Ok(minimum_met(element, has_type && has_data, || {
        "action_type and action_data are required".to_string()
    }))
}

fn grade_poll(
    element: &Element,
    payload: &PollPayload,
    submission: &Value,
) -> Result<Outcome, GradeIssue> {
    let submission: PollSubmission = decode(submission)?;

    if submission.option_ids.is_empty() {
        return Err(shape("a vote needs at least one option"));
    }
    if !payload.allow_multiple && submission.option_ids.len() > 1 {
        return Err(shape(format!(
            "poll accepts exactly one option, got {}",
            submission.option_ids.len()
        )));
    }

    let mut seen = BTreeSet::new();
    for id in &submission.option_ids {
        if !payload.has_option(id) {
            return Err(GradeIssue::new(
                IssueKind::UnknownOptionId,
                format!("poll has no option {:?}", id),
            ));
        }
        if !seen.insert(id.as_str()) {
            return Err(shape(format!("option {:?} selected twice", id)));
        }
    }

    if submission.comment.is_some() && !payload.allow_comments {
        return Err(shape("poll does not accept comments"));
    }

    let mut outcome = Outcome::completed(element.points_value);
    outcome.feedback = Some(json!({
        "option_ids": submission.option_ids,
        "show_results": payload.show_results.as_str(),
    }));
    Ok(outcome)
}
