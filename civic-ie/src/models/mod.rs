//! Domain records shared by the store, grader, renderer and API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use std::str::FromStr;
use uuid::Uuid;

use crate::payload::{ElementType, Payload, PayloadError};

/// How an element's responses are judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionType {
    /// Any well-formed submission completes the element
    None,
    /// Completed when the submission meets the variant's minimum constraints
    SelfCheck,
    /// Variant-specific grading
    Graded,
}

impl CompletionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionType::None => "none",
            CompletionType::SelfCheck => "self-check",
            CompletionType::Graded => "graded",
        }
    }
}

impl FromStr for CompletionType {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CompletionType::None),
            "self-check" => Ok(CompletionType::SelfCheck),
            "graded" => Ok(CompletionType::Graded),
            other => Err(PayloadError::enum_range(format!(
                "unknown completion type {:?}",
                other
            ))),
        }
    }
}

/// Verdict recorded on a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionStatus {
    Completed,
    Partial,
    Failed,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Completed => "completed",
            CompletionStatus::Partial => "partial",
            CompletionStatus::Failed => "failed",
        }
    }
}

impl FromStr for CompletionStatus {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(CompletionStatus::Completed),
            "partial" => Ok(CompletionStatus::Partial),
            "failed" => Ok(CompletionStatus::Failed),
            other => Err(PayloadError::enum_range(format!(
                "unknown completion status {:?}",
                other
            ))),
        }
    }
}

/// Stored payload of an element
///
/// A row whose payload no longer validates is still loadable so the
/// renderer can show an inline error and the grader can report
/// `PayloadCorrupt`.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementContent {
    Valid(Payload),
    Corrupt { raw: String, error: PayloadError },
}

impl ElementContent {
    /// Parse stored payload text
    pub fn from_stored(element_type: ElementType, raw: String) -> Self {
        match Payload::parse(element_type, &raw) {
            Ok(payload) => ElementContent::Valid(payload),
            Err(error) => ElementContent::Corrupt { raw, error },
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            ElementContent::Valid(payload) => Some(payload),
            ElementContent::Corrupt { .. } => None,
        }
    }
}

impl Serialize for ElementContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ElementContent::Valid(payload) => payload.serialize(serializer),
            ElementContent::Corrupt { error, .. } => {
                json!({ "corrupt": true, "error": error }).serialize(serializer)
            }
        }
    }
}

/// Interactive element attached to a section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub id: i64,
    pub section_id: i64,
    /// Denormalized from section → chapter → book
    pub book_id: i64,
    pub position: i64,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub title: String,
    pub description: String,
    #[serde(rename = "payload")]
    pub content: ElementContent,
    pub completion_type: CompletionType,
    pub points_value: i64,
    pub required: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Element {
    pub fn payload(&self) -> Option<&Payload> {
        self.content.payload()
    }
}

/// Element definition before it has an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewElement {
    pub section_id: i64,
    pub position: i64,
    pub title: String,
    pub description: String,
    pub payload: Payload,
    pub completion_type: CompletionType,
    pub points_value: i64,
    pub required: bool,
}

impl NewElement {
    pub fn element_type(&self) -> ElementType {
        self.payload.element_type()
    }

    /// Checks on the element envelope; the payload validated itself on parse
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.position < 0 {
            return Err(PayloadError::schema(format!(
                "position must be non-negative, got {}",
                self.position
            )));
        }
        if self.points_value < 0 {
            return Err(PayloadError::schema(format!(
                "points_value must be non-negative, got {}",
                self.points_value
            )));
        }
        Ok(())
    }
}

/// One stored submission; never mutated after insert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub id: i64,
    pub user_id: i64,
    pub element_id: i64,
    pub book_id: i64,
    pub submitted_at: DateTime<Utc>,
    pub payload_in: Value,
    pub score: i64,
    pub completion_status: CompletionStatus,
    pub points_awarded: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Value>,
    /// Client nonce used to deduplicate retried submissions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<Uuid>,
}

/// A graded submission about to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewResponse {
    pub user_id: i64,
    pub element_id: i64,
    pub submitted_at: DateTime<Utc>,
    pub payload_in: Value,
    pub score: i64,
    pub completion_status: CompletionStatus,
    pub points_awarded: i64,
    pub feedback: Option<Value>,
    pub submission_id: Option<Uuid>,
}

/// Per (user, book) aggregate maintained with every response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserBookProgress {
    pub user_id: i64,
    pub book_id: i64,
    pub total_elements: i64,
    pub completed_elements: i64,
    pub completion_percentage: i64,
    pub total_points_available: i64,
    pub total_points_earned: i64,
    pub avg_score_percentage: i64,
    pub required_completed: bool,
    pub updated_at: DateTime<Utc>,
}

/// Discussion topic referenced by `{{topic:N}}`; owned by the forum service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscussionTopic {
    pub id: i64,
    pub title: String,
    pub summary: Option<String>,
}

/// `floor(100 * part / whole)`, 0 when `whole` is 0
pub fn percentage(part: i64, whole: i64) -> i64 {
    if whole <= 0 {
        0
    } else {
        (100 * part) / whole
    }
}
