//! Payload schema for interactive elements
//!
//! Each element carries one payload whose shape is selected by its
//! [`ElementType`]. Payloads are stored as JSON text and parsed exactly once
//! at the storage or request boundary into the typed [`Payload`] union.
//!
//! Parsing always goes text → `serde_json::Value` → key-sorted `Value` →
//! typed value, so the order of fields in the input can never change which
//! error is reported. The canonical serialization is compact
//! JSON with lexicographically sorted keys.
//!
//! Unknown fields are rejected. Every payload object accepts an optional
//! `extensions` object that is carried through untouched.

mod call_to_action;
mod discussion;
mod poll;
mod quiz;
mod reflection;

pub use call_to_action::{ActionType, CallToActionPayload};
pub use discussion::DiscussionPromptPayload;
pub use poll::{PollOption, PollPayload, ShowResults};
pub use quiz::{
    normalize_answer, AnswerKey, ChoiceOption, Difficulty, MediaType, Question, QuestionKind,
    QuestionMedia, QuizPayload,
};
pub use reflection::{ReflectionPayload, SharingMode};

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Interactive element variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementType {
    Quiz,
    Reflection,
    CallToAction,
    DiscussionPrompt,
    Poll,
}

impl ElementType {
    pub const ALL: [ElementType; 5] = [
        ElementType::Quiz,
        ElementType::Reflection,
        ElementType::CallToAction,
        ElementType::DiscussionPrompt,
        ElementType::Poll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Quiz => "quiz",
            ElementType::Reflection => "reflection",
            ElementType::CallToAction => "call-to-action",
            ElementType::DiscussionPrompt => "discussion-prompt",
            ElementType::Poll => "poll",
        }
    }

    /// Human-readable name used in widget chrome and error markers
    pub fn display_name(&self) -> &'static str {
        match self {
            ElementType::Quiz => "quiz",
            ElementType::Reflection => "reflection",
            ElementType::CallToAction => "call to action",
            ElementType::DiscussionPrompt => "discussion",
            ElementType::Poll => "poll",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| PayloadError::enum_range(format!("unknown element type {:?}", s)))
    }
}

/// Validation failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PayloadErrorKind {
    SchemaInvalid,
    MissingField,
    EnumOutOfRange,
    CrossFieldInvariant,
    ReferenceMissing,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind:?}: {message}")]
pub struct PayloadError {
    pub kind: PayloadErrorKind,
    pub message: String,
}

impl PayloadError {
    pub fn new(kind: PayloadErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(PayloadErrorKind::SchemaInvalid, message)
    }

    pub fn missing(field: &str) -> Self {
        Self::new(
            PayloadErrorKind::MissingField,
            format!("missing field `{}`", field),
        )
    }

    pub fn enum_range(message: impl Into<String>) -> Self {
        Self::new(PayloadErrorKind::EnumOutOfRange, message)
    }

    pub fn cross_field(message: impl Into<String>) -> Self {
        Self::new(PayloadErrorKind::CrossFieldInvariant, message)
    }

    pub fn reference(message: impl Into<String>) -> Self {
        Self::new(PayloadErrorKind::ReferenceMissing, message)
    }

    /// Classify a serde error raised while decoding a `Value`
    fn from_serde(err: serde_json::Error) -> Self {
        let message = err.to_string();
        let kind = if message.starts_with("missing field") {
            PayloadErrorKind::MissingField
        } else if message.starts_with("unknown variant") {
            PayloadErrorKind::EnumOutOfRange
        } else {
            PayloadErrorKind::SchemaInvalid
        };
        Self::new(kind, message)
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), PayloadError> {
    if value.trim().is_empty() {
        return Err(PayloadError::schema(format!("`{}` must not be empty", field)));
    }
    Ok(())
}

/// Typed payload of an interactive element
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Quiz(QuizPayload),
    Reflection(ReflectionPayload),
    CallToAction(CallToActionPayload),
    DiscussionPrompt(DiscussionPromptPayload),
    Poll(PollPayload),
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, PayloadError> {
    serde_json::from_value(value).map_err(PayloadError::from_serde)
}

/// Rebuild every object with its keys in lexicographic order
///
/// Key order must not depend on whether serde_json's map keeps insertion
/// order, for decoding as well as for the canonical form.
pub fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

impl Payload {
    pub fn element_type(&self) -> ElementType {
        match self {
            Payload::Quiz(_) => ElementType::Quiz,
            Payload::Reflection(_) => ElementType::Reflection,
            Payload::CallToAction(_) => ElementType::CallToAction,
            Payload::DiscussionPrompt(_) => ElementType::DiscussionPrompt,
            Payload::Poll(_) => ElementType::Poll,
        }
    }

    /// Parse and validate stored or submitted payload text
    pub fn parse(element_type: ElementType, text: &str) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| PayloadError::schema(format!("payload is not valid JSON: {}", e)))?;
        Self::from_value(element_type, value)
    }

    /// Validate an already-decoded JSON value
    pub fn from_value(element_type: ElementType, value: Value) -> Result<Self, PayloadError> {
        if !value.is_object() {
            return Err(PayloadError::schema(format!(
                "{} payload must be an object",
                element_type
            )));
        }

        let value = sort_keys(value);
        let payload = match element_type {
            ElementType::Quiz => {
                let record: quiz::QuizRecord = decode(value)?;
                Payload::Quiz(QuizPayload::from_record(record)?)
            }
            ElementType::Reflection => {
                let p: ReflectionPayload = decode(value)?;
                p.validate()?;
                Payload::Reflection(p)
            }
            ElementType::CallToAction => {
                let p: CallToActionPayload = decode(value)?;
                p.validate()?;
                Payload::CallToAction(p)
            }
            ElementType::DiscussionPrompt => {
                let p: DiscussionPromptPayload = decode(value)?;
                p.validate()?;
                Payload::DiscussionPrompt(p)
            }
            ElementType::Poll => {
                let p: PollPayload = decode(value)?;
                p.validate()?;
                Payload::Poll(p)
            }
        };

        Ok(payload)
    }

    /// JSON value with sorted keys
    pub fn to_value(&self) -> Result<Value, PayloadError> {
        let result = match self {
            Payload::Quiz(p) => serde_json::to_value(quiz::QuizRecord::from_payload(p)),
            Payload::Reflection(p) => serde_json::to_value(p),
            Payload::CallToAction(p) => serde_json::to_value(p),
            Payload::DiscussionPrompt(p) => serde_json::to_value(p),
            Payload::Poll(p) => serde_json::to_value(p),
        };
        result
            .map(sort_keys)
            .map_err(|e| PayloadError::schema(format!("payload could not be encoded: {}", e)))
    }

    /// Canonical text form: compact JSON, keys sorted
    pub fn to_canonical_string(&self) -> Result<String, PayloadError> {
        let value = self.to_value()?;
        serde_json::to_string(&value)
            .map_err(|e| PayloadError::schema(format!("payload could not be encoded: {}", e)))
    }

    /// Parse then re-serialize in canonical form
    pub fn canonicalize(element_type: ElementType, text: &str) -> Result<String, PayloadError> {
        Self::parse(element_type, text)?.to_canonical_string()
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}
