//! Quiz payload
//!
//! Questions arrive as flat records (`kind` plus whichever answer fields the
//! kind needs) and are converted into a typed [`AnswerKey`] at parse time, so
//! the grader and renderer never branch on optional fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::{require_text, PayloadError};

/// Question kind as spelled in the encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    FillBlank,
    ShortAnswer,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple-choice",
            QuestionKind::TrueFalse => "true-false",
            QuestionKind::FillBlank => "fill-blank",
            QuestionKind::ShortAnswer => "short-answer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaType {
    Image,
    Audio,
    Video,
}

/// Media attached to a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionMedia {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// One selectable answer of a multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
}

/// What counts as a correct answer
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerKey {
    MultipleChoice {
        options: Vec<ChoiceOption>,
        correct_option_id: String,
    },
    TrueFalse {
        correct: bool,
    },
    /// Accepted answers, already normalized
    FillBlank {
        accepted: BTreeSet<String>,
    },
    /// Accepted answers, already normalized
    ShortAnswer {
        accepted: BTreeSet<String>,
    },
}

impl AnswerKey {
    pub fn kind(&self) -> QuestionKind {
        match self {
            AnswerKey::MultipleChoice { .. } => QuestionKind::MultipleChoice,
            AnswerKey::TrueFalse { .. } => QuestionKind::TrueFalse,
            AnswerKey::FillBlank { .. } => QuestionKind::FillBlank,
            AnswerKey::ShortAnswer { .. } => QuestionKind::ShortAnswer,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub key: AnswerKey,
    pub media: Option<QuestionMedia>,
    pub difficulty: Option<Difficulty>,
    pub explanation: Option<String>,
    pub extensions: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizPayload {
    pub questions: Vec<Question>,
    /// Client-side shuffle hint; the server never reorders
    pub randomize: bool,
    /// Inclusive threshold (0..=100) for a completed attempt
    pub pass_score: u32,
    /// Informational only, not enforced server-side
    pub time_limit_seconds: Option<u32>,
    pub extensions: Map<String, Value>,
}

/// Trim and case-fold an answer for comparison
pub fn normalize_answer(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct QuizRecord {
    questions: Vec<QuestionRecord>,
    #[serde(default)]
    randomize: bool,
    pass_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_limit_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    extensions: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct QuestionRecord {
    id: String,
    text: String,
    kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<ChoiceOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correct_option_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correct_bool: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correct_answers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    media: Option<QuestionMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    extensions: Map<String, Value>,
}

impl QuizPayload {
    pub(super) fn from_record(record: QuizRecord) -> Result<Self, PayloadError> {
        if record.questions.is_empty() {
            return Err(PayloadError::schema("quiz must contain at least one question"));
        }
        if record.pass_score > 100 {
            return Err(PayloadError::schema(format!(
                "pass_score must be within 0..=100, got {}",
                record.pass_score
            )));
        }

        let mut seen = BTreeSet::new();
        let mut questions = Vec::with_capacity(record.questions.len());
        for question in record.questions {
            let question = Question::from_record(question)?;
            if !seen.insert(question.id.clone()) {
                return Err(PayloadError::cross_field(format!(
                    "duplicate question id {:?}",
                    question.id
                )));
            }
            questions.push(question);
        }

        Ok(Self {
            questions,
            randomize: record.randomize,
            pass_score: record.pass_score,
            time_limit_seconds: record.time_limit_seconds,
            extensions: record.extensions,
        })
    }
}

impl QuizRecord {
    pub(super) fn from_payload(quiz: &QuizPayload) -> Self {
        Self {
            questions: quiz.questions.iter().map(QuestionRecord::from_question).collect(),
            randomize: quiz.randomize,
            pass_score: quiz.pass_score,
            time_limit_seconds: quiz.time_limit_seconds,
            extensions: quiz.extensions.clone(),
        }
    }
}

fn reject_foreign(present: bool, field: &str, kind: QuestionKind) -> Result<(), PayloadError> {
    if present {
        return Err(PayloadError::cross_field(format!(
            "field `{}` is not valid for {} questions",
            field,
            kind.as_str()
        )));
    }
    Ok(())
}

fn accepted_answers(answers: Option<Vec<String>>) -> Result<BTreeSet<String>, PayloadError> {
    let accepted: BTreeSet<String> = answers
        .ok_or_else(|| PayloadError::missing("correct_answers"))?
        .iter()
        .map(|a| normalize_answer(a))
        .filter(|a| !a.is_empty())
        .collect();

    if accepted.is_empty() {
        return Err(PayloadError::missing("correct_answers"));
    }
    Ok(accepted)
}

impl Question {
    fn from_record(record: QuestionRecord) -> Result<Self, PayloadError> {
        require_text("question id", &record.id)?;
        require_text("question text", &record.text)?;

        let kind = record.kind;
        let key = match kind {
            QuestionKind::MultipleChoice => {
                reject_foreign(record.correct_bool.is_some(), "correct_bool", kind)?;
                reject_foreign(record.correct_answers.is_some(), "correct_answers", kind)?;

                let options = record.options.ok_or_else(|| PayloadError::missing("options"))?;
                let correct_option_id = record
                    .correct_option_id
                    .ok_or_else(|| PayloadError::missing("correct_option_id"))?;

                if options.len() < 2 {
                    return Err(PayloadError::cross_field(format!(
                        "question {:?} needs at least 2 options, has {}",
                        record.id,
                        options.len()
                    )));
                }
                let mut ids = BTreeSet::new();
                for option in &options {
                    require_text("option id", &option.id)?;
                    require_text("option text", &option.text)?;
                    if !ids.insert(option.id.as_str()) {
                        return Err(PayloadError::cross_field(format!(
                            "duplicate option id {:?} in question {:?}",
                            option.id, record.id
                        )));
                    }
                }
                if !ids.contains(correct_option_id.as_str()) {
                    return Err(PayloadError::reference(format!(
                        "correct_option_id {:?} is not an option of question {:?}",
                        correct_option_id, record.id
                    )));
                }

                AnswerKey::MultipleChoice {
                    options,
                    correct_option_id,
                }
            }
            QuestionKind::TrueFalse => {
                reject_foreign(record.options.is_some(), "options", kind)?;
                reject_foreign(record.correct_option_id.is_some(), "correct_option_id", kind)?;
                reject_foreign(record.correct_answers.is_some(), "correct_answers", kind)?;

                let correct = record
                    .correct_bool
                    .ok_or_else(|| PayloadError::missing("correct_bool"))?;
                AnswerKey::TrueFalse { correct }
            }
            QuestionKind::FillBlank | QuestionKind::ShortAnswer => {
                reject_foreign(record.options.is_some(), "options", kind)?;
                reject_foreign(record.correct_option_id.is_some(), "correct_option_id", kind)?;
                reject_foreign(record.correct_bool.is_some(), "correct_bool", kind)?;

                let accepted = accepted_answers(record.correct_answers)?;
                if kind == QuestionKind::FillBlank {
                    AnswerKey::FillBlank { accepted }
                } else {
                    AnswerKey::ShortAnswer { accepted }
                }
            }
        };

        Ok(Self {
            id: record.id,
            text: record.text,
            key,
            media: record.media,
            difficulty: record.difficulty,
            explanation: record.explanation,
            extensions: record.extensions,
        })
    }
}

impl QuestionRecord {
    fn from_question(question: &Question) -> Self {
        let mut record = Self {
            id: question.id.clone(),
            text: question.text.clone(),
            kind: question.key.kind(),
            options: None,
            correct_option_id: None,
            correct_bool: None,
            correct_answers: None,
            media: question.media.clone(),
            difficulty: question.difficulty,
            explanation: question.explanation.clone(),
            extensions: question.extensions.clone(),
        };

        match &question.key {
            AnswerKey::MultipleChoice {
                options,
                correct_option_id,
            } => {
                record.options = Some(options.clone());
                record.correct_option_id = Some(correct_option_id.clone());
            }
            AnswerKey::TrueFalse { correct } => record.correct_bool = Some(*correct),
            AnswerKey::FillBlank { accepted } | AnswerKey::ShortAnswer { accepted } => {
                record.correct_answers = Some(accepted.iter().cloned().collect());
            }
        }

        record
    }
}
