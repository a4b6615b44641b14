//! Quiz grading

use serde_json::{json, Map, Value};

use super::submission::{decode, AnswerValue, QuizSubmission};
use super::{GradeIssue, IssueKind, Outcome};
use crate::models::{CompletionStatus, CompletionType, Element};
use crate::payload::{normalize_answer, AnswerKey, Question, QuizPayload};

/// `round(100 * correct / total)` with halves rounded up
pub fn quiz_score(correct: usize, total: usize) -> i64 {
    if total == 0 {
        return 0;
    }
    let (c, q) = (correct as i64, total as i64);
    (200 * c + q) / (2 * q)
}

/// Result of checking one answer against its key
enum Check {
    Unanswered,
    Correct,
    Incorrect,
}

fn check_answer(question: &Question, answer: Option<&AnswerValue>) -> Result<Check, GradeIssue> {
    let Some(answer) = answer else {
        return Ok(Check::Unanswered);
    };

    let correct = match (&question.key, answer) {
        (
            AnswerKey::MultipleChoice {
                options,
                correct_option_id,
            },
            AnswerValue::Text(id),
        ) => {
            if !options.iter().any(|o| &o.id == id) {
                return Err(GradeIssue::new(
                    IssueKind::UnknownOptionId,
                    format!("question {:?} has no option {:?}", question.id, id),
                ));
            }
            id == correct_option_id
        }
        (AnswerKey::TrueFalse { correct }, AnswerValue::Bool(b)) => b == correct,
        (AnswerKey::TrueFalse { correct }, AnswerValue::Text(s)) => {
            match normalize_answer(s).as_str() {
                "true" => *correct,
                "false" => !*correct,
                _ => false,
            }
        }
        (AnswerKey::FillBlank { accepted }, AnswerValue::Text(s))
        | (AnswerKey::ShortAnswer { accepted }, AnswerValue::Text(s)) => {
            let normalized = normalize_answer(s);
            if normalized.is_empty() {
                return Ok(Check::Unanswered);
            }
            accepted.contains(&normalized)
        }
        (key, _) => {
            return Err(GradeIssue::new(
                IssueKind::InvalidSubmissionShape,
                format!(
                    "answer to {} question {:?} must be a string",
                    key.kind().as_str(),
                    question.id
                ),
            ))
        }
    };

    Ok(if correct { Check::Correct } else { Check::Incorrect })
}

fn expected_value(key: &AnswerKey) -> Value {
    match key {
        AnswerKey::MultipleChoice {
            correct_option_id, ..
        } => json!(correct_option_id),
        AnswerKey::TrueFalse { correct } => json!(correct),
        AnswerKey::FillBlank { accepted } | AnswerKey::ShortAnswer { accepted } => {
            json!(accepted)
        }
    }
}

pub(super) fn grade_quiz(
    element: &Element,
    quiz: &QuizPayload,
    submission: &Value,
) -> Result<Outcome, GradeIssue> {
    let submission: QuizSubmission = decode(submission)?;

    if let Some(unknown) = submission
        .answers
        .keys()
        .find(|id| !quiz.questions.iter().any(|q| &q.id == *id))
    {
        return Err(GradeIssue::new(
            IssueKind::InvalidSubmissionShape,
            format!("answer given for unknown question {:?}", unknown),
        ));
    }

    let mut checks = Vec::with_capacity(quiz.questions.len());
    for question in &quiz.questions {
        let answer = submission.answers.get(&question.id);
        checks.push((question, answer, check_answer(question, answer)?));
    }

    let unanswered: Vec<&str> = checks
        .iter()
        .filter(|(_, _, check)| matches!(check, Check::Unanswered))
        .map(|(q, _, _)| q.id.as_str())
        .collect();

    match element.completion_type {
        CompletionType::None => return Ok(Outcome::completed(element.points_value)),
        CompletionType::SelfCheck => {
            return Ok(if unanswered.is_empty() {
                Outcome::completed(element.points_value)
            } else {
                Outcome::partial(format!("unanswered questions: {}", unanswered.join(", ")))
            });
        }
        CompletionType::Graded => {}
    }

    let correct = checks
        .iter()
        .filter(|(_, _, check)| matches!(check, Check::Correct))
        .count();
    let score = quiz_score(correct, quiz.questions.len());
    let passed = score >= i64::from(quiz.pass_score);

    let feedback: Vec<Value> = checks
        .iter()
        .map(|(question, answer, check)| {
            let mut entry = Map::new();
            entry.insert("question_id".into(), json!(question.id));
            entry.insert("correct".into(), json!(matches!(check, Check::Correct)));
            entry.insert(
                "submitted".into(),
                answer.map(AnswerValue::to_value).unwrap_or(Value::Null),
            );
            if passed {
                entry.insert("expected".into(), expected_value(&question.key));
            }
            if let Some(explanation) = &question.explanation {
                entry.insert("explanation".into(), json!(explanation));
            }
            Value::Object(entry)
        })
        .collect();

    let mut outcome = if passed {
        Outcome::completed(element.points_value)
    } else {
        Outcome {
            score: 0,
            status: CompletionStatus::Failed,
            points: 0,
            feedback: None,
            errors: Vec::new(),
        }
    };
    outcome.score = score;
    outcome.feedback = Some(Value::Array(feedback));
    Ok(outcome)
}
