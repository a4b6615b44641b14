//! Control surface of the interactive element engine
//!
//! [`ElementService`] is transport-agnostic: the HTTP layer only translates
//! requests into these calls. Writes retry `TransientStorage` failures and
//! publish an [`EngineEvent`] once their transaction has committed.

pub mod retry;

use chrono::Utc;
use civic_common::{EngineEvent, EventBus};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::db;
use crate::grader::{self, GradeIssue, IssueKind, Outcome};
use crate::models::{Element, NewElement, NewResponse, Response, UserBookProgress};
use crate::payload::{PayloadError, PayloadErrorKind};
use crate::render::{self, RenderContext};
pub use retry::{retry_transient, RetryPolicy};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] civic_common::Error),

    #[error("{0}")]
    Payload(#[from] PayloadError),

    /// The grader refused the submission; nothing was recorded
    #[error("submission rejected ({:?}): {}", .0.kind, .0.message)]
    Rejected(GradeIssue),
}

impl ServiceError {
    /// Stable kind name reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Storage(err) => match err {
                civic_common::Error::NotFound(_) => "NotFound",
                civic_common::Error::Conflict(_) => "Conflict",
                civic_common::Error::TransientStorage(_) => "TransientStorage",
                civic_common::Error::InvalidInput(_) => "SchemaInvalid",
                _ => "Fatal",
            },
            ServiceError::Payload(err) => match err.kind {
                PayloadErrorKind::SchemaInvalid => "SchemaInvalid",
                PayloadErrorKind::MissingField => "MissingField",
                PayloadErrorKind::EnumOutOfRange => "EnumOutOfRange",
                PayloadErrorKind::CrossFieldInvariant => "CrossFieldInvariant",
                PayloadErrorKind::ReferenceMissing => "ReferenceMissing",
            },
            ServiceError::Rejected(issue) => match issue.kind {
                IssueKind::InvalidSubmissionShape => "InvalidSubmissionShape",
                IssueKind::UnknownOptionId => "UnknownOptionId",
                IssueKind::MissingRequired => "MissingRequired",
                IssueKind::PayloadCorrupt => "PayloadCorrupt",
            },
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// What a submission produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submitted {
    pub outcome: Outcome,
    pub response: Response,
    pub progress: UserBookProgress,
    /// The submission id had already been recorded; `outcome` is the stored one
    pub duplicate: bool,
}

/// Outcome reconstructed from a stored response
fn stored_outcome(response: &Response) -> Outcome {
    Outcome {
        score: response.score,
        status: response.completion_status,
        points: response.points_awarded,
        feedback: response.feedback.clone(),
        errors: Vec::new(),
    }
}

#[derive(Debug, Clone)]
pub struct ElementService {
    db: SqlitePool,
    events: EventBus,
    retry: RetryPolicy,
}

impl ElementService {
    pub fn new(db: SqlitePool, events: EventBus, retry: RetryPolicy) -> Self {
        Self { db, events, retry }
    }

    pub async fn list_elements(&self, section_id: i64) -> ServiceResult<Vec<Element>> {
        Ok(db::get_elements_by_section(&self.db, section_id).await?)
    }

    pub async fn get_element(&self, element_id: i64) -> ServiceResult<Element> {
        Ok(db::get_element(&self.db, element_id).await?)
    }

    pub async fn create_element(&self, element: NewElement) -> ServiceResult<Element> {
        element.validate()?;

        let created = retry_transient(&self.retry, "create_element", || {
            db::create_element(&self.db, &element)
        })
        .await?;

        self.events.emit_lossy(EngineEvent::ElementCreated {
            element_id: created.id,
            section_id: created.section_id,
            book_id: created.book_id,
            timestamp: Utc::now(),
        });
        Ok(created)
    }

    pub async fn update_element(&self, element_id: i64, element: NewElement) -> ServiceResult<Element> {
        element.validate()?;

        Ok(retry_transient(&self.retry, "update_element", || {
            db::update_element(&self.db, element_id, &element)
        })
        .await?)
    }

    pub async fn delete_element(&self, element_id: i64) -> ServiceResult<()> {
        let deleted = retry_transient(&self.retry, "delete_element", || {
            db::delete_element(&self.db, element_id)
        })
        .await?;

        self.events.emit_lossy(EngineEvent::ElementDeleted {
            element_id: deleted.element_id,
            book_id: deleted.book_id,
            removed_responses: deleted.removed_responses,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Grade a submission, record it and update the user's book progress
    ///
    /// Rejected submissions are returned as `ServiceError::Rejected` and leave
    /// no trace in storage. With a `submission_id`, retries of the same
    /// logical submission are recorded once.
    pub async fn submit_response(
        &self,
        user_id: i64,
        element_id: i64,
        submission: Value,
        submission_id: Option<Uuid>,
    ) -> ServiceResult<Submitted> {
        let element = db::get_element(&self.db, element_id).await?;

        let mut outcome = grader::grade(&element, &submission);
        if let Some(issue) = outcome.rejection() {
            tracing::info!(
                user_id,
                element_id,
                kind = ?issue.kind,
                "Submission rejected: {}",
                issue.message
            );
            return Err(ServiceError::Rejected(issue.clone()));
        }

        let new = NewResponse {
            user_id,
            element_id,
            submitted_at: Utc::now(),
            payload_in: submission,
            score: outcome.score,
            completion_status: outcome.status,
            points_awarded: outcome.points,
            feedback: outcome.feedback.clone(),
            submission_id,
        };

        let saved = retry_transient(&self.retry, "submit_response", || {
            db::save_response_and_update_progress(&self.db, &new)
        })
        .await?;

        if saved.duplicate {
            return Ok(Submitted {
                outcome: stored_outcome(&saved.response),
                response: saved.response,
                progress: saved.progress,
                duplicate: true,
            });
        }

        // Points may have been capped by an edit that committed after grading
        outcome.points = saved.response.points_awarded;

        tracing::info!(
            user_id,
            element_id,
            book_id = saved.response.book_id,
            score = outcome.score,
            status = outcome.status.as_str(),
            new_completion = saved.new_completion,
            "Response recorded"
        );

        let now = Utc::now();
        self.events.emit_lossy(EngineEvent::ResponseRecorded {
            response_id: saved.response.id,
            user_id,
            element_id,
            book_id: saved.response.book_id,
            score: saved.response.score,
            completion_status: saved.response.completion_status.as_str().to_string(),
            new_completion: saved.new_completion,
            timestamp: now,
        });
        self.events.emit_lossy(EngineEvent::ProgressUpdated {
            user_id,
            book_id: saved.progress.book_id,
            completion_percentage: saved.progress.completion_percentage,
            total_points_earned: saved.progress.total_points_earned,
            required_completed: saved.progress.required_completed,
            timestamp: now,
        });

        Ok(Submitted {
            outcome,
            response: saved.response,
            progress: saved.progress,
            duplicate: false,
        })
    }

    pub async fn list_responses(&self, user_id: i64, element_id: i64) -> ServiceResult<Vec<Response>> {
        Ok(db::get_responses(&self.db, user_id, element_id).await?)
    }

    pub async fn latest_response(&self, user_id: i64, element_id: i64) -> ServiceResult<Response> {
        Ok(db::get_latest_response(&self.db, user_id, element_id).await?)
    }

    pub async fn get_progress(&self, user_id: i64, book_id: i64) -> ServiceResult<UserBookProgress> {
        Ok(db::get_progress(&self.db, user_id, book_id).await?)
    }

    /// Render section source with its elements, referenced topics and the
    /// user's completion state
    pub async fn render_section(
        &self,
        section_id: i64,
        source: &str,
        user_id: Option<i64>,
    ) -> ServiceResult<String> {
        let elements = db::get_elements_by_section(&self.db, section_id).await?;
        let topics = db::get_topics(&self.db, &render::topic_ids(source)).await?;
        let completed = match user_id {
            Some(user_id) => db::completed_element_ids(&self.db, user_id, section_id).await?,
            None => Vec::new(),
        };

        let ctx = RenderContext::new(elements)
            .with_topics(topics)
            .with_completed(completed);
        Ok(render::render_section(source, &ctx))
    }

    /// Render the stored content of a section
    pub async fn render_stored_section(
        &self,
        section_id: i64,
        user_id: Option<i64>,
    ) -> ServiceResult<String> {
        let section = db::get_section(&self.db, section_id).await?;
        self.render_section(section.id, &section.content, user_id)
            .await
    }
}
