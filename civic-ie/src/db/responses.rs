//! Response persistence
//!
//! Responses are append-only. [`save_response_and_update_progress`] inserts
//! the response and folds it into the aggregate in one transaction; the
//! insert is the first statement so SQLite's writer lock is held before any
//! aggregate read.

use civic_common::{Error, Result};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::elements::{format_timestamp, parse_timestamp};
use super::monitor::begin_monitored;
use super::progress::{apply_response, fetch_progress};
use crate::models::{CompletionStatus, NewResponse, Response, UserBookProgress};

const RESPONSE_COLUMNS: &str = "id, user_id, element_id, book_id, submitted_at, payload_in, \
     score, completion_status, points_awarded, feedback, submission_id";

fn json_column(row: &SqliteRow, column: &str, id: i64) -> Result<Option<Value>> {
    let raw: Option<String> = row.get(column);
    raw.map(|text| {
        serde_json::from_str(&text).map_err(|e| {
            Error::Internal(format!("response {} has invalid {}: {}", id, column, e))
        })
    })
    .transpose()
}

fn response_from_row(row: &SqliteRow) -> Result<Response> {
    let id: i64 = row.get("id");

    let status: String = row.get("completion_status");
    let completion_status: CompletionStatus = status
        .parse()
        .map_err(|e| Error::Internal(format!("response {} has invalid status: {}", id, e)))?;

    let submission_id: Option<String> = row.get("submission_id");
    let submission_id = submission_id
        .map(|s| Uuid::parse_str(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("response {} has invalid submission id: {}", id, e)))?;

    let submitted_at: String = row.get("submitted_at");

    Ok(Response {
        id,
        user_id: row.get("user_id"),
        element_id: row.get("element_id"),
        book_id: row.get("book_id"),
        submitted_at: parse_timestamp(&submitted_at)?,
        payload_in: json_column(row, "payload_in", id)?.unwrap_or(Value::Null),
        score: row.get("score"),
        completion_status,
        points_awarded: row.get("points_awarded"),
        feedback: json_column(row, "feedback", id)?,
        submission_id,
    })
}

/// Responses of a user to an element, newest first
pub async fn get_responses(pool: &SqlitePool, user_id: i64, element_id: i64) -> Result<Vec<Response>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM element_responses WHERE user_id = ? AND element_id = ? \
         ORDER BY submitted_at DESC, id DESC",
        RESPONSE_COLUMNS
    ))
    .bind(user_id)
    .bind(element_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(response_from_row).collect()
}

pub async fn get_latest_response(pool: &SqlitePool, user_id: i64, element_id: i64) -> Result<Response> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM element_responses WHERE user_id = ? AND element_id = ? \
         ORDER BY submitted_at DESC, id DESC LIMIT 1",
        RESPONSE_COLUMNS
    ))
    .bind(user_id)
    .bind(element_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        Error::NotFound(format!(
            "no response from user {} for element {}",
            user_id, element_id
        ))
    })?;

    response_from_row(&row)
}

async fn get_response_in(conn: &mut SqliteConnection, id: i64) -> Result<Response> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM element_responses WHERE id = ?",
        RESPONSE_COLUMNS
    ))
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    response_from_row(&row)
}

async fn find_by_submission(
    conn: &mut SqliteConnection,
    user_id: i64,
    submission_id: Uuid,
) -> Result<Option<Response>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM element_responses WHERE user_id = ? AND submission_id = ?",
        RESPONSE_COLUMNS
    ))
    .bind(user_id)
    .bind(submission_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(response_from_row).transpose()
}

/// Element ids in a section the user has at least one completed response for
pub async fn completed_element_ids(
    pool: &SqlitePool,
    user_id: i64,
    section_id: i64,
) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar(
        r#"
        SELECT DISTINCT r.element_id
        FROM element_responses r
        JOIN interactive_elements e ON e.id = r.element_id
        WHERE r.user_id = ? AND e.section_id = ? AND r.completion_status = 'completed'
        ORDER BY r.element_id
        "#,
    )
    .bind(user_id)
    .bind(section_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Result of recording one submission
#[derive(Debug, Clone, PartialEq)]
pub struct SavedResponse {
    pub response: Response,
    pub progress: UserBookProgress,
    /// First completed response of this user for the element
    pub new_completion: bool,
    /// The submission id was already recorded; nothing was written
    pub duplicate: bool,
}

fn encode_json(value: &Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Internal(format!("encode response: {}", e)))
}

/// Insert a response and update the (user, book) aggregate atomically
///
/// `points_awarded` is capped at the element's `points_value` as read inside
/// the transaction.
///
/// A repeat of an already recorded `submission_id` writes nothing and
/// returns the stored response with the current aggregate; the same id
/// recorded for another element is a `Conflict`. Dropping the returned
/// future before it completes rolls the whole transaction back.
pub async fn save_response_and_update_progress(
    pool: &SqlitePool,
    new: &NewResponse,
) -> Result<SavedResponse> {
    let payload_in = encode_json(&new.payload_in)?;
    let feedback = new.feedback.as_ref().map(encode_json).transpose()?;

    let mut tx = begin_monitored(pool, "responses::save_response_and_update_progress").await?;

    let inserted: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO element_responses (
            user_id, element_id, book_id, submitted_at, payload_in, score,
            completion_status, points_awarded, feedback, submission_id
        )
        SELECT ?, e.id, e.book_id, ?, ?, ?, ?, MAX(MIN(?, e.points_value), 0), ?, ?
        FROM interactive_elements e
        WHERE e.id = ?
        ON CONFLICT DO NOTHING
        RETURNING id
        "#,
    )
    .bind(new.user_id)
    .bind(format_timestamp(new.submitted_at))
    .bind(&payload_in)
    .bind(new.score)
    .bind(new.completion_status.as_str())
    .bind(new.points_awarded)
    .bind(&feedback)
    .bind(new.submission_id.map(|id| id.to_string()))
    .bind(new.element_id)
    .fetch_optional(tx.conn())
    .await?;

    let Some(response_id) = inserted else {
        let existing = match new.submission_id {
            Some(submission_id) => find_by_submission(tx.conn(), new.user_id, submission_id).await?,
            None => None,
        };
        let Some(response) = existing else {
            return Err(Error::NotFound(format!("element {}", new.element_id)));
        };
        if response.element_id != new.element_id {
            return Err(Error::Conflict(format!(
                "submission {} was recorded for element {}",
                response.submission_id.map(|id| id.to_string()).unwrap_or_default(),
                response.element_id
            )));
        }

        let progress = fetch_progress(tx.conn(), response.user_id, response.book_id)
            .await?
            .ok_or_else(|| {
                Error::Internal(format!(
                    "response {} exists without a progress row",
                    response.id
                ))
            })?;
        tx.commit().await?;

        tracing::info!(
            user_id = response.user_id,
            element_id = response.element_id,
            response_id = response.id,
            "Duplicate submission ignored"
        );
        return Ok(SavedResponse {
            response,
            progress,
            new_completion: false,
            duplicate: true,
        });
    };

    let response = get_response_in(tx.conn(), response_id).await?;
    let (progress, new_completion) = apply_response(tx.conn(), &response).await?;
    tx.commit().await?;

    Ok(SavedResponse {
        response,
        progress,
        new_completion,
        duplicate: false,
    })
}
