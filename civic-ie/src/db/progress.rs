//! Per (user, book) progress aggregate
//!
//! [`apply_response`] runs inside the transaction that inserted the response
//! and updates the aggregate incrementally. [`recompute_progress`] derives
//! the same row from stored data; element edits and deletes use it through
//! [`reconcile_book`].

use civic_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::elements::{format_timestamp, parse_timestamp, storage_now};
use crate::models::{percentage, CompletionStatus, Response, UserBookProgress};

const PROGRESS_COLUMNS: &str = "user_id, book_id, total_elements, completed_elements, \
     completion_percentage, total_points_available, total_points_earned, \
     avg_score_percentage, required_completed, updated_at";

fn progress_from_row(row: &SqliteRow) -> Result<UserBookProgress> {
    let updated_at: String = row.get("updated_at");
    Ok(UserBookProgress {
        user_id: row.get("user_id"),
        book_id: row.get("book_id"),
        total_elements: row.get("total_elements"),
        completed_elements: row.get("completed_elements"),
        completion_percentage: row.get("completion_percentage"),
        total_points_available: row.get("total_points_available"),
        total_points_earned: row.get("total_points_earned"),
        avg_score_percentage: row.get("avg_score_percentage"),
        required_completed: row.get::<i64, _>("required_completed") != 0,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

pub async fn get_progress(pool: &SqlitePool, user_id: i64, book_id: i64) -> Result<UserBookProgress> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM user_book_progress WHERE user_id = ? AND book_id = ?",
        PROGRESS_COLUMNS
    ))
    .bind(user_id)
    .bind(book_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("progress for user {} in book {}", user_id, book_id)))?;

    progress_from_row(&row)
}

pub(crate) async fn fetch_progress(
    conn: &mut SqliteConnection,
    user_id: i64,
    book_id: i64,
) -> Result<Option<UserBookProgress>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM user_book_progress WHERE user_id = ? AND book_id = ?",
        PROGRESS_COLUMNS
    ))
    .bind(user_id)
    .bind(book_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(progress_from_row).transpose()
}

async fn upsert_progress(conn: &mut SqliteConnection, progress: &UserBookProgress) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_book_progress (
            user_id, book_id, total_elements, completed_elements, completion_percentage,
            total_points_available, total_points_earned, avg_score_percentage,
            required_completed, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, book_id) DO UPDATE SET
            total_elements = excluded.total_elements,
            completed_elements = excluded.completed_elements,
            completion_percentage = excluded.completion_percentage,
            total_points_available = excluded.total_points_available,
            total_points_earned = excluded.total_points_earned,
            avg_score_percentage = excluded.avg_score_percentage,
            required_completed = excluded.required_completed,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(progress.user_id)
    .bind(progress.book_id)
    .bind(progress.total_elements)
    .bind(progress.completed_elements)
    .bind(progress.completion_percentage)
    .bind(progress.total_points_available)
    .bind(progress.total_points_earned)
    .bind(progress.avg_score_percentage)
    .bind(progress.required_completed)
    .bind(format_timestamp(progress.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Element count and point sum of a book
async fn book_totals(conn: &mut SqliteConnection, book_id: i64) -> Result<(i64, i64)> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS elements, COALESCE(SUM(points_value), 0) AS points \
         FROM interactive_elements WHERE book_id = ?",
    )
    .bind(book_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok((row.get("elements"), row.get("points")))
}

/// `floor(mean(score))` over every response of the user in the book
async fn average_score(conn: &mut SqliteConnection, user_id: i64, book_id: i64) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COALESCE(SUM(score), 0) AS total, COUNT(*) AS n \
         FROM element_responses WHERE user_id = ? AND book_id = ?",
    )
    .bind(user_id)
    .bind(book_id)
    .fetch_one(&mut *conn)
    .await?;

    let total: i64 = row.get("total");
    let n: i64 = row.get("n");
    Ok(if n == 0 { 0 } else { total / n })
}

/// True when every current required element of the book has a completed response
async fn required_completed(
    conn: &mut SqliteConnection,
    user_id: i64,
    book_id: i64,
) -> Result<bool> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM interactive_elements
             WHERE book_id = ?1 AND required = 1) AS required_total,
            (SELECT COUNT(DISTINCT r.element_id)
             FROM element_responses r
             JOIN interactive_elements e ON e.id = r.element_id
             WHERE r.user_id = ?2 AND e.book_id = ?1 AND e.required = 1
               AND r.completion_status = 'completed') AS required_done
        "#,
    )
    .bind(book_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    let total: i64 = row.get("required_total");
    let done: i64 = row.get("required_done");
    Ok(done == total)
}

/// No earlier completed response exists for this (user, element)
async fn is_new_completion(conn: &mut SqliteConnection, response: &Response) -> Result<bool> {
    if response.completion_status != CompletionStatus::Completed {
        return Ok(false);
    }

    let earlier: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM element_responses
            WHERE user_id = ? AND element_id = ? AND completion_status = 'completed' AND id <> ?
        )
        "#,
    )
    .bind(response.user_id)
    .bind(response.element_id)
    .bind(response.id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(!earlier)
}

/// Fold a just-inserted response into its aggregate row
///
/// Returns the persisted row and whether the response was a new completion.
pub(crate) async fn apply_response(
    conn: &mut SqliteConnection,
    response: &Response,
) -> Result<(UserBookProgress, bool)> {
    let (user_id, book_id) = (response.user_id, response.book_id);

    let mut progress = fetch_progress(conn, user_id, book_id)
        .await?
        .unwrap_or_else(|| empty_progress(user_id, book_id));

    let (total_elements, total_points) = book_totals(conn, book_id).await?;
    progress.total_elements = total_elements;
    progress.total_points_available = total_points;

    let new_completion = is_new_completion(conn, response).await?;
    if new_completion {
        progress.completed_elements += 1;
        progress.total_points_earned += response.points_awarded;
    }

    progress.completion_percentage =
        percentage(progress.completed_elements, progress.total_elements);
    progress.avg_score_percentage = average_score(conn, user_id, book_id).await?;
    progress.required_completed = required_completed(conn, user_id, book_id).await?;
    progress.updated_at = storage_now();

    upsert_progress(conn, &progress).await?;

    tracing::debug!(
        user_id,
        book_id,
        response_id = response.id,
        new_completion,
        completed_elements = progress.completed_elements,
        "Progress updated"
    );

    Ok((progress, new_completion))
}

fn empty_progress(user_id: i64, book_id: i64) -> UserBookProgress {
    UserBookProgress {
        user_id,
        book_id,
        total_elements: 0,
        completed_elements: 0,
        completion_percentage: 0,
        total_points_available: 0,
        total_points_earned: 0,
        avg_score_percentage: 0,
        required_completed: false,
        updated_at: storage_now(),
    }
}

/// Derive the aggregate for (user, book) from stored elements and responses
///
/// Points earned per element come from its first completed response,
/// capped at the element's current `points_value`.
pub async fn recompute_progress(
    conn: &mut SqliteConnection,
    user_id: i64,
    book_id: i64,
) -> Result<UserBookProgress> {
    let (total_elements, total_points_available) = book_totals(conn, book_id).await?;

    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS completed,
            COALESCE(SUM(MIN(r.points_awarded, e.points_value)), 0) AS earned
        FROM element_responses r
        JOIN interactive_elements e ON e.id = r.element_id
        WHERE r.id IN (
            SELECT MIN(id) FROM element_responses
            WHERE user_id = ?1 AND book_id = ?2 AND completion_status = 'completed'
            GROUP BY element_id
        )
          AND e.book_id = ?2
        "#,
    )
    .bind(user_id)
    .bind(book_id)
    .fetch_one(&mut *conn)
    .await?;

    let completed_elements: i64 = row.get("completed");
    let total_points_earned: i64 = row.get("earned");

    Ok(UserBookProgress {
        user_id,
        book_id,
        total_elements,
        completed_elements,
        completion_percentage: percentage(completed_elements, total_elements),
        total_points_available,
        total_points_earned,
        avg_score_percentage: average_score(conn, user_id, book_id).await?,
        required_completed: required_completed(conn, user_id, book_id).await?,
        updated_at: storage_now(),
    })
}

/// Recompute the progress of every user with a row or a response in the book
///
/// Returns how many rows were written.
pub async fn reconcile_book(conn: &mut SqliteConnection, book_id: i64) -> Result<u64> {
    let users: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT user_id FROM user_book_progress WHERE book_id = ?1
        UNION
        SELECT user_id FROM element_responses WHERE book_id = ?1
        ORDER BY user_id
        "#,
    )
    .bind(book_id)
    .fetch_all(&mut *conn)
    .await?;

    for &user_id in &users {
        let progress = recompute_progress(conn, user_id, book_id).await?;
        upsert_progress(conn, &progress).await?;
    }

    if !users.is_empty() {
        tracing::debug!(book_id, users = users.len(), "Reconciled book progress");
    }
    Ok(users.len() as u64)
}
