//! Element persistence
//!
//! Payloads are stored in canonical text form and parsed on load. A stored
//! payload that no longer validates is loaded as [`ElementContent::Corrupt`]
//! instead of failing the read.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use civic_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::monitor::begin_monitored;
use super::progress::reconcile_book;
use crate::models::{CompletionType, Element, ElementContent, NewElement};
use crate::payload::ElementType;

const ELEMENT_COLUMNS: &str = "id, section_id, book_id, position, element_type, title, \
     description, payload, completion_type, points_value, required, created_at, updated_at";

/// Fixed-width UTC timestamp; sorts lexicographically in time order
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time at the precision timestamps are stored with
pub fn storage_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("invalid stored timestamp {:?}: {}", raw, e)))
}

fn element_from_row(row: &SqliteRow) -> Result<Element> {
    let id: i64 = row.get("id");

    let element_type: String = row.get("element_type");
    let element_type: ElementType = element_type.parse().map_err(|e| {
        Error::Internal(format!("element {} has invalid type: {}", id, e))
    })?;

    let completion_type: String = row.get("completion_type");
    let completion_type: CompletionType = completion_type.parse().map_err(|e| {
        Error::Internal(format!("element {} has invalid completion type: {}", id, e))
    })?;

    let payload: String = row.get("payload");
    let content = ElementContent::from_stored(element_type, payload);
    if let ElementContent::Corrupt { error, .. } = &content {
        tracing::warn!(element_id = id, error = %error, "Stored payload failed validation");
    }

    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Element {
        id,
        section_id: row.get("section_id"),
        book_id: row.get("book_id"),
        position: row.get("position"),
        element_type,
        title: row.get("title"),
        description: row.get("description"),
        content,
        completion_type,
        points_value: row.get("points_value"),
        required: row.get::<i64, _>("required") != 0,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn canonical_payload(element: &NewElement) -> Result<String> {
    element
        .payload
        .to_canonical_string()
        .map_err(|e| Error::InvalidInput(e.to_string()))
}

/// Elements of a section ordered by position, then id
pub async fn get_elements_by_section(pool: &SqlitePool, section_id: i64) -> Result<Vec<Element>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM interactive_elements WHERE section_id = ? ORDER BY position ASC, id ASC",
        ELEMENT_COLUMNS
    ))
    .bind(section_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(element_from_row).collect()
}

pub async fn get_element(pool: &SqlitePool, id: i64) -> Result<Element> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM interactive_elements WHERE id = ?",
        ELEMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("element {}", id)))?;

    element_from_row(&row)
}

async fn get_element_in(conn: &mut SqliteConnection, id: i64) -> Result<Element> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM interactive_elements WHERE id = ?",
        ELEMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("element {}", id)))?;

    element_from_row(&row)
}

/// Book owning a section, through its chapter
pub async fn resolve_book_id(conn: &mut SqliteConnection, section_id: i64) -> Result<i64> {
    sqlx::query_scalar(
        r#"
        SELECT c.book_id FROM sections s
        JOIN chapters c ON c.id = s.chapter_id
        WHERE s.id = ?
        "#,
    )
    .bind(section_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("section {}", section_id)))
}

/// Insert an element; `book_id` is resolved from the section in the same statement
pub async fn create_element(pool: &SqlitePool, element: &NewElement) -> Result<Element> {
    element
        .validate()
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    let payload = canonical_payload(element)?;
    let now = format_timestamp(storage_now());

    let id: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO interactive_elements (
            section_id, book_id, position, element_type, title, description,
            payload, completion_type, points_value, required, created_at, updated_at
        )
        SELECT s.id, c.book_id, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
        FROM sections s
        JOIN chapters c ON c.id = s.chapter_id
        WHERE s.id = ?
        RETURNING id
        "#,
    )
    .bind(element.position)
    .bind(element.element_type().as_str())
    .bind(&element.title)
    .bind(&element.description)
    .bind(&payload)
    .bind(element.completion_type.as_str())
    .bind(element.points_value)
    .bind(element.required)
    .bind(&now)
    .bind(&now)
    .bind(element.section_id)
    .fetch_optional(pool)
    .await?;

    let id = id.ok_or_else(|| Error::NotFound(format!("section {}", element.section_id)))?;
    tracing::info!(
        element_id = id,
        section_id = element.section_id,
        element_type = element.element_type().as_str(),
        "Created interactive element"
    );

    get_element(pool, id).await
}

/// Replace an element's definition
///
/// Fails with `Conflict` when the payload changes after responses were
/// recorded. Progress rows of the affected book(s) are recomputed in the
/// same transaction.
pub async fn update_element(pool: &SqlitePool, id: i64, element: &NewElement) -> Result<Element> {
    element
        .validate()
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    let payload = canonical_payload(element)?;
    let now = format_timestamp(storage_now());

    let mut tx = begin_monitored(pool, "elements::update_element").await?;

    // Touch the row first so the writer lock is held before anything is read
    let touched = sqlx::query(
        "UPDATE interactive_elements SET updated_at = ? WHERE id = ? RETURNING book_id, payload, element_type",
    )
    .bind(&now)
    .bind(id)
    .fetch_optional(tx.conn())
    .await?
    .ok_or_else(|| Error::NotFound(format!("element {}", id)))?;

    let old_book_id: i64 = touched.get("book_id");
    let old_payload: String = touched.get("payload");
    let old_type: String = touched.get("element_type");

    if old_payload != payload || old_type != element.element_type().as_str() {
        let responses: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM element_responses WHERE element_id = ?")
                .bind(id)
                .fetch_one(tx.conn())
                .await?;
        if responses > 0 {
            return Err(Error::Conflict(format!(
                "element {} has {} recorded responses; its payload can no longer change",
                id, responses
            )));
        }
    }

    let book_id = resolve_book_id(tx.conn(), element.section_id).await?;

    sqlx::query(
        r#"
        UPDATE interactive_elements SET
            section_id = ?, book_id = ?, position = ?, element_type = ?, title = ?,
            description = ?, payload = ?, completion_type = ?, points_value = ?,
            required = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(element.section_id)
    .bind(book_id)
    .bind(element.position)
    .bind(element.element_type().as_str())
    .bind(&element.title)
    .bind(&element.description)
    .bind(&payload)
    .bind(element.completion_type.as_str())
    .bind(element.points_value)
    .bind(element.required)
    .bind(&now)
    .bind(id)
    .execute(tx.conn())
    .await?;

    if book_id != old_book_id {
        sqlx::query("UPDATE element_responses SET book_id = ? WHERE element_id = ?")
            .bind(book_id)
            .bind(id)
            .execute(tx.conn())
            .await?;
        reconcile_book(tx.conn(), old_book_id).await?;
    }
    reconcile_book(tx.conn(), book_id).await?;

    let updated = get_element_in(tx.conn(), id).await?;
    tx.commit().await?;

    tracing::info!(element_id = id, book_id, "Updated interactive element");
    Ok(updated)
}

/// What a delete removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletedElement {
    pub element_id: i64,
    pub book_id: i64,
    pub removed_responses: u64,
}

/// Delete an element and every response to it in one transaction
pub async fn delete_element(pool: &SqlitePool, id: i64) -> Result<DeletedElement> {
    let mut tx = begin_monitored(pool, "elements::delete_element").await?;

    let removed_responses = sqlx::query("DELETE FROM element_responses WHERE element_id = ?")
        .bind(id)
        .execute(tx.conn())
        .await?
        .rows_affected();

    let book_id: i64 =
        sqlx::query_scalar("DELETE FROM interactive_elements WHERE id = ? RETURNING book_id")
            .bind(id)
            .fetch_optional(tx.conn())
            .await?
            .ok_or_else(|| Error::NotFound(format!("element {}", id)))?;

    reconcile_book(tx.conn(), book_id).await?;
    tx.commit().await?;

    tracing::info!(
        element_id = id,
        book_id,
        removed_responses,
        "Deleted interactive element"
    );

    Ok(DeletedElement {
        element_id: id,
        book_id,
        removed_responses,
    })
}
