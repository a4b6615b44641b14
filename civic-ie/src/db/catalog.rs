//! Read-only lookups into tables owned by other services

use civic_common::{Error, Result};
use sqlx::{Row, SqlitePool};

use crate::models::DiscussionTopic;

/// Section source plus the book it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSource {
    pub id: i64,
    pub book_id: i64,
    pub content: String,
}

pub async fn get_section(pool: &SqlitePool, section_id: i64) -> Result<SectionSource> {
    let row = sqlx::query(
        r#"
        SELECT s.id, c.book_id, s.content
        FROM sections s
        JOIN chapters c ON c.id = s.chapter_id
        WHERE s.id = ?
        "#,
    )
    .bind(section_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("section {}", section_id)))?;

    Ok(SectionSource {
        id: row.get("id"),
        book_id: row.get("book_id"),
        content: row.get("content"),
    })
}

/// Topics with the given ids, in one query; unknown ids are skipped
pub async fn get_topics(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<DiscussionTopic>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT id, title, summary FROM discussion_topics WHERE id IN ({}) ORDER BY id",
        placeholders
    );

    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(*id);
    }

    let rows = query.fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|row| DiscussionTopic {
            id: row.get("id"),
            title: row.get("title"),
            summary: row.get("summary"),
        })
        .collect())
}
