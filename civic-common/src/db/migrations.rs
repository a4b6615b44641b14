//! Database schema migrations
//!
//! Versioned, idempotent migrations tracked in `schema_version`. Each
//! migration checks the current table shape before altering it, so running
//! the sequence against a freshly created schema is a no-op apart from the
//! indexes it owns.
//!
//! Never modify an existing migration; add a new one and bump
//! `CURRENT_SCHEMA_VERSION`.

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database (0 when none recorded)
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    Ok(())
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

async fn add_column(pool: &SqlitePool, table: &str, column: &str, decl: &str) -> Result<()> {
    if column_exists(pool, table, column).await? {
        info!("  {}.{} already exists - skipping", table, column);
        return Ok(());
    }

    let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, decl);
    match sqlx::query(&sql).execute(pool).await {
        Ok(_) => {
            info!("  ✓ Added {}.{}", table, column);
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
            info!("  {}.{} added by concurrent initializer - skipping", table, column);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Migration v1: submission deduplication key
///
/// Adds `element_responses.submission_id` and the unique index that makes a
/// retried submission with the same client nonce a no-op.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: submission deduplication key");

    add_column(pool, "element_responses", "submission_id", "TEXT").await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_responses_submission
        ON element_responses(user_id, submission_id)
        WHERE submission_id IS NOT NULL
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Migration v2: denormalized `book_id` on elements
///
/// Older databases resolved the book through section → chapter on every
/// write. Adds the column, backfills it from the hierarchy and indexes it.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: denormalize book_id onto interactive_elements");

    add_column(
        pool,
        "interactive_elements",
        "book_id",
        "INTEGER NOT NULL DEFAULT 0",
    )
    .await?;

    let backfilled = sqlx::query(
        r#"
        UPDATE interactive_elements
        SET book_id = (
            SELECT c.book_id FROM sections s
            JOIN chapters c ON c.id = s.chapter_id
            WHERE s.id = interactive_elements.section_id
        )
        WHERE book_id = 0
          AND EXISTS (
            SELECT 1 FROM sections s
            JOIN chapters c ON c.id = s.chapter_id
            WHERE s.id = interactive_elements.section_id
        )
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    if backfilled > 0 {
        info!("  ✓ Backfilled book_id on {} elements", backfilled);
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_elements_book ON interactive_elements(book_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
