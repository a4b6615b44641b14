//! Shared fixtures for civic-ie integration tests
//!
//! Each test gets its own database file in a temp dir; the catalog tables
//! (books, chapters, sections, topics) are seeded directly since the engine
//! only reads them.

#![allow(dead_code)]

use std::time::Duration;

use civic_common::EventBus;
use civic_ie::models::{CompletionType, NewElement};
use civic_ie::payload::{ElementType, Payload};
use civic_ie::services::{ElementService, RetryPolicy};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Temporary database; the directory is removed on drop
pub struct TestDb {
    _dir: TempDir,
    pub pool: SqlitePool,
}

pub async fn create_test_db() -> TestDb {
    let dir = TempDir::new().expect("temp dir");
    let pool = civic_common::db::init_database(&dir.path().join("civic_test.db"))
        .await
        .expect("init database");
    TestDb { _dir: dir, pool }
}

/// Insert book `book_id` with one chapter and the given sections
pub async fn seed_book(pool: &SqlitePool, book_id: i64, chapter_id: i64, section_ids: &[i64]) {
    sqlx::query("INSERT INTO books (id, title) VALUES (?, ?)")
        .bind(book_id)
        .bind(format!("Book {}", book_id))
        .execute(pool)
        .await
        .expect("insert book");

    sqlx::query("INSERT INTO chapters (id, book_id, title) VALUES (?, ?, 'Chapter')")
        .bind(chapter_id)
        .bind(book_id)
        .execute(pool)
        .await
        .expect("insert chapter");

    for (position, section_id) in section_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO sections (id, chapter_id, title, content, position) VALUES (?, ?, 'Section', '', ?)",
        )
        .bind(section_id)
        .bind(chapter_id)
        .bind(position as i64)
        .execute(pool)
        .await
        .expect("insert section");
    }
}

pub async fn set_section_content(pool: &SqlitePool, section_id: i64, content: &str) {
    sqlx::query("UPDATE sections SET content = ? WHERE id = ?")
        .bind(content)
        .bind(section_id)
        .execute(pool)
        .await
        .expect("update section");
}

pub async fn seed_topic(pool: &SqlitePool, id: i64, title: &str) {
    sqlx::query("INSERT INTO discussion_topics (id, title, summary) VALUES (?, ?, NULL)")
        .bind(id)
        .bind(title)
        .execute(pool)
        .await
        .expect("insert topic");
}

/// Service with near-zero backoff and no event subscribers
pub fn service(pool: &SqlitePool) -> ElementService {
    service_with_events(pool).0
}

/// Service plus a handle on the bus it publishes to
pub fn service_with_events(pool: &SqlitePool) -> (ElementService, EventBus) {
    let events = EventBus::new(64);
    let svc = ElementService::new(
        pool.clone(),
        events.clone(),
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(5),
        },
    );
    (svc, events)
}

pub fn new_element(
    section_id: i64,
    element_type: ElementType,
    payload: Value,
    completion_type: CompletionType,
    points_value: i64,
    required: bool,
) -> NewElement {
    NewElement {
        section_id,
        position: 0,
        title: format!("{} element", element_type.display_name()),
        description: String::new(),
        payload: Payload::from_value(element_type, payload).expect("valid payload"),
        completion_type,
        points_value,
        required,
    }
}

/// Two multiple-choice questions; correct answers are q1=a, q2=d
pub fn two_question_quiz(section_id: i64, pass_score: u32, points_value: i64, required: bool) -> NewElement {
    new_element(
        section_id,
        ElementType::Quiz,
        json!({
            "questions": [
                {"id": "q1", "text": "Which body drafts bills?", "kind": "multiple-choice",
                 "options": [{"id": "a", "text": "Legislature"}, {"id": "b", "text": "Courts"}],
                 "correct_option_id": "a"},
                {"id": "q2", "text": "Who signs them?", "kind": "multiple-choice",
                 "options": [{"id": "c", "text": "Clerk"}, {"id": "d", "text": "Executive"}],
                 "correct_option_id": "d"}
            ],
            "pass_score": pass_score
        }),
        CompletionType::Graded,
        points_value,
        required,
    )
}

pub fn all_correct() -> Value {
    json!({"answers": {"q1": "a", "q2": "d"}})
}

pub fn one_correct() -> Value {
    json!({"answers": {"q1": "a", "q2": "c"}})
}

pub fn none_correct() -> Value {
    json!({"answers": {"q1": "b", "q2": "c"}})
}

pub fn reflection(section_id: i64, min_length: u32, points_value: i64) -> NewElement {
    new_element(
        section_id,
        ElementType::Reflection,
        json!({"prompt": "What would you change?", "min_response_length": min_length}),
        CompletionType::SelfCheck,
        points_value,
        false,
    )
}

pub fn call_to_action(section_id: i64, points_value: i64) -> NewElement {
    new_element(
        section_id,
        ElementType::CallToAction,
        json!({"action_type": "link", "text": "Register to vote", "button_text": "Register",
               "url": "https://example.org/register"}),
        CompletionType::None,
        points_value,
        false,
    )
}

pub fn poll(section_id: i64, allow_multiple: bool) -> NewElement {
    new_element(
        section_id,
        ElementType::Poll,
        json!({"question": "Which issue matters most?", "allow_multiple": allow_multiple,
               "options": [{"id": "housing", "text": "Housing"}, {"id": "transit", "text": "Transit"},
                           {"id": "parks", "text": "Parks"}]}),
        CompletionType::None,
        5,
        false,
    )
}
