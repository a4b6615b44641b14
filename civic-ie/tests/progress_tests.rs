//! Progress aggregation integration tests
//!
//! Concrete grading scenarios against a real database, randomized response
//! sequences checked against the aggregate invariants, repeat completions
//! and concurrent submissions.

mod helpers;

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use civic_common::EngineEvent;
use civic_ie::db;
use civic_ie::grader::{self, IssueKind};
use civic_ie::models::{CompletionStatus, NewResponse, UserBookProgress};
use civic_ie::services::{ElementService, ServiceError};
use helpers::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use sqlx::{Row, SqlitePool};
use tokio::task::JoinSet;

const BOOK: i64 = 1;
const SECTION: i64 = 10;

async fn setup() -> TestDb {
    let test_db = create_test_db().await;
    seed_book(&test_db.pool, BOOK, 100, &[SECTION]).await;
    test_db
}

/// Aggregate fields only; `updated_at` differs between derivations
fn aggregates(p: &UserBookProgress) -> (i64, i64, i64, i64, i64, i64, bool) {
    (
        p.total_elements,
        p.completed_elements,
        p.completion_percentage,
        p.total_points_available,
        p.total_points_earned,
        p.avg_score_percentage,
        p.required_completed,
    )
}

// =============================================================================
// Concrete scenarios
// =============================================================================

#[tokio::test]
async fn test_quiz_pass_then_failed_retry() {
    let test_db = setup().await;
    let svc = service(&test_db.pool);
    let quiz = svc
        .create_element(two_question_quiz(SECTION, 75, 20, true))
        .await
        .unwrap();

    // Quiz pass, one attempt
    let passed = svc.submit_response(1, quiz.id, all_correct(), None).await.unwrap();
    assert_eq!(passed.outcome.score, 100);
    assert_eq!(passed.outcome.status, CompletionStatus::Completed);
    assert_eq!(passed.outcome.points, 20);
    assert_eq!(passed.progress.completed_elements, 1);
    assert_eq!(passed.progress.completion_percentage, 100);
    assert_eq!(passed.progress.total_points_earned, 20);
    assert_eq!(passed.progress.avg_score_percentage, 100);
    assert!(passed.progress.required_completed);

    // Second attempt after pass
    let retry = svc.submit_response(1, quiz.id, none_correct(), None).await.unwrap();
    assert_eq!(retry.outcome.score, 0);
    assert_eq!(retry.outcome.status, CompletionStatus::Failed);
    assert_eq!(retry.outcome.points, 0);
    assert_eq!(retry.progress.completed_elements, 1);
    assert_eq!(retry.progress.total_points_earned, 20);
    assert_eq!(retry.progress.avg_score_percentage, 50);
    assert!(retry.progress.required_completed);

    assert_eq!(svc.get_progress(1, BOOK).await.unwrap(), retry.progress);
}

#[tokio::test]
async fn test_quiz_partial() {
    let test_db = setup().await;
    let svc = service(&test_db.pool);
    let quiz = svc
        .create_element(two_question_quiz(SECTION, 75, 20, true))
        .await
        .unwrap();

    let half = svc.submit_response(2, quiz.id, one_correct(), None).await.unwrap();
    assert_eq!(half.outcome.score, 50);
    assert_eq!(half.outcome.status, CompletionStatus::Failed);
    assert_eq!(half.outcome.points, 0);
    assert_eq!(half.progress.completed_elements, 0);
    assert_eq!(half.progress.avg_score_percentage, 50);
    assert!(!half.progress.required_completed);

    let feedback = half.outcome.feedback.unwrap();
    assert_eq!(feedback[1]["correct"], false);
    assert!(feedback[1].get("expected").is_none());
}

#[tokio::test]
async fn test_reflection_length_boundary() {
    let test_db = setup().await;
    let svc = service(&test_db.pool);
    let note = svc.create_element(reflection(SECTION, 100, 15)).await.unwrap();

    let short = svc
        .submit_response(1, note.id, json!({"response": "x".repeat(99)}), None)
        .await
        .unwrap();
    assert_eq!(short.outcome.status, CompletionStatus::Partial);
    assert_eq!(short.outcome.points, 0);
    assert_eq!(short.progress.completed_elements, 0);

    let enough = svc
        .submit_response(1, note.id, json!({"response": "x".repeat(100)}), None)
        .await
        .unwrap();
    assert_eq!(enough.outcome.status, CompletionStatus::Completed);
    assert_eq!(enough.outcome.points, 15);
    assert_eq!(enough.progress.completed_elements, 1);
    assert_eq!(enough.progress.total_points_earned, 15);
}

#[tokio::test]
async fn test_call_to_action_acknowledgement() {
    let test_db = setup().await;
    let svc = service(&test_db.pool);
    let cta = svc.create_element(call_to_action(SECTION, 5)).await.unwrap();

    let done = svc
        .submit_response(
            1,
            cta.id,
            json!({"action_type": "link", "action_data": {"href": "https://example.org/register"}}),
            None,
        )
        .await
        .unwrap();
    assert_eq!(done.outcome.status, CompletionStatus::Completed);
    assert_eq!(done.outcome.points, 5);
    assert_eq!(done.progress.total_points_earned, 5);
}

#[tokio::test]
async fn test_call_to_action_none_accepts_any_body() {
    let test_db = setup().await;
    let svc = service(&test_db.pool);
    let cta = svc.create_element(call_to_action(SECTION, 5)).await.unwrap();

    let done = svc
        .submit_response(1, cta.id, json!({"clicked": true}), None)
        .await
        .unwrap();
    assert_eq!(done.outcome.status, CompletionStatus::Completed);
    assert_eq!(done.outcome.score, 100);
    assert_eq!(done.response.payload_in, json!({"clicked": true}));
    assert_eq!(done.progress.total_points_earned, 5);
}

#[tokio::test]
async fn test_submitted_progress_matches_stored_row() {
    let test_db = setup().await;
    let svc = service(&test_db.pool);
    let quiz = svc
        .create_element(two_question_quiz(SECTION, 75, 20, false))
        .await
        .unwrap();

    for submission in [one_correct(), all_correct(), none_correct()] {
        let submitted = svc.submit_response(1, quiz.id, submission, None).await.unwrap();
        assert_eq!(svc.get_progress(1, BOOK).await.unwrap(), submitted.progress);
        assert_eq!(
            svc.latest_response(1, quiz.id).await.unwrap(),
            submitted.response
        );
    }
}

#[tokio::test]
async fn test_points_capped_when_value_lowered_after_grading() {
    let test_db = setup().await;
    let svc = service(&test_db.pool);
    let quiz = svc
        .create_element(two_question_quiz(SECTION, 75, 20, false))
        .await
        .unwrap();

    // Graded against 20 points, then the element drops to 5 before the insert
    let outcome = grader::grade(&quiz, &all_correct());
    assert_eq!(outcome.points, 20);
    svc.update_element(quiz.id, two_question_quiz(SECTION, 75, 5, false))
        .await
        .unwrap();

    let saved = db::save_response_and_update_progress(
        &test_db.pool,
        &NewResponse {
            user_id: 1,
            element_id: quiz.id,
            submitted_at: Utc::now(),
            payload_in: all_correct(),
            score: outcome.score,
            completion_status: outcome.status,
            points_awarded: outcome.points,
            feedback: outcome.feedback.clone(),
            submission_id: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(saved.response.points_awarded, 5);
    assert_eq!(saved.progress.total_points_available, 5);
    assert_eq!(saved.progress.total_points_earned, 5);

    let mut conn = test_db.pool.acquire().await.unwrap();
    let recomputed = db::recompute_progress(&mut conn, 1, BOOK).await.unwrap();
    assert_eq!(aggregates(&saved.progress), aggregates(&recomputed));
}

#[tokio::test]
async fn test_rejected_submission_leaves_no_trace() {
    let test_db = setup().await;
    let svc = service(&test_db.pool);
    let vote = svc.create_element(poll(SECTION, false)).await.unwrap();

    match svc
        .submit_response(1, vote.id, json!({"option_ids": ["lighthouse"]}), None)
        .await
        .unwrap_err()
    {
        ServiceError::Rejected(issue) => assert_eq!(issue.kind, IssueKind::UnknownOptionId),
        other => panic!("unexpected {:?}", other),
    }

    match svc
        .submit_response(1, vote.id, json!(["housing"]), None)
        .await
        .unwrap_err()
    {
        ServiceError::Rejected(issue) => {
            assert_eq!(issue.kind, IssueKind::InvalidSubmissionShape)
        }
        other => panic!("unexpected {:?}", other),
    }

    assert!(svc.list_responses(1, vote.id).await.unwrap().is_empty());
    assert!(matches!(
        svc.get_progress(1, BOOK).await.unwrap_err(),
        ServiceError::Storage(civic_common::Error::NotFound(_))
    ));

    let counted = svc
        .submit_response(1, vote.id, json!({"option_ids": ["transit"]}), None)
        .await
        .unwrap();
    assert_eq!(counted.outcome.feedback.unwrap()["option_ids"], json!(["transit"]));
}

#[tokio::test]
async fn test_submit_to_missing_element() {
    let test_db = setup().await;
    let err = service(&test_db.pool)
        .submit_response(1, 404, all_correct(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Storage(civic_common::Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_aggregate_failure_rolls_back_response() {
    let test_db = setup().await;
    let svc = service(&test_db.pool);
    let quiz = svc
        .create_element(two_question_quiz(SECTION, 75, 20, false))
        .await
        .unwrap();

    sqlx::query("DROP TABLE user_book_progress")
        .execute(&test_db.pool)
        .await
        .unwrap();

    let err = svc
        .submit_response(1, quiz.id, all_correct(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Storage(_)), "unexpected {:?}", err);

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM element_responses")
        .fetch_one(&test_db.pool)
        .await
        .unwrap();
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn test_submission_publishes_events() {
    let test_db = setup().await;
    let (svc, bus) = service_with_events(&test_db.pool);
    let quiz = svc
        .create_element(two_question_quiz(SECTION, 75, 20, true))
        .await
        .unwrap();
    let mut events = bus.subscribe();

    let submitted = svc.submit_response(3, quiz.id, all_correct(), None).await.unwrap();

    match events.try_recv().unwrap() {
        EngineEvent::ResponseRecorded {
            response_id,
            user_id,
            score,
            new_completion,
            ..
        } => {
            assert_eq!(response_id, submitted.response.id);
            assert_eq!(user_id, 3);
            assert_eq!(score, 100);
            assert!(new_completion);
        }
        other => panic!("unexpected event {:?}", other),
    }
    match events.try_recv().unwrap() {
        EngineEvent::ProgressUpdated {
            book_id,
            completion_percentage,
            required_completed,
            ..
        } => {
            assert_eq!(book_id, BOOK);
            assert_eq!(completion_percentage, 100);
            assert!(required_completed);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

// =============================================================================
// Repeat completions
// =============================================================================

#[tokio::test]
async fn test_repeat_completions_do_not_recount() {
    let test_db = setup().await;
    let svc = service(&test_db.pool);
    let quiz = svc
        .create_element(two_question_quiz(SECTION, 75, 20, false))
        .await
        .unwrap();
    svc.create_element(call_to_action(SECTION, 5)).await.unwrap();

    let first = svc.submit_response(1, quiz.id, all_correct(), None).await.unwrap();
    assert_eq!(first.progress.completed_elements, 1);
    assert_eq!(first.progress.total_points_earned, 20);

    let failed = svc.submit_response(1, quiz.id, one_correct(), None).await.unwrap();
    assert_eq!(failed.progress.avg_score_percentage, 75);

    for _ in 0..5 {
        let again = svc.submit_response(1, quiz.id, all_correct(), None).await.unwrap();
        assert_eq!(again.outcome.points, 20);
        assert_eq!(again.progress.completed_elements, 1);
        assert_eq!(again.progress.total_points_earned, 20);
        assert_eq!(again.progress.completion_percentage, 50);
    }

    // Scores 100, 50, then five more 100s
    let progress = svc.get_progress(1, BOOK).await.unwrap();
    assert_eq!(progress.avg_score_percentage, (100 * 6 + 50) / 7);
}

// =============================================================================
// Randomized sequences
// =============================================================================

/// One element of the randomized book with the submissions drawn for it
struct Target {
    element_id: i64,
    submissions: Vec<Value>,
}

async fn randomized_book(svc: &ElementService) -> Vec<Target> {
    let quiz = svc
        .create_element(two_question_quiz(SECTION, 75, 20, true))
        .await
        .unwrap();
    let easy_quiz = svc
        .create_element(two_question_quiz(SECTION, 50, 10, false))
        .await
        .unwrap();
    let mut note = reflection(SECTION, 20, 15);
    note.required = true;
    let note = svc.create_element(note).await.unwrap();
    let cta = svc.create_element(call_to_action(SECTION, 5)).await.unwrap();

    let quiz_answers = vec![all_correct(), one_correct(), none_correct()];
    vec![
        Target {
            element_id: quiz.id,
            submissions: quiz_answers.clone(),
        },
        Target {
            element_id: easy_quiz.id,
            submissions: quiz_answers,
        },
        Target {
            element_id: note.id,
            submissions: vec![
                json!({"response": "too short"}),
                json!({"response": "Local budgets shape every ward."}),
            ],
        },
        Target {
            element_id: cta.id,
            submissions: vec![
                json!({"action_type": "link", "action_data": {"clicked": true}}),
                json!({"action_type": "link"}),
            ],
        },
    ]
}

/// Check the stored aggregate against the raw responses and a full recompute
async fn assert_invariants(pool: &SqlitePool, user_id: i64, book_id: i64) {
    let progress = db::get_progress(pool, user_id, book_id).await.unwrap();

    let elements: BTreeMap<i64, (i64, bool, String)> = sqlx::query(
        "SELECT id, points_value, required, completion_type FROM interactive_elements WHERE book_id = ?",
    )
    .bind(book_id)
    .fetch_all(pool)
    .await
    .unwrap()
    .iter()
    .map(|row| {
        (
            row.get::<i64, _>("id"),
            (
                row.get::<i64, _>("points_value"),
                row.get::<i64, _>("required") != 0,
                row.get::<String, _>("completion_type"),
            ),
        )
    })
    .collect();

    let responses = sqlx::query(
        "SELECT id, element_id, score, completion_status, points_awarded FROM element_responses \
         WHERE user_id = ? AND book_id = ? ORDER BY id",
    )
    .bind(user_id)
    .bind(book_id)
    .fetch_all(pool)
    .await
    .unwrap();

    let mut first_completion: BTreeMap<i64, i64> = BTreeMap::new();
    let mut score_sum = 0;
    for row in &responses {
        let element_id: i64 = row.get("element_id");
        let status: String = row.get("completion_status");
        let points: i64 = row.get("points_awarded");
        score_sum += row.get::<i64, _>("score");

        let (_, _, completion_type) = &elements[&element_id];
        if completion_type == "graded" && status != "completed" {
            assert_eq!(points, 0, "non-completed graded response awarded points");
        }
        if status == "completed" {
            first_completion.entry(element_id).or_insert(points);
        }
    }

    let total = elements.len() as i64;
    let completed = first_completion.len() as i64;
    assert_eq!(progress.total_elements, total);
    assert_eq!(progress.completed_elements, completed);
    assert!(progress.completed_elements <= progress.total_elements);
    let expected_pct = if total > 0 { 100 * completed / total } else { 0 };
    assert_eq!(progress.completion_percentage, expected_pct);

    let available: i64 = elements.values().map(|(p, _, _)| p).sum();
    assert_eq!(progress.total_points_available, available);
    assert_eq!(
        progress.total_points_earned,
        first_completion.values().sum::<i64>()
    );
    assert!(progress.total_points_earned <= progress.total_points_available);

    let expected_avg = if responses.is_empty() {
        0
    } else {
        score_sum / responses.len() as i64
    };
    assert_eq!(progress.avg_score_percentage, expected_avg);

    let done: BTreeSet<i64> = first_completion.keys().copied().collect();
    let required_done = elements
        .iter()
        .filter(|(_, (_, required, _))| *required)
        .all(|(id, _)| done.contains(id));
    assert_eq!(progress.required_completed, required_done);

    let mut conn = pool.acquire().await.unwrap();
    let recomputed = db::recompute_progress(&mut conn, user_id, book_id)
        .await
        .unwrap();
    assert_eq!(aggregates(&progress), aggregates(&recomputed));
}

#[tokio::test]
async fn test_random_sequences_keep_invariants() {
    let test_db = setup().await;
    let svc = service(&test_db.pool);
    let targets = randomized_book(&svc).await;

    for seed in [3_u64, 17, 2024] {
        let mut rng = StdRng::seed_from_u64(seed);
        let user_id = seed as i64;

        for _ in 0..25 {
            let target = &targets[rng.gen_range(0..targets.len())];
            let submission = target.submissions[rng.gen_range(0..target.submissions.len())].clone();

            svc.submit_response(user_id, target.element_id, submission, None)
                .await
                .unwrap();
            assert_invariants(&test_db.pool, user_id, BOOK).await;
        }
    }
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_submissions_on_distinct_elements() {
    let test_db = setup().await;
    let svc = service(&test_db.pool);

    let mut quiz_ids = Vec::new();
    for points in 1..=8 {
        let quiz = svc
            .create_element(two_question_quiz(SECTION, 75, points, points % 2 == 0))
            .await
            .unwrap();
        quiz_ids.push(quiz.id);
    }

    let mut join_set = JoinSet::new();
    for (i, element_id) in quiz_ids.iter().copied().enumerate() {
        let svc = svc.clone();
        // Every third element gets a failing attempt
        let submission = if i % 3 == 2 { none_correct() } else { all_correct() };
        join_set.spawn(async move { svc.submit_response(1, element_id, submission, None).await });
    }

    let mut new_completions = 0;
    while let Some(result) = join_set.join_next().await {
        let submitted = result.expect("task panicked").expect("submission failed");
        if submitted.outcome.status == CompletionStatus::Completed {
            new_completions += 1;
        }
    }

    let progress = svc.get_progress(1, BOOK).await.unwrap();
    assert_eq!(progress.completed_elements, new_completions);
    assert_eq!(progress.completed_elements, 6);
    // Failing attempts went to elements 3 and 6 (zero-based 2 and 5)
    assert_eq!(progress.total_points_earned, 36 - 3 - 6);
    assert_eq!(progress.avg_score_percentage, 600 / 8);
    assert!(!progress.required_completed);

    assert_invariants(&test_db.pool, 1, BOOK).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_completions_of_one_element_count_once() {
    let test_db = setup().await;
    let svc = service(&test_db.pool);
    let quiz = svc
        .create_element(two_question_quiz(SECTION, 75, 20, true))
        .await
        .unwrap();

    let mut join_set = JoinSet::new();
    for _ in 0..6 {
        let svc = svc.clone();
        join_set.spawn(async move { svc.submit_response(1, quiz.id, all_correct(), None).await });
    }

    while let Some(result) = join_set.join_next().await {
        let submitted = result.expect("task panicked").expect("submission failed");
        // Every attempt sees exactly one counted completion
        assert_eq!(submitted.progress.completed_elements, 1);
        assert_eq!(submitted.progress.total_points_earned, 20);
    }

    let progress = svc.get_progress(1, BOOK).await.unwrap();
    assert_eq!(progress.completed_elements, 1);
    assert_eq!(progress.total_points_earned, 20);
    assert_eq!(svc.list_responses(1, quiz.id).await.unwrap().len(), 6);
    assert_invariants(&test_db.pool, 1, BOOK).await;
}
