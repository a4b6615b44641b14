//! Integration tests for civic-ie API endpoints

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use civic_common::EventBus;
use civic_ie::services::RetryPolicy;
use civic_ie::{build_router, AppState};
use helpers::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot` method

const SECTION: i64 = 10;

/// Test helper: router over a seeded temporary database
async fn setup_app() -> (TestDb, axum::Router) {
    let test_db = create_test_db().await;
    seed_book(&test_db.pool, 1, 100, &[SECTION]).await;
    let state = AppState::new(test_db.pool.clone(), EventBus::new(16), RetryPolicy::default());
    let app = build_router(state);
    (test_db, app)
}

fn json_request(method: &str, uri: &str, user_id: Option<i64>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user_id) = user_id {
        builder = builder.header("x-user-id", user_id.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, user_id: Option<i64>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header("x-user-id", user_id.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("JSON body")
}

fn quiz_body() -> Value {
    json!({
        "section_id": SECTION,
        "type": "quiz",
        "title": "Checkpoint",
        "completion_type": "graded",
        "points_value": 20,
        "required": true,
        "payload": {
            "questions": [
                {"id": "q1", "text": "Which body drafts bills?", "kind": "multiple-choice",
                 "options": [{"id": "a", "text": "Legislature"}, {"id": "b", "text": "Courts"}],
                 "correct_option_id": "a"},
                {"id": "q2", "text": "Who signs them?", "kind": "multiple-choice",
                 "options": [{"id": "c", "text": "Clerk"}, {"id": "d", "text": "Executive"}],
                 "correct_option_id": "d"}
            ],
            "pass_score": 75
        }
    })
}

async fn create_quiz(app: &axum::Router) -> i64 {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/elements", None, quiz_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_db, app) = setup_app().await;

    let response = app.oneshot(get_request("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "civic-ie");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_element_lifecycle() {
    let (_db, app) = setup_app().await;
    let id = create_quiz(&app).await;

    let response = app
        .clone()
        .oneshot(get_request(&format!("/elements/{}", id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let element = body_json(response).await;
    assert_eq!(element["type"], "quiz");
    assert_eq!(element["book_id"], 1);
    assert_eq!(element["completion_type"], "graded");
    assert_eq!(element["payload"]["pass_score"], 75);

    let response = app
        .clone()
        .oneshot(get_request(&format!("/sections/{}/elements", SECTION), None))
        .await
        .unwrap();
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let mut renamed = quiz_body();
    renamed["title"] = json!("Renamed");
    let response = app
        .clone()
        .oneshot(json_request("PUT", &format!("/elements/{}", id), None, renamed))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["title"], "Renamed");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/elements/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(get_request(&format!("/elements/{}", id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NotFound");
}

#[tokio::test]
async fn test_create_element_validation_errors() {
    let (_db, app) = setup_app().await;

    let mut bad_type = quiz_body();
    bad_type["type"] = json!("survey");
    let response = app
        .clone()
        .oneshot(json_request("POST", "/elements", None, bad_type))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["code"], "EnumOutOfRange");

    let mut no_questions = quiz_body();
    no_questions["payload"] = json!({"pass_score": 50});
    let response = app
        .clone()
        .oneshot(json_request("POST", "/elements", None, no_questions))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["code"], "MissingField");

    let mut orphan = quiz_body();
    orphan["section_id"] = json!(999);
    let response = app
        .oneshot(json_request("POST", "/elements", None, orphan))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submit_and_read_progress() {
    let (_db, app) = setup_app().await;
    let id = create_quiz(&app).await;
    let uri = format!("/elements/{}/responses", id);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &uri,
            Some(5),
            json!({
                "submission": {"answers": {"q1": "a", "q2": "d"}},
                "submission_id": "6f1c3a52-9a9e-4a55-8f6e-1d2b7c0e9a11"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let submitted = body_json(response).await;
    assert_eq!(submitted["outcome"]["score"], 100);
    assert_eq!(submitted["outcome"]["status"], "completed");
    assert_eq!(submitted["progress"]["total_points_earned"], 20);
    assert_eq!(submitted["duplicate"], false);

    // Retried delivery of the same submission
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &uri,
            Some(5),
            json!({
                "submission": {"answers": {"q1": "a", "q2": "d"}},
                "submission_id": "6f1c3a52-9a9e-4a55-8f6e-1d2b7c0e9a11"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["duplicate"], true);

    let response = app
        .clone()
        .oneshot(get_request(&uri, Some(5)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(get_request(&format!("{}/latest", uri), Some(5)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["score"], 100);

    let response = app
        .clone()
        .oneshot(get_request("/progress/books/1", Some(5)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let progress = body_json(response).await;
    assert_eq!(progress["completed_elements"], 1);
    assert_eq!(progress["completion_percentage"], 100);
    assert_eq!(progress["required_completed"], true);

    let response = app
        .oneshot(get_request("/progress/books/1", Some(6)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submit_errors() {
    let (_db, app) = setup_app().await;
    let id = create_quiz(&app).await;
    let uri = format!("/elements/{}/responses", id);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &uri,
            None,
            json!({"submission": {"answers": {}}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &uri,
            Some(5),
            json!({"submission": {"answers": {"q1": "z"}}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["code"], "UnknownOptionId");

    let response = app
        .oneshot(json_request(
            "POST",
            "/elements/999/responses",
            Some(5),
            json!({"submission": {"answers": {}}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_payload_after_responses_conflicts() {
    let (_db, app) = setup_app().await;
    let id = create_quiz(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/elements/{}/responses", id),
            Some(5),
            json!({"submission": {"answers": {"q1": "a"}}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let mut stricter = quiz_body();
    stricter["payload"]["pass_score"] = json!(100);
    let response = app
        .oneshot(json_request("PUT", &format!("/elements/{}", id), None, stricter))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"]["code"], "Conflict");
}

#[tokio::test]
async fn test_render_section_html() {
    let (_db, app) = setup_app().await;
    let id = create_quiz(&app).await;

    let source = format!("## Checkpoint\n\n{{{{interactive:{}}}}}\n\n{{{{interactive:999}}}}", id);
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/sections/{}/render", SECTION),
            None,
            json!({"source": source}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));

    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("<h2>Checkpoint</h2>"));
    assert!(html.contains("ie-quiz"));
    assert!(html.contains("{{interactive:999}}"));
    // Answers never reach the page
    assert!(!html.contains("correct_option_id"));
}
