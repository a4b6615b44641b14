//! civic-ie library - Interactive Element Engine
//!
//! Interactive elements (quizzes, reflections, calls to action, discussion
//! prompts, polls) embedded in book sections: payload validation, markup
//! rendering, persistence, grading and per-book progress.

use axum::Router;
use civic_common::EventBus;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod grader;
pub mod logging;
pub mod models;
pub mod payload;
pub mod render;
pub mod services;

use services::{ElementService, RetryPolicy};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Engine events, streamed at /events
    pub event_bus: EventBus,
    /// Control surface used by every handler
    pub service: ElementService,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, retry: RetryPolicy) -> Self {
        let service = ElementService::new(db.clone(), event_bus.clone(), retry);
        Self {
            db,
            event_bus,
            service,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/sections/:id/elements", get(api::list_elements))
        .route("/sections/:id/render", post(api::render_section))
        .route("/elements", post(api::create_element))
        .route(
            "/elements/:id",
            get(api::get_element)
                .put(api::update_element)
                .delete(api::delete_element),
        )
        .route(
            "/elements/:id/responses",
            get(api::list_responses).post(api::submit_response),
        )
        .route("/elements/:id/responses/latest", get(api::latest_response))
        .route("/progress/books/:book_id", get(api::get_progress))
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
