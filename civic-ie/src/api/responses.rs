//! Submission and response history endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::UserId;
use crate::error::ApiResult;
use crate::models::Response;
use crate::services::Submitted;
use crate::AppState;

/// Body of POST /elements/:id/responses
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    /// Type-specific submission, e.g. `{"answers": {...}}` for a quiz
    pub submission: Value,
    /// Client nonce; repeating it returns the stored result
    #[serde(default)]
    pub submission_id: Option<Uuid>,
}

/// POST /elements/:id/responses
///
/// 201 for a new response, 200 when `submission_id` was already recorded.
pub async fn submit_response(
    State(state): State<AppState>,
    Path(element_id): Path<i64>,
    UserId(user_id): UserId,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<Submitted>)> {
    let submitted = state
        .service
        .submit_response(user_id, element_id, request.submission, request.submission_id)
        .await?;

    let status = if submitted.duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(submitted)))
}

/// GET /elements/:id/responses
pub async fn list_responses(
    State(state): State<AppState>,
    Path(element_id): Path<i64>,
    UserId(user_id): UserId,
) -> ApiResult<Json<Vec<Response>>> {
    Ok(Json(state.service.list_responses(user_id, element_id).await?))
}

/// GET /elements/:id/responses/latest
pub async fn latest_response(
    State(state): State<AppState>,
    Path(element_id): Path<i64>,
    UserId(user_id): UserId,
) -> ApiResult<Json<Response>> {
    Ok(Json(state.service.latest_response(user_id, element_id).await?))
}
