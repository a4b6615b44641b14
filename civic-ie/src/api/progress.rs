//! Progress endpoint

use axum::{
    extract::{Path, State},
    Json,
};

use super::UserId;
use crate::error::ApiResult;
use crate::models::UserBookProgress;
use crate::AppState;

/// GET /progress/books/:book_id
pub async fn get_progress(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
    UserId(user_id): UserId,
) -> ApiResult<Json<UserBookProgress>> {
    Ok(Json(state.service.get_progress(user_id, book_id).await?))
}
