//! Section rendering endpoint

use axum::{
    extract::{Path, State},
    response::Html,
    Json,
};
use serde::Deserialize;

use super::MaybeUserId;
use crate::error::ApiResult;
use crate::AppState;

/// Body of POST /sections/:id/render
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderRequest {
    /// Markup to render; the section's stored content when absent
    #[serde(default)]
    pub source: Option<String>,
}

/// POST /sections/:id/render
///
/// With an `X-User-Id` header, elements the user has completed are marked.
pub async fn render_section(
    State(state): State<AppState>,
    Path(section_id): Path<i64>,
    MaybeUserId(user_id): MaybeUserId,
    Json(request): Json<RenderRequest>,
) -> ApiResult<Html<String>> {
    let html = match request.source {
        Some(source) => {
            state
                .service
                .render_section(section_id, &source, user_id)
                .await?
        }
        None => state.service.render_stored_section(section_id, user_id).await?,
    };
    Ok(Html(html))
}
