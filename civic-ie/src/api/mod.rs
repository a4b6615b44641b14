//! HTTP API handlers for civic-ie
//!
//! Thin bindings over [`crate::services::ElementService`]. Authentication
//! happens upstream; the authenticated user arrives in the `X-User-Id`
//! header.

pub mod elements;
pub mod events;
pub mod health;
pub mod progress;
pub mod render;
pub mod responses;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

pub use elements::{create_element, delete_element, get_element, list_elements, update_element};
pub use events::event_stream;
pub use health::health_routes;
pub use progress::get_progress;
pub use render::render_section;
pub use responses::{latest_response, list_responses, submit_response};

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated user, taken from [`USER_ID_HEADER`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub i64);

fn parse_user_id(parts: &Parts) -> Result<Option<i64>, ApiError> {
    let Some(value) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("{} must be an integer", USER_ID_HEADER)))
}

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_user_id(parts)?
            .map(UserId)
            .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", USER_ID_HEADER)))
    }
}

/// User id when the header is present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaybeUserId(pub Option<i64>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUserId(parse_user_id(parts)?))
    }
}
