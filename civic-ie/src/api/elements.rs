//! Element CRUD endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiResult;
use crate::models::{CompletionType, Element, NewElement};
use crate::payload::{ElementType, Payload, PayloadError};
use crate::AppState;

/// Body of POST /elements and PUT /elements/:id
///
/// `type` and `completion_type` stay strings until conversion so that an
/// unknown value reports `EnumOutOfRange` instead of a generic body error.
/// `payload` may be a JSON object or its text encoding.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementRequest {
    pub section_id: i64,
    #[serde(default)]
    pub position: i64,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub payload: Value,
    pub completion_type: String,
    #[serde(default)]
    pub points_value: i64,
    #[serde(default)]
    pub required: bool,
}

impl ElementRequest {
    pub fn into_new_element(self) -> Result<NewElement, PayloadError> {
        let element_type: ElementType = self.element_type.parse()?;
        let completion_type: CompletionType = self.completion_type.parse()?;
        let payload = match self.payload {
            Value::String(text) => Payload::parse(element_type, &text)?,
            value => Payload::from_value(element_type, value)?,
        };

        Ok(NewElement {
            section_id: self.section_id,
            position: self.position,
            title: self.title,
            description: self.description,
            payload,
            completion_type,
            points_value: self.points_value,
            required: self.required,
        })
    }
}

/// GET /sections/:id/elements
pub async fn list_elements(
    State(state): State<AppState>,
    Path(section_id): Path<i64>,
) -> ApiResult<Json<Vec<Element>>> {
    Ok(Json(state.service.list_elements(section_id).await?))
}

/// GET /elements/:id
pub async fn get_element(
    State(state): State<AppState>,
    Path(element_id): Path<i64>,
) -> ApiResult<Json<Element>> {
    Ok(Json(state.service.get_element(element_id).await?))
}

/// POST /elements
pub async fn create_element(
    State(state): State<AppState>,
    Json(request): Json<ElementRequest>,
) -> ApiResult<(StatusCode, Json<Element>)> {
    let new = request
        .into_new_element()
        .map_err(crate::services::ServiceError::from)?;
    let element = state.service.create_element(new).await?;
    Ok((StatusCode::CREATED, Json(element)))
}

/// PUT /elements/:id
pub async fn update_element(
    State(state): State<AppState>,
    Path(element_id): Path<i64>,
    Json(request): Json<ElementRequest>,
) -> ApiResult<Json<Element>> {
    let new = request
        .into_new_element()
        .map_err(crate::services::ServiceError::from)?;
    Ok(Json(state.service.update_element(element_id, new).await?))
}

/// DELETE /elements/:id
///
/// Removes the element together with its responses.
pub async fn delete_element(
    State(state): State<AppState>,
    Path(element_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.service.delete_element(element_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::PayloadErrorKind;
    use serde_json::json;

    fn request(element_type: &str, completion_type: &str, payload: Value) -> ElementRequest {
        serde_json::from_value(json!({
            "section_id": 3,
            "type": element_type,
            "payload": payload,
            "completion_type": completion_type,
            "points_value": 10
        }))
        .unwrap()
    }

    #[test]
    fn test_payload_accepts_object_or_text() {
        let from_object = request("reflection", "self-check", json!({"prompt": "Why?"}))
            .into_new_element()
            .unwrap();
        let from_text = request("reflection", "self-check", json!(r#"{"prompt": "Why?"}"#))
            .into_new_element()
            .unwrap();

        assert_eq!(from_object, from_text);
        assert_eq!(from_object.element_type(), ElementType::Reflection);
        assert_eq!(from_object.position, 0);
    }

    #[test]
    fn test_unknown_enums_are_out_of_range() {
        let err = request("survey", "graded", json!({}))
            .into_new_element()
            .unwrap_err();
        assert_eq!(err.kind, PayloadErrorKind::EnumOutOfRange);

        let err = request("reflection", "sometimes", json!({"prompt": "Why?"}))
            .into_new_element()
            .unwrap_err();
        assert_eq!(err.kind, PayloadErrorKind::EnumOutOfRange);
    }
}
