//! Discussion prompt payload

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{require_text, PayloadError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscussionPromptPayload {
    pub topic: String,
    pub initial_prompt: String,
    #[serde(default)]
    pub supporting_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidelines: Option<String>,
    /// Forum in the external discussion service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discussion_forum_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl DiscussionPromptPayload {
    pub(super) fn validate(&self) -> Result<(), PayloadError> {
        require_text("topic", &self.topic)?;
        require_text("initial_prompt", &self.initial_prompt)?;
        Ok(())
    }
}
