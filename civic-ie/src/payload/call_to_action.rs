//! Call-to-action payload

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{require_text, PayloadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    Click,
    Link,
    Share,
    External,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Click => "click",
            ActionType::Link => "link",
            ActionType::Share => "share",
            ActionType::External => "external",
        }
    }

    /// Link and external actions navigate, so they carry a URL
    pub fn needs_url(&self) -> bool {
        matches!(self, ActionType::Link | ActionType::External)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallToActionPayload {
    pub action_type: ActionType,
    pub text: String,
    pub button_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_text: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl CallToActionPayload {
    pub(super) fn validate(&self) -> Result<(), PayloadError> {
        require_text("text", &self.text)?;
        require_text("button_text", &self.button_text)?;

        let has_url = self.url.as_deref().is_some_and(|u| !u.trim().is_empty());
        match (self.action_type.needs_url(), has_url) {
            (true, false) => Err(PayloadError::missing("url")),
            (false, true) => Err(PayloadError::cross_field(format!(
                "url is only allowed for link and external actions, not {}",
                self.action_type.as_str()
            ))),
            _ => Ok(()),
        }
    }
}
