//! Reflection payload

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::{require_text, PayloadError};

/// Audience a reflection may be shared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SharingMode {
    Private,
    Group,
    Public,
}

impl SharingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SharingMode::Private => "private",
            SharingMode::Group => "group",
            SharingMode::Public => "public",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReflectionPayload {
    pub prompt: String,
    #[serde(default)]
    pub guiding_questions: Vec<String>,
    /// Minimum response length in characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_response_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_response_length: Option<u32>,
    /// Allowed sharing modes, in display order
    #[serde(default)]
    pub sharing_options: Vec<SharingMode>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl ReflectionPayload {
    pub(super) fn validate(&self) -> Result<(), PayloadError> {
        require_text("prompt", &self.prompt)?;

        if let (Some(min), Some(max)) = (self.min_response_length, self.max_response_length) {
            if min > max {
                return Err(PayloadError::cross_field(format!(
                    "min_response_length ({}) exceeds max_response_length ({})",
                    min, max
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for mode in &self.sharing_options {
            if !seen.insert(*mode) {
                return Err(PayloadError::cross_field(format!(
                    "sharing mode {:?} listed twice",
                    mode.as_str()
                )));
            }
        }

        Ok(())
    }
}
