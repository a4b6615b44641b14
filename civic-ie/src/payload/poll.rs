//! Poll payload

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::{require_text, PayloadError};

/// When voters may see the tally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShowResults {
    Always,
    #[default]
    AfterVote,
    AfterClose,
    Never,
}

impl ShowResults {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShowResults::Always => "always",
            ShowResults::AfterVote => "after-vote",
            ShowResults::AfterClose => "after-close",
            ShowResults::Never => "never",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollOption {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollPayload {
    pub question: String,
    pub options: Vec<PollOption>,
    #[serde(default)]
    pub allow_multiple: bool,
    #[serde(default)]
    pub show_results: ShowResults,
    #[serde(default)]
    pub allow_comments: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl PollPayload {
    pub(super) fn validate(&self) -> Result<(), PayloadError> {
        require_text("question", &self.question)?;

        if self.options.len() < 2 {
            return Err(PayloadError::cross_field(format!(
                "poll needs at least 2 options, has {}",
                self.options.len()
            )));
        }

        let mut ids = BTreeSet::new();
        for option in &self.options {
            require_text("option id", &option.id)?;
            require_text("option text", &option.text)?;
            if !ids.insert(option.id.as_str()) {
                return Err(PayloadError::cross_field(format!(
                    "duplicate poll option id {:?}",
                    option.id
                )));
            }
        }

        Ok(())
    }

    pub fn has_option(&self, id: &str) -> bool {
        self.options.iter().any(|o| o.id == id)
    }
}
