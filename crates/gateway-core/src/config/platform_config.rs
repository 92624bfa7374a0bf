use crate::adapter::Bot;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Global reply shaping applied by the Response Wrapper stage.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReplyOptions {
    pub at_sender: bool,
    pub quote_origin: bool,
}

impl Default for ReplyOptions {
    fn default() -> Self {
        Self {
            at_sender: true,
            quote_origin: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MuteRule {
    pub launcher_id: String,
    pub reason: Option<String>,
}

/// Which bot entities to load and global reply behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PlatformConfig {
    pub bots: Vec<Bot>,
    pub reply_options: ReplyOptions,
    pub mute_rules: Vec<MuteRule>,
}
