use serde::{Deserialize, Serialize};
use schemars::JsonSchema;

/// Command prefix list and built-in command configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CommandConfig {
    /// Prefixes that mark a message as a command invocation, e.g. `["!", "/"]`.
    pub prefixes: Vec<String>,
    /// Whether a bare prefix followed by whitespace still routes (it
    /// must not -- see spec.md §8, idempotent-command-parse property).
    pub allow_space_after_prefix: bool,
    /// Sender ids granted `Privilege::BotAdmin` regardless of launcher.
    pub bot_admins: Vec<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            prefixes: vec!["!".to_string()],
            allow_space_after_prefix: false,
            bot_admins: Vec::new(),
        }
    }
}
