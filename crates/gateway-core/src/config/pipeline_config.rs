use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-stage enable flag and opaque stage-specific options.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StageConfig {
    pub enabled: bool,
    pub options: serde_json::Value,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            options: serde_json::Value::Null,
        }
    }
}

/// Stage enable flags, AI runner selection, prompt templates, and
/// session-concurrency settings -- everything the `PipelineController` and
/// `SessionManager` need to construct themselves.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PipelineConfig {
    /// Stage name -> its config, consulted by `Stage::initialize`.
    pub stages: HashMap<String, StageConfig>,
    /// Which runner a conversation uses: "local-agent" or a named
    /// external-bridge runner (e.g. "coze-bridge").
    pub runner: String,
    /// System-prompt template, expanded with `minijinja` at
    /// conversation-create time.
    pub prompt_template: String,
    /// Default session-concurrency permit count; overridden per-launcher
    /// by `session_concurrency_overrides`.
    pub default_session_concurrency: usize,
    pub session_concurrency_overrides: HashMap<String, usize>,
    /// Seconds of inactivity before a session expires.
    pub session_expire_time_secs: u64,
    /// Ceiling on prompt-building truncation (see runner truncation loop).
    pub max_prompt_tokens: u32,
    /// Ceiling on tool-call recursion depth per turn.
    pub max_tool_iterations: u32,
    /// Ask runners to stream deltas (spec.md §4.5 step 2-3) instead of
    /// waiting for one complete response per LLM call.
    pub stream: bool,
    /// Reply sent when a per-query wall-clock timeout fires and nothing
    /// has been sent yet.
    pub timeout_reply: Option<String>,
    /// Generic reply used for `PipelineError::Internal`.
    pub generic_error_reply: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stages: HashMap::new(),
            runner: "local-agent".to_string(),
            prompt_template: "You are a helpful assistant.".to_string(),
            default_session_concurrency: 1,
            session_concurrency_overrides: HashMap::new(),
            session_expire_time_secs: 1800,
            max_prompt_tokens: 4096,
            max_tool_iterations: 10,
            stream: false,
            timeout_reply: None,
            generic_error_reply: "Something went wrong processing your message.".to_string(),
        }
    }
}
