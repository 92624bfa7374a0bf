use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ModelDefaults {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// One configured LLM provider entry: keys, base URL, and per-provider
/// model/tool-calling defaults. The concrete `LLMRequester` built from this
/// entry lives outside this workspace.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProviderEntry {
    pub name: String,
    pub base_url: Option<String>,
    pub api_key_ref: String,
    pub tool_calling_enabled: bool,
    pub defaults: ModelDefaults,
}

/// LLM provider keys, base URLs, model defaults, and tool-calling toggles.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProviderConfig {
    pub providers: HashMap<String, ProviderEntry>,
    pub default_provider: Option<String>,
}
