//! `ToolManager` — the registry of callable functions exposed to an LLM
//! for function-calling.
//!
//! Grounded in `agent::tools::builtins`'s tool-trait shape (name + JSON
//! Schema parameters + an async `execute`), narrowed to the one capability
//! the runner's tool-call loop actually needs.

use async_trait::async_trait;
use gateway_core::error::PipelineError;
use schemars::Schema;
use std::collections::HashMap;
use std::sync::Arc;

/// A single callable exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for the tool's parameters, embedded verbatim into the
    /// function spec handed to the `LLMRequester`.
    fn parameters_schema(&self) -> Schema;

    /// Run the tool against already-parsed JSON arguments, returning the
    /// text result appended to history as a `role=tool` message.
    async fn call(&self, arguments: serde_json::Value) -> Result<String, PipelineError>;
}

#[derive(Default)]
pub struct ToolManager {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Function specs for the subset of registered tools named in
    /// `use_funcs`, in the provider-agnostic shape the core's
    /// `FunctionSpecs` passes through untouched.
    pub fn function_specs(&self, use_funcs: &[String]) -> gateway_core::message::FunctionSpecs {
        use_funcs
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters_schema(),
                    }
                })
            })
            .collect()
    }

    /// Execute `call`, parsing its JSON arguments first. Errors are
    /// reported as-is; the caller (the runner's tool-call loop) is
    /// responsible for wrapping them into a `role=tool` error payload
    /// rather than propagating them to the user (spec.md §7).
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments_json: &str,
    ) -> Result<String, PipelineError> {
        let tool = self.get(tool_name).ok_or_else(|| PipelineError::Tool {
            tool: tool_name.to_string(),
            reason: "not registered".to_string(),
        })?;
        let arguments: serde_json::Value = serde_json::from_str(arguments_json)
            .map_err(|e| PipelineError::Tool {
                tool: tool_name.to_string(),
                reason: format!("invalid arguments JSON: {e}"),
            })?;
        tool.call(arguments).await
    }
}
