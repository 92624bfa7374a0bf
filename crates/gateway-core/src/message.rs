//! Message records exchanged with an LLM, and the `LLMRequester` capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Role of a message in a conversation's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One ordered piece of message content (a user turn may mix text and
/// images; an assistant turn is usually plain text).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentElement {
    Text { text: String },
    ImageBase64 { mime: String, data: String },
    ImageUrl { url: String },
}

/// Either a plain string or a list of typed content elements -- mirrors
/// how most chat-completion wire formats let `content` be either shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentElement>),
}

impl Content {
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentElement::Text { text } => Some(text.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// A function-call request emitted by an assistant message.
///
/// `id` must be preserved across the assistant -> tool round-trip: the
/// follow-up `role = tool` message echoes it back as `tool_call_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "ToolCall::default_type")]
    pub call_type: String,
    pub function: ToolCallFunction,
}

impl ToolCall {
    fn default_type() -> String {
        "function".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// JSON-encoded arguments; parsed by the runner just before invocation.
    pub arguments: String,
}

/// One turn of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Approximate token count for this turn, used by truncation. `None`
    /// until the requester reports usage for the turn that produced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u32>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(text.into()),
            tool_calls: None,
            tool_call_id: None,
            token_count: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Content::Text(text.into()),
            tool_calls: None,
            tool_call_id: None,
            token_count: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(text.into()),
            tool_calls: None,
            tool_call_id: None,
            token_count: None,
        }
    }

    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(String::new()),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            token_count: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Content::Text(text.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            token_count: None,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        matches!(&self.tool_calls, Some(calls) if !calls.is_empty())
    }
}

/// A set of tool/function declarations offered to the model for this call,
/// in the provider-agnostic shape the core passes through untouched.
pub type FunctionSpecs = Vec<serde_json::Value>;

/// Typed context describing a transport-layer failure from a requester.
#[derive(Debug, Clone)]
pub struct RequesterError {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for RequesterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RequesterError {}

/// Capability implemented by a concrete LLM API requester (OpenAI/Anthropic
/// /third-party HTTP shapes) and consumed by the runner. Out of scope to
/// implement here (spec.md §1); the core only depends on this trait.
#[async_trait]
pub trait LLMRequester: Send + Sync {
    /// One-time setup: HTTP client, base URL, timeout, proxy, keep-alive.
    async fn initialize(&self) -> Result<(), RequesterError>;

    /// Issue a chat-completion style call. When `stream` is true the final
    /// assembled message is still returned here; intermediate deltas are
    /// delivered out-of-band via `stream_hook` (provider-specific; the
    /// runner supplies one when it wants partial output).
    async fn call(
        &self,
        model: &str,
        messages: &[Message],
        funcs: &FunctionSpecs,
        stream: bool,
        stream_hook: Option<Arc<dyn StreamHook>>,
    ) -> Result<Message, RequesterError>;
}

/// Receives streamed deltas from a requester while a call with `stream =
/// true` is in flight.
#[async_trait]
pub trait StreamHook: Send + Sync {
    async fn on_delta(&self, delta: &str);
}

/// Counts tokens for a piece of text under a given model's tokenizer.
/// Used to stamp `Message::token_count` so the runner's truncation loop
/// doesn't need to re-tokenize stored history.
pub trait TokenManager: Send + Sync {
    fn count_tokens(&self, model: &str, text: &str) -> u32;
}

/// A naive whitespace-based counter, used where no provider-specific
/// tokenizer is configured. Good enough for truncation bookkeeping, not
/// for billing.
pub struct ApproximateTokenManager;

impl TokenManager for ApproximateTokenManager {
    fn count_tokens(&self, _model: &str, text: &str) -> u32 {
        (text.split_whitespace().count() as u32).max(1)
    }
}

/// Static description of a model offered by a provider.
#[derive(Clone)]
pub struct LLMModelInfo {
    pub name: String,
    pub provider_model_name: Option<String>,
    pub requester: Arc<dyn LLMRequester>,
    pub token_manager: Arc<dyn TokenManager>,
    pub tool_call_supported: bool,
}
