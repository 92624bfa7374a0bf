//! The `MessagePlatformAdapter` capability.
//!
//! Platform wire protocols are explicitly out of scope (spec.md §1); the
//! core only ever sees this trait object. Concrete adapters (QQ-family,
//! group-chat protocols, ...) live outside this workspace.

use crate::error::PipelineError;
use crate::query::{MessageChain, MessageEvent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Events a platform adapter can dispatch to a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterEventType {
    FriendMessage,
    GroupMessage,
}

/// Capability implemented by a concrete platform adapter and consumed by
/// the core. `run_async`/`kill` drive its lifecycle; `reply_message` is how
/// the Send Reply stage delivers a response; `register_listener` is how
/// the platform manager wires inbound events into the query pool.
#[async_trait]
pub trait MessagePlatformAdapter: Send + Sync {
    /// Stable adapter name, used in `Bot::adapter_name` and in logs.
    fn name(&self) -> &str;

    /// Start listening for inbound events. Must be cancellation-safe: the
    /// task manager cancels this at shutdown and expects a clean return.
    async fn run_async(&self) -> Result<(), PipelineError>;

    /// Stop cleanly, releasing any held connection.
    async fn kill(&self) -> Result<(), PipelineError>;

    /// Send a reply back through this adapter.
    async fn reply_message(
        &self,
        event: &MessageEvent,
        message_chain: &MessageChain,
        quote_origin: bool,
    ) -> Result<(), PipelineError>;

    /// Optional capability: whether a group is currently muted. Adapters
    /// that don't support muting return `Ok(false)`.
    async fn is_muted(&self, _group_id: &str) -> Result<bool, PipelineError> {
        Ok(false)
    }

    /// Optional capability: whether `sender_id` holds admin rights in
    /// `group_id` on this platform. Used to resolve `Privilege::GroupAdmin`
    /// for the command dispatcher; adapters that can't answer return
    /// `Ok(false)`, which only denies the group-admin tier (bot admins
    /// configured via `CommandConfig::bot_admins` are unaffected).
    async fn is_group_admin(&self, _group_id: &str, _sender_id: &str) -> Result<bool, PipelineError> {
        Ok(false)
    }
}

/// A cheaply-cloneable handle to the adapter that produced a `Query`, used
/// downstream to send the reply.
#[derive(Clone)]
pub struct AdapterHandle(pub Arc<dyn MessagePlatformAdapter>);

impl AdapterHandle {
    pub fn new(adapter: Arc<dyn MessagePlatformAdapter>) -> Self {
        Self(adapter)
    }

    #[doc(hidden)]
    pub fn new_test_stub() -> Self {
        Self(Arc::new(NullAdapter))
    }
}

impl fmt::Debug for AdapterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AdapterHandle").field(&self.0.name()).finish()
    }
}

/// An adapter that accepts everything and does nothing; used in tests and
/// as a placeholder before a bot is configured.
struct NullAdapter;

#[async_trait]
impl MessagePlatformAdapter for NullAdapter {
    fn name(&self) -> &str {
        "null"
    }

    async fn run_async(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn kill(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn reply_message(
        &self,
        _event: &MessageEvent,
        _message_chain: &MessageChain,
        _quote_origin: bool,
    ) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Persistence record for a configured bot identity. The platform manager
/// owns the set of live adapters constructed from these records; the core
/// only needs the shape to round-trip through the (external) config/store
/// layer.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Bot {
    pub uuid: String,
    pub adapter_name: String,
    pub adapter_config: serde_json::Value,
    pub enable: bool,
}
