//! `Query` — one inbound message in flight, and the types it is built from.

use crate::adapter::AdapterHandle;
use crate::config::PipelineConfig;
use crate::message::Message;
use crate::session::SessionRef;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::OwnedSemaphorePermit;

/// A process-local, monotonically increasing id minted for every query.
static NEXT_QUERY_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_query_id() -> u64 {
    NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed)
}

/// Which bucket of conversation a query belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LauncherType {
    Person,
    Group,
}

/// The conversation bucket a query belongs to: `(launcher_type, launcher_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Launcher {
    pub launcher_type: LauncherType,
    pub launcher_id: String,
}

impl Launcher {
    pub fn new(launcher_type: LauncherType, launcher_id: impl Into<String>) -> Self {
        Self {
            launcher_type,
            launcher_id: launcher_id.into(),
        }
    }
}

/// One typed element of an inbound or outbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageElement {
    Text { text: String },
    Image { base64: Option<String>, url: Option<String> },
    At { target_id: String },
    Quote { message_event_ref: String },
    File { name: String, url: String },
}

/// An ordered sequence of typed message elements.
pub type MessageChain = Vec<MessageElement>;

/// The original typed platform event, retained opaquely for quoting/reply
/// context. The core never interprets its contents; adapters do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub raw: serde_json::Value,
}

/// One inbound message flowing through the pipeline.
///
/// Fields accumulate as the query traverses stages; see the invariant on
/// `resp_messages` documented in the struct-level comment on that field.
pub struct Query {
    pub query_id: u64,
    pub launcher: Launcher,
    pub sender_id: String,
    pub message_chain: MessageChain,
    pub message_event: MessageEvent,
    pub adapter: AdapterHandle,

    /// Filled by the session-acquire stage.
    pub session: Option<SessionRef>,
    /// The per-session concurrency permit, acquired by the controller as
    /// soon as `session` is filled and held for the rest of the dispatch
    /// (spec.md §2.3, §9's scoped-acquisition pattern). Dropping `Query` —
    /// on normal completion or on cancellation — releases it.
    pub session_permit: Option<OwnedSemaphorePermit>,

    /// Frozen at dispatch time; stages never see a config that changes
    /// mid-traversal.
    pub pipeline_config: Arc<PipelineConfig>,

    /// Messages built for the LLM request (system + truncated history + new
    /// user turn). Filled by the chat handler just before invoking a runner.
    pub prompt_messages: Vec<Message>,
    /// The new user-turn message, derived from `message_chain`.
    pub user_message: Option<Message>,
    /// Assistant replies produced so far.
    ///
    /// Invariant: once a stage appends here, downstream stages may only
    /// transform or append -- never delete earlier entries, unless a
    /// plugin explicitly calls `prevent_default`.
    pub resp_messages: Vec<Message>,
    /// `resp_messages` after the Response Wrapper stage has formatted it
    /// into chain form (quote-reply, at-sender, etc).
    pub resp_message_chain: Option<MessageChain>,
    /// Tool/function names made available to the runner for this query.
    pub use_funcs: Vec<String>,
}

impl Query {
    pub fn new(
        launcher: Launcher,
        sender_id: impl Into<String>,
        message_event: MessageEvent,
        message_chain: MessageChain,
        adapter: AdapterHandle,
        pipeline_config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            query_id: next_query_id(),
            launcher,
            sender_id: sender_id.into(),
            message_chain,
            message_event,
            adapter,
            session: None,
            session_permit: None,
            pipeline_config,
            prompt_messages: Vec::new(),
            user_message: None,
            resp_messages: Vec::new(),
            resp_message_chain: None,
            use_funcs: Vec::new(),
        }
    }

    /// Text content of the message chain, concatenating `Text` elements.
    /// Mirrors how the original stripped-and-joined plain text before
    /// command matching.
    pub fn plain_text(&self) -> String {
        self.message_chain
            .iter()
            .filter_map(|el| match el {
                MessageElement::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_ids_are_monotonic() {
        let a = next_query_id();
        let b = next_query_id();
        assert!(b > a);
    }

    #[test]
    fn plain_text_joins_text_elements_only() {
        let chain = vec![
            MessageElement::At {
                target_id: "5".into(),
            },
            MessageElement::Text {
                text: "hello ".into(),
            },
            MessageElement::Text {
                text: "world".into(),
            },
        ];
        let q = Query::new(
            Launcher::new(LauncherType::Person, "1"),
            "1",
            MessageEvent {
                raw: serde_json::json!({}),
            },
            chain,
            AdapterHandle::new_test_stub(),
            Arc::new(PipelineConfig::default()),
        );
        assert_eq!(q.plain_text(), "hello world");
    }
}
