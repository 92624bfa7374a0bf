//! The external-bridge runner: proxies a conversation to an opaque upstream
//! agent/workflow service instead of calling an `LLMRequester` directly.
//!
//! Grounded in `original_source/pkg/provider/runners/cozeapi.py`'s
//! `CozeAPIRunner`: extract plain text from the user turn, send it to the
//! upstream keyed by a remote conversation id carried on the conversation,
//! stream back assistant chunks, and update that remote id once the
//! upstream reports one. The concrete wire protocol (Coze, or any other
//! agent-hosting service) lives outside this workspace, same as
//! `LLMRequester` does for direct model calls.

use super::Runner;
use async_trait::async_trait;
use futures::stream::BoxStream;
use gateway_core::error::PipelineError;
use gateway_core::message::{Message, RequesterError};
use gateway_core::query::Query;
use std::sync::Arc;
use tracing::instrument;

/// One upstream turn: zero or more assistant chunks, plus the upstream's
/// notion of the conversation identity if it assigned or changed one.
#[derive(Debug, Clone, Default)]
pub struct BridgeReply {
    pub chunks: Vec<String>,
    pub conversation_id: Option<String>,
}

/// Capability implemented by a concrete bridge client (Coze or otherwise).
/// Out of scope to implement here, mirroring `LLMRequester`.
#[async_trait]
pub trait BridgeClient: Send + Sync {
    async fn send(
        &self,
        conversation_id: Option<String>,
        sender_id: &str,
        text: &str,
    ) -> Result<BridgeReply, RequesterError>;
}

pub struct BridgeRunner {
    name: String,
    client: Arc<dyn BridgeClient>,
}

impl BridgeRunner {
    pub fn new(name: impl Into<String>, client: Arc<dyn BridgeClient>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

#[async_trait]
impl Runner for BridgeRunner {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, query), fields(query_id = query.query_id, runner = %self.name))]
    async fn run(&self, query: &mut Query) -> Result<BoxStream<'static, Message>, PipelineError> {
        let session = query
            .session
            .clone()
            .ok_or_else(|| PipelineError::internal("bridge runner requires a session"))?;

        let user_message = query
            .user_message
            .clone()
            .ok_or_else(|| PipelineError::internal("bridge runner requires a user message"))?;
        let plain_text = user_message.content.as_text();

        let conversation_id = session.with_using(|conv| {
            conv.and_then(|c| c.remote_conversation_id.clone())
        });

        session.with_using_mut(|conv| {
            conv.expect("conversation must exist").push(user_message.clone());
        });

        let reply = self
            .client
            .send(conversation_id, &query.sender_id, &plain_text)
            .await
            .map_err(|e| PipelineError::Requester {
                code: e.code,
                message: e.message,
            })?;

        let BridgeReply { chunks, conversation_id } = reply;
        let messages: Vec<Message> = chunks.into_iter().map(Message::assistant).collect();

        session.with_using_mut(|conv| {
            let conv = conv.expect("conversation must exist");
            for m in &messages {
                conv.push(m.clone());
            }
            if let Some(id) = conversation_id {
                conv.remote_conversation_id = Some(id);
            }
        });

        Ok(Box::pin(futures::stream::iter(messages)))
    }
}
