mod bridge;
mod local_agent;

pub use bridge::BridgeRunner;
pub use local_agent::LocalAgentRunner;

use async_trait::async_trait;
use futures::stream::BoxStream;
use gateway_core::error::PipelineError;
use gateway_core::message::Message;
use gateway_core::query::Query;

/// Turns a conversation into an assistant message, possibly via a
/// tool-calling loop or a proxied upstream agent/workflow service.
///
/// Implementations yield each assistant message produced along the way
/// (the source called this "an asynchronous sequence of assistant
/// messages"); the chat handler appends every yielded message to
/// `query.resp_messages` and the final one is what the Response Wrapper
/// stage formats into a reply.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Stable name used in `PipelineConfig::runner` to select this runner.
    fn name(&self) -> &str;

    async fn run(&self, query: &mut Query) -> Result<BoxStream<'static, Message>, PipelineError>;
}
