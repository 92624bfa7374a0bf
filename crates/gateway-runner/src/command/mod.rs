mod builtins;
mod dispatcher;
mod registry;

pub use dispatcher::{CommandContext, CommandDispatcher};
pub use registry::{CommandNode, CommandRegistry};

use async_trait::async_trait;
use futures::stream::BoxStream;
use gateway_core::command::CommandReturn;
use gateway_core::error::PipelineError;

/// A leaf command's behavior. Returns an asynchronous sequence of
/// `CommandReturn`, matching spec.md §4.4 ("the result is an asynchronous
/// sequence of `CommandReturn`; each element becomes a reply").
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(
        &self,
        ctx: &CommandContext,
        args: Vec<String>,
    ) -> Result<BoxStream<'static, CommandReturn>, PipelineError>;
}

/// Wraps a synchronous-ish handler that just returns its results up front,
/// for the common case where a command doesn't actually need to stream.
pub fn single_reply_stream(item: CommandReturn) -> BoxStream<'static, CommandReturn> {
    Box::pin(futures::stream::once(async move { item }))
}

pub fn replies_stream(items: Vec<CommandReturn>) -> BoxStream<'static, CommandReturn> {
    Box::pin(futures::stream::iter(items))
}

pub use builtins::register_builtins;
