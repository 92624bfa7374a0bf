//! The Send Reply stage: last in declared order. Hands the wrapped
//! `MessageChain` to the originating adapter (spec.md §2, step 6).

use async_trait::async_trait;
use gateway_core::error::PipelineError;
use gateway_core::query::Query;
use gateway_core::stage::{Stage, StageResult};
use gateway_core::Application;
use std::sync::Arc;

pub struct SendReplyStage {
    app: Arc<Application>,
}

impl SendReplyStage {
    pub fn new(app: Arc<Application>) -> Self {
        Self { app }
    }
}

#[async_trait]
impl Stage for SendReplyStage {
    fn name(&self) -> &str {
        "send_reply"
    }

    async fn process(&self, query: &mut Query) -> Result<StageResult, PipelineError> {
        let Some(chain) = query.resp_message_chain.clone() else {
            return Ok(StageResult::Continue);
        };

        let quote_origin = self.app.config().platform.reply_options.quote_origin;
        query
            .adapter
            .0
            .reply_message(&query.message_event, &chain, quote_origin)
            .await?;

        Ok(StageResult::Continue)
    }
}
