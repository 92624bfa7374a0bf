//! The Chat Handler: invoked by the Processor for anything that isn't a
//! command (spec.md §2, step 4b; §4.5). Delegates to whichever `Runner` is
//! named by `PipelineConfig::runner` and collects everything it yields.

use crate::runner::Runner;
use async_trait::async_trait;
use futures::StreamExt;
use gateway_core::error::PipelineError;
use gateway_core::plugin::{EventKind, PluginHost};
use gateway_core::query::Query;
use gateway_core::stage::{Stage, StageResult, StreamItem};
use std::collections::HashMap;
use std::sync::Arc;

pub struct ChatHandlerStage {
    runners: HashMap<String, Arc<dyn Runner>>,
    plugin_host: Arc<PluginHost>,
}

impl ChatHandlerStage {
    pub fn new(runners: HashMap<String, Arc<dyn Runner>>, plugin_host: Arc<PluginHost>) -> Self {
        Self { runners, plugin_host }
    }
}

#[async_trait]
impl Stage for ChatHandlerStage {
    fn name(&self) -> &str {
        "chat_handler"
    }

    async fn process(&self, query: &mut Query) -> Result<StageResult, PipelineError> {
        let runner_name = query.pipeline_config.runner.clone();
        let runner = self.runners.get(&runner_name).ok_or_else(|| {
            PipelineError::Config(format!("no runner registered under the name '{runner_name}'"))
        })?;

        let mut stream = runner.run(query).await?;

        if query.pipeline_config.stream {
            // Stream each assistant message out as soon as the runner
            // yields it, marking the last one final only once the stream
            // is known to be exhausted (spec.md §4.5 step 2-3).
            let peekable = stream.peekable();
            let session_id = query.session.as_ref().map(|session| {
                format!("{:?}/{}", session.launcher.launcher_type, session.launcher.launcher_id)
            });
            let plugin_host = self.plugin_host.clone();
            let items = futures::stream::unfold(peekable, move |mut s| async move {
                let chunk = s.next().await?;
                let is_final = std::pin::Pin::new(&mut s).peek().await.is_none();
                Some((StreamItem { chunk, is_final }, s))
            });
            let mut items = Box::pin(items);
            let mut last_text = String::new();
            while let Some(item) = items.next().await {
                last_text = item.chunk.content.as_text();
                let is_final = item.is_final;
                query.resp_messages.push(item.chunk);
                if is_final {
                    if let Some(session_id) = session_id.clone() {
                        plugin_host
                            .dispatch(EventKind::NormalMessageResponded {
                                session_id,
                                reply_text: last_text.clone(),
                            })
                            .await;
                    }
                }
            }
            return Ok(StageResult::Continue);
        }

        let mut last_text = String::new();
        while let Some(message) = stream.next().await {
            last_text = message.content.as_text();
            query.resp_messages.push(message);
        }

        if let Some(session) = &query.session {
            let session_id = format!("{:?}/{}", session.launcher.launcher_type, session.launcher.launcher_id);
            self.plugin_host
                .dispatch(EventKind::NormalMessageResponded {
                    session_id,
                    reply_text: last_text,
                })
                .await;
        }

        Ok(StageResult::Continue)
    }
}
