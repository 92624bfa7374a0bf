//! The Preprocessor stage: first in declared order. Normalizes the inbound
//! message chain and fires the `person_message_received`/
//! `group_message_received` events a plugin can short-circuit with a
//! canned reply (spec.md §2, step 1 and §4.6).

use async_trait::async_trait;
use gateway_core::config::PipelineConfig;
use gateway_core::error::PipelineError;
use gateway_core::message::Message;
use gateway_core::plugin::{EventKind, PluginHost};
use gateway_core::query::{LauncherType, MessageElement, Query};
use gateway_core::stage::{Stage, StageResult};
use std::sync::Arc;

pub struct PreprocessorStage {
    plugin_host: Arc<PluginHost>,
}

impl PreprocessorStage {
    pub fn new(plugin_host: Arc<PluginHost>) -> Self {
        Self { plugin_host }
    }
}

/// Merge adjacent `Text` elements and drop whitespace-only ones at the
/// chain's edges, the way the original stripped leading/trailing mentions
/// and whitespace before handing a message to the rest of the pipeline.
fn normalize_chain(chain: Vec<MessageElement>) -> Vec<MessageElement> {
    let mut merged: Vec<MessageElement> = Vec::with_capacity(chain.len());
    for el in chain {
        match (merged.last_mut(), &el) {
            (Some(MessageElement::Text { text: prev }), MessageElement::Text { text }) => {
                prev.push_str(text);
            }
            _ => merged.push(el),
        }
    }
    while matches!(merged.first(), Some(MessageElement::Text { text }) if text.trim().is_empty()) {
        merged.remove(0);
    }
    while matches!(merged.last(), Some(MessageElement::Text { text }) if text.trim().is_empty()) {
        merged.pop();
    }
    merged
}

#[async_trait]
impl Stage for PreprocessorStage {
    fn name(&self) -> &str {
        "preprocessor"
    }

    async fn initialize(&mut self, _pipeline_config: &PipelineConfig) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn process(&self, query: &mut Query) -> Result<StageResult, PipelineError> {
        query.message_chain = normalize_chain(std::mem::take(&mut query.message_chain));
        let text = query.plain_text();

        let kind = match query.launcher.launcher_type {
            LauncherType::Person => EventKind::PersonMessageReceived {
                sender_id: query.sender_id.clone(),
                text: text.clone(),
            },
            LauncherType::Group => EventKind::GroupMessageReceived {
                group_id: query.launcher.launcher_id.clone(),
                sender_id: query.sender_id.clone(),
                text: text.clone(),
            },
        };
        let event = self.plugin_host.dispatch(kind).await;

        if event.prevented_default {
            for reply in event.reply_strings() {
                query.resp_messages.push(Message::assistant(reply));
            }
            return Ok(StageResult::Jump("response_wrapper".to_string()));
        }

        Ok(StageResult::Continue)
    }
}
