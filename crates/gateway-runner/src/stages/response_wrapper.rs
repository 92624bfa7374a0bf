//! The Response Wrapper stage: turns `resp_messages` into a `MessageChain`
//! ready for the platform, applying `at_sender`/`quote_origin` reply
//! options (spec.md §2, step 5; §4.6).

use async_trait::async_trait;
use gateway_core::error::PipelineError;
use gateway_core::query::{LauncherType, MessageChain, MessageElement, Query};
use gateway_core::stage::{Stage, StageResult};
use gateway_core::Application;
use std::sync::Arc;

pub struct ResponseWrapperStage {
    app: Arc<Application>,
}

impl ResponseWrapperStage {
    pub fn new(app: Arc<Application>) -> Self {
        Self { app }
    }
}

#[async_trait]
impl Stage for ResponseWrapperStage {
    fn name(&self) -> &str {
        "response_wrapper"
    }

    async fn process(&self, query: &mut Query) -> Result<StageResult, PipelineError> {
        if query.resp_messages.is_empty() {
            return Ok(StageResult::Continue);
        }

        let reply_options = self.app.config().platform.reply_options.clone();
        let text = query
            .resp_messages
            .iter()
            .map(|m| m.content.as_text())
            .collect::<Vec<_>>()
            .join("\n");

        let mut chain: MessageChain = Vec::new();
        if reply_options.at_sender && query.launcher.launcher_type == LauncherType::Group {
            chain.push(MessageElement::At {
                target_id: query.sender_id.clone(),
            });
        }
        chain.push(MessageElement::Text { text });

        query.resp_message_chain = Some(chain);
        Ok(StageResult::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::adapter::AdapterHandle;
    use gateway_core::config::{Config, PipelineConfig};
    use gateway_core::message::Message;
    use gateway_core::query::{Launcher, MessageEvent};

    fn query(launcher_type: LauncherType) -> Query {
        Query::new(
            Launcher::new(launcher_type, "g1"),
            "u1",
            MessageEvent {
                raw: serde_json::json!({}),
            },
            vec![],
            AdapterHandle::new_test_stub(),
            Arc::new(PipelineConfig::default()),
        )
    }

    #[tokio::test]
    async fn group_replies_are_prefixed_with_at_sender_by_default() {
        let app = Arc::new(Application::new(Config::default()));
        let stage = ResponseWrapperStage::new(app);
        let mut q = query(LauncherType::Group);
        q.resp_messages.push(Message::assistant("hello"));
        stage.process(&mut q).await.unwrap();
        let chain = q.resp_message_chain.unwrap();
        assert!(matches!(&chain[0], MessageElement::At { target_id } if target_id == "u1"));
        assert!(matches!(&chain[1], MessageElement::Text { text } if text == "hello"));
    }

    #[tokio::test]
    async fn person_replies_are_not_prefixed() {
        let app = Arc::new(Application::new(Config::default()));
        let stage = ResponseWrapperStage::new(app);
        let mut q = query(LauncherType::Person);
        q.resp_messages.push(Message::assistant("hello"));
        stage.process(&mut q).await.unwrap();
        let chain = q.resp_message_chain.unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[tokio::test]
    async fn no_replies_leaves_the_chain_unset() {
        let app = Arc::new(Application::new(Config::default()));
        let stage = ResponseWrapperStage::new(app);
        let mut q = query(LauncherType::Person);
        stage.process(&mut q).await.unwrap();
        assert!(q.resp_message_chain.is_none());
    }
}
