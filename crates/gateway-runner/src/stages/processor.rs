//! The Processor stage: the branch point between the Command Handler and
//! the Chat Handler (spec.md §2, step 4; §4.4).

use crate::command::CommandDispatcher;
use async_trait::async_trait;
use gateway_core::command::{CommandReturn, Privilege};
use gateway_core::config::CommandConfig;
use gateway_core::error::PipelineError;
use gateway_core::message::{Content, ContentElement, Message, Role};
use gateway_core::query::{LauncherType, Query};
use gateway_core::stage::{Stage, StageResult};
use gateway_core::Application;
use std::sync::Arc;

pub struct ProcessorStage {
    dispatcher: Arc<CommandDispatcher>,
    app: Arc<Application>,
}

impl ProcessorStage {
    pub fn new(dispatcher: Arc<CommandDispatcher>, app: Arc<Application>) -> Self {
        Self { dispatcher, app }
    }
}

/// Resolve the caller's authority: configured bot admins first, then (for
/// group launchers) whatever the adapter reports about group-admin rights.
/// Adapters that can't answer default to `false`, which only denies the
/// group-admin tier.
async fn resolve_privilege(query: &Query, command_config: &CommandConfig) -> Result<Privilege, PipelineError> {
    if command_config.bot_admins.iter().any(|id| id == &query.sender_id) {
        return Ok(Privilege::BotAdmin);
    }
    if query.launcher.launcher_type == LauncherType::Group
        && query
            .adapter
            .0
            .is_group_admin(&query.launcher.launcher_id, &query.sender_id)
            .await?
    {
        return Ok(Privilege::GroupAdmin);
    }
    Ok(Privilege::Everyone)
}

fn command_return_to_message(ret: CommandReturn) -> Message {
    if let Some(error) = ret.error {
        return Message::assistant(format!("Error: {error}"));
    }
    if let Some(image) = ret.image {
        return Message {
            role: Role::Assistant,
            content: Content::Parts(vec![ContentElement::ImageUrl { url: image }]),
            tool_calls: None,
            tool_call_id: None,
            token_count: None,
        };
    }
    Message::assistant(ret.text.unwrap_or_default())
}

#[async_trait]
impl Stage for ProcessorStage {
    fn name(&self) -> &str {
        "processor"
    }

    async fn process(&self, query: &mut Query) -> Result<StageResult, PipelineError> {
        let text = query.plain_text();

        let Some(command_line) = self.dispatcher.strip_prefix(&text).map(str::to_string) else {
            query.user_message = Some(Message::user(text));
            return Ok(StageResult::Continue);
        };

        let privilege = resolve_privilege(query, &self.app.config().command).await?;
        let session = query.session.clone();

        match self
            .dispatcher
            .dispatch(&command_line, privilege, query, session, self.app.clone())
            .await
        {
            Ok(returns) => {
                for ret in returns {
                    query.resp_messages.push(command_return_to_message(ret));
                }
            }
            Err(e) => {
                query.resp_messages.push(Message::assistant(e.to_string()));
            }
        }

        Ok(StageResult::Jump("response_wrapper".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{register_builtins, CommandRegistry};
    use gateway_core::adapter::AdapterHandle;
    use gateway_core::config::{Config, PipelineConfig};
    use gateway_core::query::{Launcher, MessageEvent, MessageElement};

    fn dispatcher() -> Arc<CommandDispatcher> {
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry);
        Arc::new(CommandDispatcher::new(Arc::new(registry), Default::default()))
    }

    fn query_with_text(text: &str) -> Query {
        Query::new(
            Launcher::new(LauncherType::Person, "1"),
            "1",
            MessageEvent {
                raw: serde_json::json!({}),
            },
            vec![MessageElement::Text { text: text.to_string() }],
            AdapterHandle::new_test_stub(),
            Arc::new(PipelineConfig::default()),
        )
    }

    #[tokio::test]
    async fn a_command_line_is_routed_and_skips_to_response_wrapper() {
        let app = Arc::new(Application::new(Config::default()));
        let stage = ProcessorStage::new(dispatcher(), app);
        let mut q = query_with_text("!model-list");
        let result = stage.process(&mut q).await.unwrap();
        assert!(matches!(result, StageResult::Jump(t) if t == "response_wrapper"));
        assert_eq!(
            q.resp_messages[0].content.as_text(),
            "(no models configured)"
        );
    }

    #[tokio::test]
    async fn plain_chat_text_continues_with_a_user_message_set() {
        let app = Arc::new(Application::new(Config::default()));
        let stage = ProcessorStage::new(dispatcher(), app);
        let mut q = query_with_text("hey there");
        let result = stage.process(&mut q).await.unwrap();
        assert!(matches!(result, StageResult::Continue));
        assert_eq!(q.user_message.unwrap().content.as_text(), "hey there");
    }
}
