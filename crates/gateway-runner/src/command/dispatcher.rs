//! `CommandDispatcher` — prefix stripping, trie recursion, authority
//! resolution, and reply assembly for `!command` style messages.

use super::registry::{CommandNode, CommandRegistry};
use futures::StreamExt;
use gateway_core::command::{CommandReturn, Privilege};
use gateway_core::config::CommandConfig;
use gateway_core::error::{CommandError, PipelineError};
use gateway_core::query::Query;
use gateway_core::session::SessionRef;
use gateway_core::Application;
use log::debug;
use std::sync::Arc;

/// Everything a command handler needs: the in-flight query, its session
/// (if one has been acquired), the caller's resolved privilege, and a
/// handle to shared application state (sessions, plugins, models).
pub struct CommandContext<'a> {
    pub query: &'a Query,
    pub session: Option<SessionRef>,
    pub caller_privilege: Privilege,
    pub app: Arc<Application>,
}

pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
    config: CommandConfig,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<CommandRegistry>, config: CommandConfig) -> Self {
        Self { registry, config }
    }

    /// Strip a configured prefix from `text` if one matches, per spec.md
    /// §8's idempotent-parse property: `"!cmd a b"` and `"! cmd a b"` are
    /// equivalent only when `allow_space_after_prefix` is set; otherwise
    /// the space form must fail to match entirely (it's routed to chat).
    pub fn strip_prefix<'a>(&self, text: &'a str) -> Option<&'a str> {
        for prefix in &self.config.prefixes {
            if let Some(rest) = text.strip_prefix(prefix.as_str()) {
                if let Some(rest) = rest.strip_prefix(' ') {
                    if self.config.allow_space_after_prefix {
                        return Some(rest);
                    }
                    continue;
                }
                return Some(rest);
            }
        }
        None
    }

    pub fn is_command(&self, text: &str) -> bool {
        self.strip_prefix(text).is_some()
    }

    /// Dispatch a command line (already prefix-stripped) down the trie,
    /// returning the assembled replies.
    pub async fn dispatch(
        &self,
        line: &str,
        caller_privilege: Privilege,
        query: &Query,
        session: Option<SessionRef>,
        app: Arc<Application>,
    ) -> Result<Vec<CommandReturn>, PipelineError> {
        let mut tokens = line.split_whitespace();
        let name = tokens
            .next()
            .ok_or_else(|| PipelineError::Command(CommandError::NotFound(String::new())))?;
        let args: Vec<String> = tokens.map(str::to_string).collect();

        if name == "help" {
            return Ok(vec![CommandReturn::text(super::builtins::render_help(
                &self.registry,
            ))]);
        }

        let root = self
            .registry
            .get(name)
            .ok_or_else(|| PipelineError::Command(CommandError::NotFound(name.to_string())))?;

        let (node, residual) = resolve_node(root, args);

        if caller_privilege < node.required_privilege {
            return Err(PipelineError::Command(CommandError::Unauthorized {
                required: node.required_privilege,
                actual: caller_privilege,
            }));
        }

        let handler = node.handler.as_ref().ok_or_else(|| {
            PipelineError::Command(CommandError::BadArguments(format!(
                "'{}' requires a subcommand",
                node.name
            )))
        })?;

        debug!("dispatching command '{}' with args {:?}", node.name, residual);
        let ctx = CommandContext {
            query,
            session,
            caller_privilege,
            app,
        };
        let stream = handler.execute(&ctx, residual).await?;
        Ok(stream.collect().await)
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }
}

/// Walk the trie as far as the residual args name a subcommand, returning
/// the deepest matching node and the args left over for it.
fn resolve_node(mut node: &CommandNode, mut args: Vec<String>) -> (&CommandNode, Vec<String>) {
    loop {
        let Some(first) = args.first() else {
            return (node, args);
        };
        let Some(child) = node.subcommands.get(first.as_str()) else {
            return (node, args);
        };
        node = child;
        args.remove(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{single_reply_stream, CommandHandler};
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use gateway_core::adapter::AdapterHandle;
    use gateway_core::config::PipelineConfig;
    use gateway_core::query::{Launcher, LauncherType, MessageEvent};
    use std::sync::Arc;

    fn test_app() -> Arc<Application> {
        Arc::new(Application::new(gateway_core::config::Config::default()))
    }

    struct EchoHandler(&'static str);

    #[async_trait]
    impl CommandHandler for EchoHandler {
        async fn execute(
            &self,
            _ctx: &CommandContext,
            args: Vec<String>,
        ) -> Result<BoxStream<'static, CommandReturn>, PipelineError> {
            Ok(single_reply_stream(CommandReturn::text(format!(
                "{}:{}",
                self.0,
                args.join(",")
            ))))
        }
    }

    fn test_query() -> Query {
        Query::new(
            Launcher::new(LauncherType::Person, "1"),
            "1",
            MessageEvent {
                raw: serde_json::json!({}),
            },
            vec![],
            AdapterHandle::new_test_stub(),
            Arc::new(PipelineConfig::default()),
        )
    }

    fn registry() -> Arc<CommandRegistry> {
        let mut reg = CommandRegistry::new();
        reg.register(CommandNode::leaf(
            "reset",
            "reset the conversation",
            Privilege::Everyone,
            Arc::new(EchoHandler("reset")),
        ));
        reg.register(
            CommandNode::branch("session", "session management")
                .with_subcommand(CommandNode::leaf(
                    "list",
                    "list sessions",
                    Privilege::BotAdmin,
                    Arc::new(EchoHandler("session-list")),
                ))
                .with_subcommand(CommandNode::leaf(
                    "switch",
                    "switch session",
                    Privilege::Everyone,
                    Arc::new(EchoHandler("session-switch")),
                )),
        );
        Arc::new(reg)
    }

    #[test]
    fn strip_prefix_respects_allow_space_flag() {
        let dispatcher = CommandDispatcher::new(
            registry(),
            CommandConfig {
                prefixes: vec!["!".into()],
                allow_space_after_prefix: false,
                ..Default::default()
            },
        );
        assert_eq!(dispatcher.strip_prefix("!reset"), Some("reset"));
        assert_eq!(dispatcher.strip_prefix("! reset"), None);
    }

    #[test]
    fn idempotent_parse_property_holds_only_with_flag_enabled() {
        let dispatcher = CommandDispatcher::new(
            registry(),
            CommandConfig {
                prefixes: vec!["!".into()],
                allow_space_after_prefix: true,
                ..Default::default()
            },
        );
        assert_eq!(dispatcher.strip_prefix("!cmd a b"), Some("cmd a b"));
        assert_eq!(dispatcher.strip_prefix("! cmd a b"), Some("cmd a b"));
    }

    #[tokio::test]
    async fn dispatch_routes_to_nested_subcommand() {
        let dispatcher = CommandDispatcher::new(
            registry(),
            CommandConfig {
                prefixes: vec!["!".into()],
                allow_space_after_prefix: false,
                ..Default::default()
            },
        );
        let q = test_query();
        let replies = dispatcher
            .dispatch("session switch abc", Privilege::Everyone, &q, None, test_app())
            .await
            .unwrap();
        assert_eq!(replies[0].text.as_deref(), Some("session-switch:abc"));
    }

    #[tokio::test]
    async fn unauthorized_subcommand_is_rejected() {
        let dispatcher = CommandDispatcher::new(
            registry(),
            CommandConfig {
                prefixes: vec!["!".into()],
                allow_space_after_prefix: false,
                ..Default::default()
            },
        );
        let q = test_query();
        let err = dispatcher
            .dispatch("session list", Privilege::Everyone, &q, None, test_app())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Command(CommandError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_command_is_not_found() {
        let dispatcher = CommandDispatcher::new(
            registry(),
            CommandConfig {
                prefixes: vec!["!".into()],
                allow_space_after_prefix: false,
                ..Default::default()
            },
        );
        let q = test_query();
        let err = dispatcher
            .dispatch("nope", Privilege::Everyone, &q, None, test_app())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Command(CommandError::NotFound(_))));
    }
}
