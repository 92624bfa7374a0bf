//! The local-agent runner: a classic chat-completion loop against an
//! `LLMRequester`, with optional tool calls.
//!
//! Grounded in `agent::agent::execution::transitions`'s state machine
//! (`BeforeLlmCall -> CallLlm -> AfterLlm -> ProcessingToolCalls`), collapsed
//! into one straight-line loop since this runner has no middleware stack to
//! thread through each transition.

use super::Runner;
use crate::tool::ToolManager;
use async_trait::async_trait;
use futures::stream::BoxStream;
use gateway_core::error::PipelineError;
use gateway_core::message::{Message, Role, StreamHook};
use gateway_core::model_registry::ModelRegistry;
use gateway_core::plugin::PluginHost;
use gateway_core::query::Query;
use log::warn;
use std::sync::{Arc, Mutex};
use tracing::instrument;

/// Forwards deltas from a streaming `LLMRequester::call` into an in-memory
/// buffer, drained after the call returns and re-emitted as interim
/// `Message`s ahead of the call's final, complete one (spec.md §4.5 step
/// 2-3: "if stream, forward deltas as `YieldStream` items").
struct DeltaCollector(Mutex<Vec<String>>);

impl DeltaCollector {
    fn new() -> Self {
        Self(Mutex::new(Vec::new()))
    }

    fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

#[async_trait]
impl StreamHook for DeltaCollector {
    async fn on_delta(&self, delta: &str) {
        self.0.lock().unwrap().push(delta.to_string());
    }
}

pub struct LocalAgentRunner {
    models: Arc<ModelRegistry>,
    tools: Arc<ToolManager>,
    plugin_host: Arc<PluginHost>,
}

impl LocalAgentRunner {
    pub fn new(models: Arc<ModelRegistry>, tools: Arc<ToolManager>, plugin_host: Arc<PluginHost>) -> Self {
        Self {
            models,
            tools,
            plugin_host,
        }
    }
}

#[async_trait]
impl Runner for LocalAgentRunner {
    fn name(&self) -> &str {
        "local-agent"
    }

    #[instrument(skip(self, query), fields(query_id = query.query_id))]
    async fn run(&self, query: &mut Query) -> Result<BoxStream<'static, Message>, PipelineError> {
        let session = query
            .session
            .clone()
            .ok_or_else(|| PipelineError::internal("local-agent runner requires a session"))?;

        let user_message = query
            .user_message
            .clone()
            .ok_or_else(|| PipelineError::internal("local-agent runner requires a user message"))?;

        let (model_name, tool_set, max_prompt_tokens, max_tool_iterations) = session.with_using(|conv| {
            let conv = conv.expect("get_or_create_conversation ran before the runner");
            (
                conv.model.clone(),
                conv.tool_set.clone(),
                query.pipeline_config.max_prompt_tokens,
                query.pipeline_config.max_tool_iterations,
            )
        });

        let model = self
            .models
            .get(&model_name)
            .or_else(|| self.models.default_model())
            .ok_or_else(|| PipelineError::Config(format!("no LLM model named '{model_name}' is configured")))?;

        session.with_using_mut(|conv| {
            conv.expect("conversation must exist").push(user_message.clone());
        });

        let funcs = self.tools.function_specs(&tool_set);
        let stream = query.pipeline_config.stream;
        let mut messages: Vec<Message> = Vec::new();

        for iteration in 0..=max_tool_iterations {
            let (prompt, history) = session.with_using(|conv| {
                let conv = conv.expect("conversation must exist");
                (conv.prompt.clone(), conv.history.clone())
            });

            let truncated = truncate_history(&history, max_prompt_tokens, |m| {
                model.token_manager.count_tokens(&model_name, &m.content.as_text())
            });

            let mut request: Vec<Message> = Vec::with_capacity(truncated.len() + 1);
            request.push(Message::system(prompt));
            request.extend(truncated);

            let collector = stream.then(|| Arc::new(DeltaCollector::new()));
            let hook: Option<Arc<dyn StreamHook>> = collector
                .clone()
                .map(|c| c as Arc<dyn StreamHook>);

            let response = model
                .requester
                .call(&model_name, &request, &funcs, stream, hook)
                .await
                .map_err(|e| PipelineError::Requester {
                    code: e.code,
                    message: e.message,
                })?;

            let mut stamped = response.clone();
            stamped.token_count = Some(model.token_manager.count_tokens(&model_name, &response.content.as_text()));

            session.with_using_mut(|conv| conv.expect("conversation must exist").push(stamped.clone()));

            if let Some(collector) = collector {
                for delta in collector.drain() {
                    messages.push(Message::assistant(delta));
                }
            }

            if !stamped.has_tool_calls() || iteration == max_tool_iterations {
                if stamped.has_tool_calls() {
                    warn!(
                        "query {}: exhausted {} tool iterations with calls still pending",
                        query.query_id, max_tool_iterations
                    );
                }
                messages.push(stamped);
                break;
            }

            let calls = stamped.tool_calls.clone().unwrap_or_default();
            let mut tool_results = Vec::with_capacity(calls.len());
            for call in &calls {
                let result = match self.tools.invoke(&call.function.name, &call.function.arguments).await {
                    Ok(text) => text,
                    Err(e) => {
                        self.plugin_host
                            .dispatch(gateway_core::plugin::EventKind::UnhandledException {
                                stage: "local-agent-tool-call".to_string(),
                                message: e.to_string(),
                            })
                            .await;
                        format!("error: {e}")
                    }
                };
                tool_results.push(Message::tool_result(call.id.clone(), result));
            }

            session.with_using_mut(|conv| {
                let conv = conv.expect("conversation must exist");
                for tr in &tool_results {
                    conv.push(tr.clone());
                }
            });
        }

        Ok(Box::pin(futures::stream::iter(messages)))
    }
}

/// Iterate history from newest to oldest, accumulating token counts,
/// stopping before a turn would push the total over `max_tokens`. Keeps
/// user/assistant pairs and assistant/tool groups intact -- never splits a
/// tool-call block from its tool-result (spec.md §8, truncation safety).
fn truncate_history(
    history: &[Message],
    max_tokens: u32,
    estimate: impl Fn(&Message) -> u32,
) -> Vec<Message> {
    // Group the already-validated history into atomic units: a lone
    // system/user/assistant turn, or an assistant turn plus the tool
    // results that immediately follow it.
    let mut groups: Vec<Vec<Message>> = Vec::new();
    let mut i = 0;
    while i < history.len() {
        let mut group = vec![history[i].clone()];
        i += 1;
        if group[0].role == Role::Assistant {
            while i < history.len() && history[i].role == Role::Tool {
                group.push(history[i].clone());
                i += 1;
            }
        }
        groups.push(group);
    }

    let mut kept: Vec<Vec<Message>> = Vec::new();
    let mut total = 0u32;
    for group in groups.into_iter().rev() {
        let group_tokens: u32 = group
            .iter()
            .map(|m| m.token_count.unwrap_or_else(|| estimate(m)))
            .sum();
        if total + group_tokens > max_tokens && !kept.is_empty() {
            break;
        }
        total += group_tokens;
        kept.push(group);
    }
    kept.reverse();
    kept.into_iter().flatten().collect()
}
