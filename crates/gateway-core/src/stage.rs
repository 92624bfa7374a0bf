//! The `Stage` trait and the `PipelineController` that drives queries
//! through an ordered, named sequence of them.
//!
//! Grounded in `agent::middleware::driver::{MiddlewareDriver, CompositeDriver}`:
//! a fixed ordered list of drivers is run phase by phase, each returning a
//! state the composite either forwards or halts on. Here the "phases" are
//! collapsed into one `process` call per stage and the halt states are
//! `StageResult::Interrupt`/`YieldStream`.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::plugin::{EventKind, PluginHost};
use crate::query::Query;
use async_trait::async_trait;
use futures::stream::BoxStream;
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// The control directive a stage returns after processing a query.
pub enum StageResult {
    /// Proceed to the next stage in declared order.
    Continue,
    /// Skip forward or backward to a named stage. Backward jumps are only
    /// well-defined within the tool-call loop inside the Chat Handler; the
    /// outer stage graph itself stays a DAG (spec.md §4.2).
    Jump(String),
    /// Stop traversal entirely; do nothing further.
    Interrupt,
    /// The stage is producing a stream of partial results; the controller
    /// feeds each element through the remaining stages as if it were the
    /// full result, then (unless a later stage intercepts) sends each as a
    /// partial reply.
    YieldStream(BoxStream<'static, StreamItem>),
}

/// One element of a `YieldStream`. `is_final` lets the formatter stage
/// decide whether to coalesce (buffer) or flush (send immediately).
pub struct StreamItem {
    pub chunk: crate::message::Message,
    pub is_final: bool,
}

/// A named unit of pipeline work.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable name used for jump targets, plugin event payloads, and logs.
    fn name(&self) -> &str;

    /// One-time setup, called once per `PipelineController` construction.
    async fn initialize(&mut self, _pipeline_config: &PipelineConfig) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Transform the query and return a control directive.
    async fn process(&self, query: &mut Query) -> Result<StageResult, PipelineError>;
}

/// A fixed, ordered graph of stages that every query traverses.
///
/// Cycles are allowed only through the explicit tool-call loop inside the
/// Chat Handler; a `Jump` here must target a stage later in, or re-entrant
/// to, the declared order -- the controller does not guard against
/// infinite jump loops beyond a hard iteration ceiling, mirroring how the
/// original's stage graph trusted well-behaved stages.
pub struct PipelineController {
    stages: Vec<Box<dyn Stage>>,
    index_by_name: HashMap<String, usize>,
    plugin_host: Arc<PluginHost>,
    max_jumps: usize,
}

impl PipelineController {
    pub fn new(stages: Vec<Box<dyn Stage>>, plugin_host: Arc<PluginHost>) -> Self {
        let index_by_name = stages
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name().to_string(), i))
            .collect();
        Self {
            stages,
            index_by_name,
            plugin_host,
            max_jumps: 64,
        }
    }

    pub async fn initialize(&mut self, pipeline_config: &PipelineConfig) -> Result<(), PipelineError> {
        for stage in &mut self.stages {
            stage.initialize(pipeline_config).await?;
        }
        Ok(())
    }

    /// Drive one query through every stage, starting at index 0.
    ///
    /// Unexpected errors escape here: the controller logs them, emits
    /// `unhandled_exception`, and ends the query (spec.md §7).
    pub async fn dispatch(&self, query: &mut Query) -> Result<(), PipelineError> {
        let mut idx = 0usize;
        let mut jumps = 0usize;

        while idx < self.stages.len() {
            let stage = &self.stages[idx];
            let stage_name = stage.name().to_string();

            if let Some(cfg) = query.pipeline_config.stages.get(&stage_name) {
                if !cfg.enabled {
                    debug!("stage '{}' disabled via config; skipping", stage_name);
                    idx += 1;
                    continue;
                }
            }

            let before = self
                .plugin_host
                .dispatch(EventKind::StageBefore {
                    stage: stage_name.clone(),
                })
                .await;

            if before.prevented_default {
                debug!("stage.before prevented default for '{}'; skipping", stage_name);
                idx += 1;
                continue;
            }

            trace!("dispatching stage '{}' (query {})", stage_name, query.query_id);
            let result = match stage.process(query).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        "unhandled error in stage '{}' (query {}): {}",
                        stage_name, query.query_id, e
                    );
                    self.plugin_host
                        .dispatch(EventKind::UnhandledException {
                            stage: stage_name.clone(),
                            message: e.to_string(),
                        })
                        .await;
                    return Err(e);
                }
            };

            self.plugin_host
                .dispatch(EventKind::StageAfter {
                    stage: stage_name.clone(),
                })
                .await;

            // Serialize everything from here on behind the session's own
            // concurrency gate, as soon as a session exists to gate on
            // (spec.md §2.3, §5). Held on `query` so it outlives this loop
            // and releases only when the query itself is dropped, even if
            // the pool cancels dispatch on timeout.
            if query.session_permit.is_none() {
                if let Some(session) = query.session.clone() {
                    query.session_permit = Some(session.acquire_owned().await);
                }
            }

            match result {
                StageResult::Continue => idx += 1,
                StageResult::Jump(target) => {
                    jumps += 1;
                    if jumps > self.max_jumps {
                        return Err(PipelineError::internal(format!(
                            "stage '{}' exceeded max jump count ({})",
                            stage_name, self.max_jumps
                        )));
                    }
                    idx = *self.index_by_name.get(&target).ok_or_else(|| {
                        PipelineError::internal(format!("jump target '{}' not found", target))
                    })?;
                }
                StageResult::Interrupt => return Ok(()),
                StageResult::YieldStream(mut stream) => {
                    use futures::StreamExt;
                    while let Some(item) = stream.next().await {
                        query.resp_messages.push(item.chunk.clone());
                        if item.is_final {
                            break;
                        }
                    }
                    idx += 1;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Launcher, LauncherType, MessageEvent, Query};
    use crate::adapter::AdapterHandle;

    struct Echo(&'static str, Option<&'static str>);

    #[async_trait]
    impl Stage for Echo {
        fn name(&self) -> &str {
            self.0
        }

        async fn process(&self, query: &mut Query) -> Result<StageResult, PipelineError> {
            query.resp_messages.push(crate::message::Message::assistant(self.0));
            match self.1 {
                Some(target) => Ok(StageResult::Jump(target.to_string())),
                None => Ok(StageResult::Continue),
            }
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

    #[tokio::test]
    async fn runs_stages_in_order() {
        let stages: Vec<Box<dyn Stage>> = vec![Box::new(Echo("a", None)), Box::new(Echo("b", None))];
        let controller = PipelineController::new(stages, Arc::new(PluginHost::new()));
        let mut q = test_query();
        controller.dispatch(&mut q).await.unwrap();
        assert_eq!(q.resp_messages.len(), 2);
    }

    #[tokio::test]
    async fn jump_skips_to_named_stage() {
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(Echo("a", Some("c"))),
            Box::new(Echo("b", None)),
            Box::new(Echo("c", None)),
        ];
        let controller = PipelineController::new(stages, Arc::new(PluginHost::new()));
        let mut q = test_query();
        controller.dispatch(&mut q).await.unwrap();
        // "b" should have been skipped
        assert_eq!(q.resp_messages.len(), 2);
    }

    #[tokio::test]
    async fn disabled_stage_is_skipped() {
        use crate::config::StageConfig;

        let stages: Vec<Box<dyn Stage>> = vec![Box::new(Echo("a", None)), Box::new(Echo("b", None))];
        let controller = PipelineController::new(stages, Arc::new(PluginHost::new()));

        let mut pipeline_config = PipelineConfig::default();
        pipeline_config.stages.insert(
            "b".to_string(),
            StageConfig {
                enabled: false,
                options: serde_json::Value::Null,
            },
        );
        let mut q = Query::new(
            Launcher::new(LauncherType::Person, "1"),
            "1",
            MessageEvent {
                raw: serde_json::json!({}),
            },
            vec![],
            AdapterHandle::new_test_stub(),
            Arc::new(pipeline_config),
        );
        controller.dispatch(&mut q).await.unwrap();
        assert_eq!(q.resp_messages.len(), 1);
        assert_eq!(q.resp_messages[0].content.as_text(), "a");
    }

    #[tokio::test]
    async fn interrupt_halts_traversal() {
        struct Halt;
        #[async_trait]
        impl Stage for Halt {
            fn name(&self) -> &str {
                "halt"
            }
            async fn process(&self, _query: &mut Query) -> Result<StageResult, PipelineError> {
                Ok(StageResult::Interrupt)
            }
        }
        let stages: Vec<Box<dyn Stage>> = vec![Box::new(Halt), Box::new(Echo("never", None))];
        let controller = PipelineController::new(stages, Arc::new(PluginHost::new()));
        let mut q = test_query();
        controller.dispatch(&mut q).await.unwrap();
        assert_eq!(q.resp_messages.len(), 0);
    }

    use crate::session::Session;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Stands in for `SessionAcquireStage`: fills `query.session` with a
    /// shared, single-permit session.
    struct AcquireSession(Arc<Session>);

    #[async_trait]
    impl Stage for AcquireSession {
        fn name(&self) -> &str {
            "session_acquire"
        }
        async fn process(&self, query: &mut Query) -> Result<StageResult, PipelineError> {
            query.session = Some(self.0.clone());
            Ok(StageResult::Continue)
        }
    }

    /// Bumps a shared "in-flight" counter, sleeps briefly, and records the
    /// highest concurrent value observed -- the session permit should keep
    /// this at 1 for two queries on the same launcher.
    struct RecordConcurrency {
        in_flight: Arc<AtomicUsize>,
        max_observed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Stage for RecordConcurrency {
        fn name(&self) -> &str {
            "record"
        }
        async fn process(&self, _query: &mut Query) -> Result<StageResult, PipelineError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_observed.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(StageResult::Continue)
        }
    }

    #[tokio::test]
    async fn same_session_queries_are_serialized_by_the_permit() {
        let session = Arc::new(Session::new(Launcher::new(LauncherType::Person, "1001"), 1));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));

        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(AcquireSession(session.clone())),
            Box::new(RecordConcurrency {
                in_flight: in_flight.clone(),
                max_observed: max_observed.clone(),
            }),
        ];
        let controller = Arc::new(PipelineController::new(stages, Arc::new(PluginHost::new())));

        let mut q1 = test_query();
        let mut q2 = test_query();
        let c1 = controller.clone();
        let c2 = controller.clone();
        let h1 = tokio::spawn(async move { c1.dispatch(&mut q1).await.unwrap() });
        let h2 = tokio::spawn(async move { c2.dispatch(&mut q2).await.unwrap() });
        h1.await.unwrap();
        h2.await.unwrap();

        assert_eq!(max_observed.load(Ordering::SeqCst), 1);
        assert_eq!(session.available_permits(), 1);
    }
}
