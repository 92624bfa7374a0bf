//! `QueryPool` — a fixed worker pool draining an unbounded queue of
//! inbound queries through a shared `PipelineController`.
//!
//! Grounded in `agent::worker_pool::WorkerPool` (N tokio tasks pulling from
//! an `mpsc` channel, a `CancellationToken` for graceful shutdown); the
//! per-query wall-clock timeout is grounded in `agent::worker_pool`'s
//! `tokio::time::timeout` wrap around each unit of work.

use crate::error::PipelineError;
use crate::query::Query;
use crate::stage::PipelineController;
use crate::task_manager::{TaskContext, TaskManager};
use log::{debug, error, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Error returned by `QueryPool::submit` once shutdown has started.
#[derive(Debug, thiserror::Error)]
#[error("query pool is shutting down")]
pub struct ShuttingDown;

pub struct QueryPool {
    sender: mpsc::UnboundedSender<Query>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl QueryPool {
    /// Spawn `worker_count` tasks, each pulling from the shared queue and
    /// running `controller.dispatch` on every query it receives, bounded by
    /// `per_query_timeout`.
    pub fn spawn(
        worker_count: usize,
        controller: Arc<PipelineController>,
        task_manager: Arc<TaskManager>,
        per_query_timeout: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<Query>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let cancel = CancellationToken::new();

        let mut workers = Vec::with_capacity(worker_count.max(1));
        for worker_id in 0..worker_count.max(1) {
            let receiver = receiver.clone();
            let controller = controller.clone();
            let task_manager = task_manager.clone();
            let cancel = cancel.clone();

            workers.push(tokio::spawn(async move {
                let ctx = task_manager.register_worker(worker_id);
                loop {
                    let next = {
                        let mut guard = receiver.lock().await;
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => None,
                            item = guard.recv() => item,
                        }
                    };

                    let Some(mut query) = next else {
                        break;
                    };

                    ctx.set_action(format!("dispatching query {}", query.query_id));
                    let query_id = query.query_id;

                    let outcome =
                        tokio::time::timeout(per_query_timeout, controller.dispatch(&mut query))
                            .await;

                    match outcome {
                        Ok(Ok(())) => {
                            debug!("worker {worker_id} finished query {query_id}");
                        }
                        Ok(Err(e)) => {
                            warn!("worker {worker_id} query {query_id} failed: {e}");
                            ctx.log(format!("query {query_id} failed: {e}"));
                        }
                        Err(_) => {
                            error!("worker {worker_id} query {query_id} timed out");
                            ctx.log(format!("query {query_id} timed out"));
                            send_timeout_reply(&query).await;
                        }
                    }
                    ctx.set_action("idle");
                }
            }));
        }

        Self {
            sender,
            cancel,
            workers,
        }
    }

    /// Enqueue a query for processing. Returns an error once
    /// `shutdown` has been called.
    pub fn submit(&self, query: Query) -> Result<(), ShuttingDown> {
        if self.cancel.is_cancelled() {
            return Err(ShuttingDown);
        }
        self.sender.send(query).map_err(|_| ShuttingDown)
    }

    /// Stop accepting new work and wait for in-flight workers to drain.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn send_timeout_reply(query: &Query) {
    if let Some(reply) = query.pipeline_config.timeout_reply.as_ref() {
        let chain = vec![crate::query::MessageElement::Text { text: reply.clone() }];
        if let Err(e) = query
            .adapter
            .0
            .reply_message(&query.message_event, &chain, false)
            .await
        {
            warn!("failed to send timeout reply for query {}: {e}", query.query_id);
        }
    }
}

impl From<ShuttingDown> for PipelineError {
    fn from(_: ShuttingDown) -> Self {
        PipelineError::internal("query pool is shutting down")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterHandle;
    use crate::config::PipelineConfig;
    use crate::plugin::PluginHost;
    use crate::query::{Launcher, LauncherType, MessageEvent};
    use crate::stage::{Stage, StageResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStage(Arc<AtomicUsize>);

    #[async_trait]
    impl Stage for CountingStage {
        fn name(&self) -> &str {
            "counting"
        }
        async fn process(&self, _query: &mut Query) -> Result<StageResult, PipelineError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(StageResult::Continue)
        }
    }

    struct SlowStage;

    #[async_trait]
    impl Stage for SlowStage {
        fn name(&self) -> &str {
            "slow"
        }
        async fn process(&self, _query: &mut Query) -> Result<StageResult, PipelineError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(StageResult::Continue)
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
    async fn dispatches_submitted_queries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let controller = Arc::new(PipelineController::new(
            vec![Box::new(CountingStage(calls.clone()))],
            Arc::new(PluginHost::new()),
        ));
        let task_manager = Arc::new(TaskManager::new());
        let pool = QueryPool::spawn(2, controller, task_manager, Duration::from_secs(5));

        pool.submit(test_query()).unwrap();
        pool.submit(test_query()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        pool.shutdown().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let controller = Arc::new(PipelineController::new(vec![], Arc::new(PluginHost::new())));
        let task_manager = Arc::new(TaskManager::new());
        let pool = QueryPool::spawn(1, controller, task_manager, Duration::from_secs(5));
        pool.cancel.cancel();
        assert!(pool.submit(test_query()).is_err());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn per_query_timeout_does_not_wedge_the_worker() {
        let controller = Arc::new(PipelineController::new(
            vec![Box::new(SlowStage)],
            Arc::new(PluginHost::new()),
        ));
        let task_manager = Arc::new(TaskManager::new());
        let pool = QueryPool::spawn(1, controller, task_manager, Duration::from_millis(20));
        pool.submit(test_query()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        // The worker should have moved on rather than being stuck forever;
        // a second query still gets a turn.
        pool.submit(test_query()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        pool.shutdown().await;
    }
}
