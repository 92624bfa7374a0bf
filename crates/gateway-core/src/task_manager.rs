//! `TaskManager` — per-worker introspection state: a `current_action`
//! string and a bounded ring buffer of recent log lines, consulted by the
//! (out-of-scope) HTTP introspection endpoints named in SPEC_FULL.md §4.1.
//!
//! Grounded in `agent::task::TaskContext`: a cheap `Arc`-shared handle each
//! long-running task updates in place rather than a channel back to a
//! central collector.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

const LOG_RING_CAPACITY: usize = 64;

/// Which part of the system a task belongs to, for the scoped cancellation
/// groups described in spec.md §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Application,
    Platform,
    Provider,
}

struct TaskContextInner {
    current_action: String,
    log_ring: VecDeque<String>,
}

/// A handle a long-running task holds onto for the duration of its life,
/// updating `current_action` and appending to the log ring as it works.
#[derive(Clone)]
pub struct TaskContext {
    id: String,
    scope: Scope,
    inner: Arc<Mutex<TaskContextInner>>,
}

impl TaskContext {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn set_action(&self, action: impl Into<String>) {
        self.inner.lock().current_action = action.into();
    }

    pub fn current_action(&self) -> String {
        self.inner.lock().current_action.clone()
    }

    pub fn log(&self, line: impl Into<String>) {
        let mut inner = self.inner.lock();
        if inner.log_ring.len() == LOG_RING_CAPACITY {
            inner.log_ring.pop_front();
        }
        inner.log_ring.push_back(line.into());
    }

    pub fn recent_logs(&self) -> Vec<String> {
        self.inner.lock().log_ring.iter().cloned().collect()
    }
}

/// Registry of live `TaskContext`s, one per query-pool worker (and, once
/// adapters/providers are wired in by an embedder, one per adapter/provider
/// task too).
pub struct TaskManager {
    contexts: Mutex<Vec<TaskContext>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn register_worker(&self, worker_id: usize) -> TaskContext {
        self.register(format!("worker-{worker_id}"), Scope::Application)
    }

    pub fn register(&self, id: impl Into<String>, scope: Scope) -> TaskContext {
        let ctx = TaskContext {
            id: id.into(),
            scope,
            inner: Arc::new(Mutex::new(TaskContextInner {
                current_action: "idle".to_string(),
                log_ring: VecDeque::with_capacity(LOG_RING_CAPACITY),
            })),
        };
        self.contexts.lock().push(ctx.clone());
        ctx
    }

    pub fn snapshot(&self) -> Vec<(String, Scope, String)> {
        self.contexts
            .lock()
            .iter()
            .map(|c| (c.id.clone(), c.scope, c.current_action()))
            .collect()
    }

    pub fn contexts_in_scope(&self, scope: Scope) -> Vec<TaskContext> {
        self.contexts
            .lock()
            .iter()
            .filter(|c| c.scope == scope)
            .cloned()
            .collect()
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_tracks_action_updates() {
        let manager = TaskManager::new();
        let ctx = manager.register("w0", Scope::Application);
        ctx.set_action("dispatching query 1");
        assert_eq!(ctx.current_action(), "dispatching query 1");
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].2, "dispatching query 1");
    }

    #[test]
    fn log_ring_drops_oldest_past_capacity() {
        let manager = TaskManager::new();
        let ctx = manager.register("w0", Scope::Platform);
        for i in 0..(LOG_RING_CAPACITY + 10) {
            ctx.log(format!("line {i}"));
        }
        let logs = ctx.recent_logs();
        assert_eq!(logs.len(), LOG_RING_CAPACITY);
        assert_eq!(logs[0], format!("line {}", 10));
    }

    #[test]
    fn contexts_in_scope_filters_by_scope() {
        let manager = TaskManager::new();
        manager.register("app", Scope::Application);
        manager.register("plat", Scope::Platform);
        manager.register("prov", Scope::Provider);
        assert_eq!(manager.contexts_in_scope(Scope::Platform).len(), 1);
    }
}
