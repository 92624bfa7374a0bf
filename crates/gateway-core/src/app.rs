//! `Application` — the aggregate root wiring config, plugin host, session
//! manager, and task manager together.
//!
//! Replaces the source's module-level singleton (`pkg/core/app.py`'s
//! `Application` imported and mutated from everywhere) with an explicit
//! struct constructed once at boot and handed out as `Arc<Application>` to
//! every component that needs it (spec.md §9, "no global mutable state").

use crate::config::Config;
use crate::model_registry::ModelRegistry;
use crate::plugin::PluginHost;
use crate::session::{NullSessionStore, SessionManager, SessionStore};
use crate::task_manager::TaskManager;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Everything a stage, runner, or command handler needs a reference to.
/// Cloning an `Arc<Application>` is the only way components get at shared
/// state; there is no ambient global to reach for instead.
pub struct Application {
    config: ArcSwap<Config>,
    pub plugin_host: Arc<PluginHost>,
    pub sessions: Arc<SessionManager>,
    pub tasks: Arc<TaskManager>,
    pub models: Arc<ModelRegistry>,
}

impl Application {
    pub fn new(config: Config) -> Self {
        Self::with_store(config, Arc::new(NullSessionStore), ModelRegistry::new())
    }

    pub fn with_store(config: Config, store: Arc<dyn SessionStore>, models: ModelRegistry) -> Self {
        let plugin_host = Arc::new(PluginHost::new());
        Self {
            config: ArcSwap::from_pointee(config),
            sessions: Arc::new(SessionManager::new(plugin_host.clone(), store)),
            plugin_host,
            tasks: Arc::new(TaskManager::new()),
            models: Arc::new(models),
        }
    }

    /// The current configuration snapshot. Stable for the duration of a
    /// single query's traversal (`Query::pipeline_config` is cloned from
    /// this at dispatch time), per spec.md §5.
    pub fn config(&self) -> Arc<Config> {
        self.config.load_full()
    }

    /// Atomically swap in a freshly loaded configuration. Queries already
    /// in flight keep the snapshot they started with.
    pub fn reload_config(&self, config: Config) {
        self.config.store(Arc::new(config));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reload_config_does_not_affect_a_snapshot_already_taken() {
        let app = Application::new(Config::default());
        let snapshot = app.config();
        assert_eq!(snapshot.system.http_port, 5300);

        let mut next = Config::default();
        next.system.http_port = 9999;
        app.reload_config(next);

        assert_eq!(snapshot.system.http_port, 5300);
        assert_eq!(app.config().system.http_port, 9999);
    }
}
