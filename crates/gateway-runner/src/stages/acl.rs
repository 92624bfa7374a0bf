//! The Bans/ACL filter stage: drop queries from muted launchers before any
//! session state or LLM cost is spent on them (spec.md §2, step 2).

use async_trait::async_trait;
use gateway_core::error::PipelineError;
use gateway_core::query::{LauncherType, Query};
use gateway_core::stage::{Stage, StageResult};
use gateway_core::Application;
use log::debug;
use std::sync::Arc;

pub struct AclStage {
    app: Arc<Application>,
}

impl AclStage {
    pub fn new(app: Arc<Application>) -> Self {
        Self { app }
    }
}

#[async_trait]
impl Stage for AclStage {
    fn name(&self) -> &str {
        "acl"
    }

    async fn process(&self, query: &mut Query) -> Result<StageResult, PipelineError> {
        let config = self.app.config();

        let statically_muted = config
            .platform
            .mute_rules
            .iter()
            .any(|rule| rule.launcher_id == query.launcher.launcher_id);
        if statically_muted {
            debug!("query {} dropped: launcher is statically muted", query.query_id);
            return Ok(StageResult::Interrupt);
        }

        if query.launcher.launcher_type == LauncherType::Group
            && query.adapter.0.is_muted(&query.launcher.launcher_id).await?
        {
            debug!("query {} dropped: group is muted on the platform", query.query_id);
            return Ok(StageResult::Interrupt);
        }

        Ok(StageResult::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::adapter::AdapterHandle;
    use gateway_core::config::{Config, MuteRule, PipelineConfig};
    use gateway_core::query::{Launcher, MessageEvent};

    fn query(launcher_id: &str) -> Query {
        Query::new(
            Launcher::new(LauncherType::Person, launcher_id),
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
    async fn statically_muted_launcher_is_dropped() {
        let mut config = Config::default();
        config.platform.mute_rules.push(MuteRule {
            launcher_id: "1001".into(),
            reason: None,
        });
        let app = Arc::new(Application::new(config));
        let stage = AclStage::new(app);
        let mut q = query("1001");
        assert!(matches!(
            stage.process(&mut q).await.unwrap(),
            StageResult::Interrupt
        ));
    }

    #[tokio::test]
    async fn unmuted_launcher_continues() {
        let app = Arc::new(Application::new(Config::default()));
        let stage = AclStage::new(app);
        let mut q = query("1001");
        assert!(matches!(
            stage.process(&mut q).await.unwrap(),
            StageResult::Continue
        ));
    }
}
