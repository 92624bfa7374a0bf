//! The Session Acquire stage: find-or-create the `Session` and its active
//! `Conversation` before routing to the Processor (spec.md §2, step 3).

use async_trait::async_trait;
use gateway_core::error::PipelineError;
use gateway_core::query::Query;
use gateway_core::stage::{Stage, StageResult};
use gateway_core::Application;
use std::sync::Arc;

pub struct SessionAcquireStage {
    app: Arc<Application>,
}

impl SessionAcquireStage {
    pub fn new(app: Arc<Application>) -> Self {
        Self { app }
    }
}

#[async_trait]
impl Stage for SessionAcquireStage {
    fn name(&self) -> &str {
        "session_acquire"
    }

    async fn process(&self, query: &mut Query) -> Result<StageResult, PipelineError> {
        let session = self
            .app
            .sessions
            .get_or_create_session(query, &query.pipeline_config)
            .await;

        let model_name = self
            .app
            .models
            .default_model()
            .map(|m| m.name.clone())
            .unwrap_or_default();

        self.app
            .sessions
            .get_or_create_conversation(&session, &query.pipeline_config, &model_name, query.use_funcs.clone())
            .await?;

        query.session = Some(session);
        Ok(StageResult::Continue)
    }
}
