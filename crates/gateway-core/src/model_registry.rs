//! `ModelRegistry` — read-mostly lookup table of configured models.
//!
//! Grounded in `original_source/pkg/provider/modelmgr/modelmgr.py`: models
//! are registered once at boot, keyed by name, and a conversation freezes
//! its choice at creation time rather than re-resolving it on every turn.

use crate::message::LLMModelInfo;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<LLMModelInfo>>,
    default_model: Option<String>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: LLMModelInfo) {
        let name = model.name.clone();
        if self.default_model.is_none() {
            self.default_model = Some(name.clone());
        }
        self.models.insert(name, Arc::new(model));
    }

    pub fn set_default(&mut self, name: impl Into<String>) {
        self.default_model = Some(name.into());
    }

    pub fn get(&self, name: &str) -> Option<Arc<LLMModelInfo>> {
        self.models.get(name).cloned()
    }

    pub fn default_model(&self) -> Option<Arc<LLMModelInfo>> {
        self.default_model.as_deref().and_then(|n| self.get(n))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ApproximateTokenManager, LLMRequester, RequesterError, FunctionSpecs, Message, StreamHook};
    use async_trait::async_trait;

    struct FakeRequester;

    #[async_trait]
    impl LLMRequester for FakeRequester {
        async fn initialize(&self) -> Result<(), RequesterError> {
            Ok(())
        }
        async fn call(
            &self,
            _model: &str,
            _messages: &[Message],
            _funcs: &FunctionSpecs,
            _stream: bool,
            _stream_hook: Option<Arc<dyn StreamHook>>,
        ) -> Result<Message, RequesterError> {
            Ok(Message::assistant("ok"))
        }
    }

    fn model(name: &str) -> LLMModelInfo {
        LLMModelInfo {
            name: name.to_string(),
            provider_model_name: None,
            requester: Arc::new(FakeRequester),
            token_manager: Arc::new(ApproximateTokenManager),
            tool_call_supported: true,
        }
    }

    #[test]
    fn first_registered_model_becomes_default() {
        let mut registry = ModelRegistry::new();
        registry.register(model("gpt-4o"));
        registry.register(model("claude"));
        assert_eq!(registry.default_model().unwrap().name, "gpt-4o");
        assert_eq!(registry.names(), vec!["claude".to_string(), "gpt-4o".to_string()]);
    }

    #[test]
    fn explicit_default_overrides_first_registered() {
        let mut registry = ModelRegistry::new();
        registry.register(model("gpt-4o"));
        registry.register(model("claude"));
        registry.set_default("claude");
        assert_eq!(registry.default_model().unwrap().name, "claude");
    }
}
