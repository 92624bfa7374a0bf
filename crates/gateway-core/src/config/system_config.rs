use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// HTTP API host/port/enable, task timeouts, and logging level.
///
/// The HTTP control-plane router and static console are out of scope for
/// this crate (spec.md §1); this bundle still carries the settings a
/// caller embedding the core would hand to that router.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SystemConfig {
    pub http_enable: bool,
    pub http_host: String,
    pub http_port: u16,
    pub query_pool_workers: usize,
    pub per_query_timeout_secs: u64,
    pub per_llm_request_timeout_secs: u64,
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            http_enable: false,
            http_host: "127.0.0.1".to_string(),
            http_port: 5300,
            query_pool_workers: 4,
            per_query_timeout_secs: 120,
            per_llm_request_timeout_secs: 60,
            log_level: "info".to_string(),
        }
    }
}
