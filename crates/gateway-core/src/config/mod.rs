//! The five logical configuration bundles named in spec.md §6.
//!
//! Each bundle is a `serde`-deserializable struct with a `schemars`-derived
//! JSON Schema, loaded from a JSON document and validated at load. A
//! reload constructs a fresh `Arc<PipelineConfig>` (or whichever bundle
//! changed) and the caller swaps an `ArcSwap` pointer atomically between
//! queries -- no bundle is ever mutated in place.

mod command_config;
mod pipeline_config;
mod platform_config;
mod provider_config;
mod system_config;

pub use command_config::CommandConfig;
pub use pipeline_config::{PipelineConfig, StageConfig};
pub use platform_config::{MuteRule, PlatformConfig, ReplyOptions};
pub use provider_config::{ModelDefaults, ProviderConfig, ProviderEntry};
pub use system_config::SystemConfig;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("schema validation failed: {0}")]
    Validation(String),
}

/// Parse and (lightly) validate a config bundle from a JSON document.
///
/// Full JSON-Schema validation against the `schemars`-generated schema is
/// left to the (external) config-loading stage; here we only guarantee the
/// document deserializes into the typed shape, which is the invariant the
/// rest of the pipeline relies on.
pub fn load_bundle<T>(document: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned + JsonSchema,
{
    let value: T = serde_json::from_str(document)?;
    Ok(value)
}

/// The union of all five bundles, as handed to stage/runner construction.
/// Immutable once built; a config reload produces a brand new `Config`.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub command: CommandConfig,
    pub pipeline: PipelineConfig,
    pub platform: PlatformConfig,
    pub provider: ProviderConfig,
    pub system: SystemConfig,
}
