//! Loads the five config bundles named in spec.md §6 from a directory,
//! falling back to each bundle's `Default` when its file is absent.

use anyhow::Context;
use gateway_core::config::{load_bundle, CommandConfig, Config, PipelineConfig, PlatformConfig, ProviderConfig, SystemConfig};
use std::path::Path;

fn load_or_default<T>(path: &Path) -> anyhow::Result<T>
where
    T: Default + serde::de::DeserializeOwned + schemars::JsonSchema,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let document = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    load_bundle(&document).with_context(|| format!("parsing {}", path.display()))
}

pub fn load_config(config_dir: &Path) -> anyhow::Result<Config> {
    Ok(Config {
        command: load_or_default::<CommandConfig>(&config_dir.join("command.json"))?,
        pipeline: load_or_default::<PipelineConfig>(&config_dir.join("pipeline.json"))?,
        platform: load_or_default::<PlatformConfig>(&config_dir.join("platform.json"))?,
        provider: load_or_default::<ProviderConfig>(&config_dir.join("provider.json"))?,
        system: load_or_default::<SystemConfig>(&config_dir.join("system.json"))?,
    })
}
