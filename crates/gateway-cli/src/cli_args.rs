use clap::Parser;
use std::path::PathBuf;

/// Process bootstrap for the chat-bot gateway.
#[derive(Parser, Debug)]
#[command(name = "gateway", about = "Boots the chat-bot gateway pipeline")]
pub struct CliArgs {
    /// Directory holding the five config bundles (command.json, pipeline.json,
    /// platform.json, provider.json, system.json). Missing files fall back to
    /// each bundle's defaults.
    #[arg(short = 'c', long = "config-dir", default_value = "./config")]
    pub config_dir: PathBuf,
}
