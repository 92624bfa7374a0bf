mod cli_args;
mod config_loader;
mod control;

use clap::Parser;
use cli_args::CliArgs;
use gateway_core::model_registry::ModelRegistry;
use gateway_core::session::NullSessionStore;
use gateway_core::stage::{PipelineController, Stage};
use gateway_core::{Application, QueryPool};
use gateway_runner::command::{register_builtins, CommandDispatcher, CommandRegistry};
use gateway_runner::runner::{LocalAgentRunner, Runner};
use gateway_runner::stages::{
    AclStage, ChatHandlerStage, PreprocessorStage, ProcessorStage, ResponseWrapperStage, SendReplyStage,
    SessionAcquireStage,
};
use gateway_runner::tool::ToolManager;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Wires the fixed stage order declared in spec.md §2 on top of `app`.
///
/// `tools` and `runners` come from the embedder: this workspace deliberately
/// carries no concrete provider or tool implementations (spec.md §1), only
/// the `LocalAgentRunner`/`BridgeRunner` shells that consume them.
fn build_stages(
    app: Arc<Application>,
    dispatcher: Arc<CommandDispatcher>,
    runners: HashMap<String, Arc<dyn Runner>>,
) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(PreprocessorStage::new(app.plugin_host.clone())),
        Box::new(AclStage::new(app.clone())),
        Box::new(SessionAcquireStage::new(app.clone())),
        Box::new(ProcessorStage::new(dispatcher, app.clone())),
        Box::new(ChatHandlerStage::new(runners, app.plugin_host.clone())),
        Box::new(ResponseWrapperStage::new(app.clone())),
        Box::new(SendReplyStage::new(app)),
    ]
}

/// Spawns the background sweep that expires idle sessions, per
/// `PipelineConfig::session_expire_time_secs` (spec.md §4.3).
fn spawn_session_sweeper(app: Arc<Application>, expire_secs: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            let expired = app.sessions.sweep_expired(expire_secs).await;
            if expired > 0 {
                info!("expired {expired} idle session(s)");
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = CliArgs::parse();

    let config = config_loader::load_config(&args.config_dir)?;
    info!("loaded configuration from {}", args.config_dir.display());

    let pipeline_config = config.pipeline.clone();
    let system_config = config.system.clone();

    // No provider is wired into this workspace (spec.md §1 scopes LLM HTTP
    // shapes out); the embedder registers real `LLMModelInfo`s here before
    // boot. An empty registry is still a valid, if useless, configuration.
    let models = ModelRegistry::new();

    let app = Arc::new(Application::with_store(config, Arc::new(NullSessionStore), models));

    let mut registry = CommandRegistry::new();
    register_builtins(&mut registry);
    let dispatcher = Arc::new(CommandDispatcher::new(Arc::new(registry), app.config().command.clone()));

    let tools = Arc::new(ToolManager::new());
    let local_agent = Arc::new(LocalAgentRunner::new(app.models.clone(), tools, app.plugin_host.clone()));
    let mut runners: HashMap<String, Arc<dyn Runner>> = HashMap::new();
    runners.insert(local_agent.name().to_string(), local_agent);

    let stages = build_stages(app.clone(), dispatcher, runners);
    let mut controller = PipelineController::new(stages, app.plugin_host.clone());
    controller.initialize(&pipeline_config).await?;
    let controller = Arc::new(controller);

    let pool = QueryPool::spawn(
        system_config.query_pool_workers,
        controller,
        app.tasks.clone(),
        Duration::from_secs(system_config.per_query_timeout_secs),
    );

    let sweeper = spawn_session_sweeper(app.clone(), pipeline_config.session_expire_time_secs);

    info!("gateway is running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining query pool");

    sweeper.abort();
    pool.shutdown().await;

    Ok(())
}
