//! autoops command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use autoops_agent::{
    ActionExecutor, GoalRunner, GoogleSearch, ProcessSpawner, RunOutcome, StopSignal,
};
use autoops_config::{self, paths, Config, Overrides, Settings};
use autoops_history::HistoryStore;
use autoops_provider::{OpenAiProvider, StructuredClient};

/// Per-run overrides taken from the command line or environment
pub struct RunArgs {
    pub goal: Option<String>,
    pub history_id: Option<String>,
    pub stop_signal: Option<PathBuf>,
    pub sandbox_root: Option<PathBuf>,
    pub agent_user: Option<String>,
}

impl From<RunArgs> for Overrides {
    fn from(args: RunArgs) -> Self {
        Overrides {
            goal: args.goal,
            history_id: args.history_id,
            stop_signal: args.stop_signal,
            sandbox_root: args.sandbox_root,
            agent_user: args.agent_user,
        }
    }
}

fn config_file(config: Option<PathBuf>) -> PathBuf {
    config.unwrap_or_else(autoops_config::config_path)
}

async fn load_config(path: &Path) -> Result<Config> {
    Config::load_from(path)
        .await
        .with_context(|| format!("failed to load config from {}", path.display()))
}

/// Run the agent until it finishes or is stopped
pub async fn run_command(config: Option<PathBuf>, args: RunArgs) -> Result<RunOutcome> {
    let config_path = config.clone().map(|p| absolute(&p)).transpose()?;
    let cfg = load_config(&config_file(config)).await?;

    let settings = Arc::new(Settings::resolve(&cfg, args.into())?);
    let api_key = cfg.require_api_key()?;

    let provider = OpenAiProvider::new(
        api_key,
        cfg.decision.api_base.clone(),
        Some(cfg.decision.model.clone()),
    );
    let decision = Arc::new(
        StructuredClient::new(provider)
            .with_model(cfg.decision.model.clone())
            .with_temperature(cfg.decision.temperature)
            .with_max_tokens(cfg.decision.max_tokens),
    );

    let mut search = GoogleSearch::new(cfg.search_api_key(), cfg.search_cse_id());
    if let Some(base) = &cfg.search.api_base {
        search = search.with_base_url(base.clone());
    }
    if !search.is_configured() {
        warn!("◆ web search is not configured, search_web will return no results");
    }

    let mut spawner = ProcessSpawner::current_exe()
        .context("cannot locate own executable")?
        .inherit(&settings);
    if let Some(path) = config_path {
        spawner = spawner.with_leading_args(vec![
            "--config".to_string(),
            path.to_string_lossy().into_owned(),
        ]);
    }

    let executor = ActionExecutor::new(
        settings.clone(),
        decision.clone(),
        Arc::new(search),
        Arc::new(spawner),
    );
    let mut runner = GoalRunner::new(settings.clone(), decision, executor).await?;

    let outcome = runner.run().await?;
    match outcome {
        RunOutcome::Finished => info!("◆ goal finished after {} steps", runner.history().len()),
        RunOutcome::Stopped => info!("◆ agent stopped"),
    }
    Ok(outcome)
}

/// Write the default config and create the agent directories
pub async fn init_command(config: Option<PathBuf>) -> Result<()> {
    let path = config_file(config);
    let cfg = autoops_config::init_at(&path).await?;

    println!("◆ autoops initialized");
    println!("  Config:  {}", path.display());
    println!("  History: {}", cfg.agent.history_dir);
    println!("  Sandbox: {}", cfg.agent.sandbox_root);
    if cfg.api_key().is_none() {
        println!();
        println!("Set decision.api_key in the config or export OPENAI_API_KEY before running.");
    }
    Ok(())
}

/// Raise the stop signal watched by a running agent
pub async fn stop_command(config: Option<PathBuf>, stop_signal: Option<PathBuf>) -> Result<()> {
    let path = match stop_signal {
        Some(path) => absolute(&path)?,
        None => {
            let cfg = load_config(&config_file(config)).await?;
            paths::absolutize(&cfg.agent.stop_signal)?
        }
    };

    let signal = StopSignal::new(&path);
    signal
        .raise()
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;

    println!("✓ Stop signal raised at {}", path.display());
    Ok(())
}

/// List stored history ids, or print one history as JSON
pub async fn history_command(config: Option<PathBuf>, id: Option<String>) -> Result<()> {
    let cfg = load_config(&config_file(config)).await?;
    let store = HistoryStore::new(paths::absolutize(&cfg.agent.history_dir)?);

    match id {
        None => {
            let ids = store.list().await;
            if ids.is_empty() {
                println!("No stored histories");
            } else {
                for id in ids {
                    println!("{}", id);
                }
            }
        }
        Some(id) => {
            if !store.exists(&id).await {
                anyhow::bail!("no history named '{}' in {}", id, store.dir().display());
            }
            let history = store.load(&id).await?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
    }
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(paths::absolutize(&path.to_string_lossy())?)
}
