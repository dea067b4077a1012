//! autoops - an autonomous operations agent

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{history_command, init_command, run_command, stop_command, RunArgs};

/// autoops - goal-driven operations agent
#[derive(Parser)]
#[command(name = "autoops")]
#[command(about = "◆ An autonomous operations agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Config file (default: ~/.autoops/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent until it finishes or is stopped
    Run {
        /// Goal the agent works toward
        #[arg(short, long, env = "GOAL")]
        goal: Option<String>,
        /// History id to resume or create
        #[arg(long, env = "HISTORY_ID")]
        history_id: Option<String>,
        /// Stop-signal file to watch
        #[arg(long)]
        stop_signal: Option<PathBuf>,
        /// Directory generated scripts are confined to
        #[arg(long)]
        sandbox_root: Option<PathBuf>,
        /// User privileged actions run as
        #[arg(long, env = "AGENT_USER")]
        agent_user: Option<String>,
    },
    /// Initialize config and agent directories
    Init,
    /// Ask a running agent to stop
    Stop {
        /// Stop-signal file to create
        #[arg(long)]
        stop_signal: Option<PathBuf>,
    },
    /// List stored histories, or print one
    History {
        /// History id to print
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let config = cli.config;
    match cli.command {
        Commands::Run {
            goal,
            history_id,
            stop_signal,
            sandbox_root,
            agent_user,
        } => {
            let args = RunArgs {
                goal,
                history_id,
                stop_signal,
                sandbox_root,
                agent_user,
            };
            if let Err(e) = run_command(config, args).await {
                error!("Run failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Init => {
            if let Err(e) = init_command(config).await {
                error!("Init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Stop { stop_signal } => {
            if let Err(e) = stop_command(config, stop_signal).await {
                error!("Stop failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::History { id } => {
            if let Err(e) = history_command(config, id).await {
                error!("History failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}
