use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod bootstrap;
mod commands;
mod render;
mod repl;
mod selector;
mod telemetry;

use bootstrap::Overrides;

#[derive(Parser)]
#[command(name = "sleuth")]
#[command(about = "SLEUTH - investigate addresses against an analysis backend", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the analysis backend
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Directory for sessions, histories and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive shell (default)
    Repl,
    /// List stored sessions
    Sessions,
    /// Print the stored messages of a session
    History {
        /// Listing position, session id or id prefix
        session: String,
    },
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the configuration file location
    Path,
    /// Write a commented template if no file exists
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = Overrides {
        config: cli.config.clone(),
        backend_url: cli.backend_url.clone(),
        data_dir: cli.data_dir.clone(),
    };
    let settings = bootstrap::resolve_settings(&overrides)?;
    let _log_guard =
        telemetry::init_telemetry(&settings.paths.logs_dir()?, &cli.log_level, cli.json_logs)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "[Main] sleuth starting");

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => {
            let service = bootstrap::open_service(&settings).await?;
            repl::run(service).await?;
        }
        Commands::Sessions => commands::sessions::list(&settings).await?,
        Commands::History { session } => commands::history::show(&settings, &session).await?,
        Commands::Config { action } => match action {
            ConfigAction::Path => commands::config::path(&settings)?,
            ConfigAction::Init => commands::config::init(&settings)?,
            ConfigAction::Show => commands::config::show(&settings)?,
        },
    }

    Ok(())
}
