use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use daveops::config::Settings;

mod cmd;

#[derive(Parser)]
#[command(name = "daveops")]
#[command(version, about = "Portfolio admin backend with one-button GitHub Actions deploys")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .daveops/ with a default config and an empty database
    Init {
        /// Overwrite an existing daveops.toml
        #[arg(long)]
        force: bool,
    },
    /// Run the admin API server
    Serve {
        /// Port to serve on (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path (overrides server.db_path)
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Dev mode: bind 0.0.0.0 and allow any CORS origin
        #[arg(long)]
        dev: bool,
    },
    /// Create a deployment and trigger the deploy workflow
    ///
    /// Runs in this process against the project database. The one-at-a-time
    /// guard of a running `daveops serve` does not cover it; use
    /// `POST /api/deployments` on the server to go through that guard.
    Deploy,
    /// Trigger the deploy workflow for an existing deployment
    Trigger {
        /// Deployment id
        deployment_id: String,
    },
    /// List recent deployments, newest first
    History {
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
    /// Show one deployment
    Show {
        /// Deployment id
        id: String,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default daveops.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let settings = Settings::load_or_default(&project_dir)?;
    let _telemetry = daveops::telemetry::init(&settings, cli.verbose)?;

    match &cli.command {
        Commands::Init { force } => cmd::cmd_init(&project_dir, *force)?,
        Commands::Serve { port, db_path, dev } => {
            cmd::cmd_serve(&settings, *port, db_path.clone(), *dev).await?
        }
        Commands::Deploy => cmd::cmd_deploy(&settings, cli.yes).await?,
        Commands::Trigger { deployment_id } => {
            cmd::cmd_trigger(&settings, deployment_id).await?
        }
        Commands::History { limit } => cmd::cmd_history(&settings, *limit)?,
        Commands::Show { id } => cmd::cmd_show(&settings, id)?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, &settings, command.clone())?,
    }

    Ok(())
}
