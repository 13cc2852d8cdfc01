//! Configuration view and validation commands — `daveops config`.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use daveops::config::{DAVEOPS_DIR, ENV_ADMIN_TOKEN, ENV_GITHUB_TOKEN, Settings};

use super::super::ConfigCommands;

fn presence(value: Option<String>) -> &'static str {
    if value.is_some() { "set" } else { "not set" }
}

pub fn cmd_config(
    project_dir: &Path,
    settings: &Settings,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let config_path = Settings::config_path(project_dir);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("daveops Configuration");
            println!("=====================");
            println!();
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No daveops.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();

            println!("[server]");
            println!("  host = \"{}\"", settings.server.host);
            println!("  port = {}", settings.server.port);
            println!("  db_path = \"{}\"", settings.db_path().display());
            println!("  allow_any_origin = {}", settings.server.allow_any_origin);
            println!();
            println!("[github]");
            println!("  repository = \"{}\"", settings.repository());
            println!("  event_type = \"{}\"", settings.github.event_type);
            println!("  api_base = \"{}\"", settings.github.api_base);
            println!();
            println!("[site]");
            println!("  deployment_url = \"{}\"", settings.site_url());
            println!();
            println!("[logging]");
            println!("  level = \"{}\"", settings.logging.level);
            println!("  format = \"{:?}\"", settings.logging.format);
            if let Some(dir) = settings.log_dir() {
                println!("  dir = \"{}\"", dir.display());
            }
            println!();
            println!("Secrets (from environment):");
            println!("  {} {}", ENV_GITHUB_TOKEN, presence(settings.github_token()));
            println!("  {} {}", ENV_ADMIN_TOKEN, presence(settings.admin_token()));
            println!();
        }
        Some(ConfigCommands::Validate) => {
            let warnings = settings.validate();
            if warnings.is_empty() {
                println!("{} Configuration is valid", style("✓").green());
            } else {
                println!("{} Configuration warnings:", style("!").yellow());
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("daveops.toml already exists at {}", config_path.display());
                return Ok(());
            }
            let dir = project_dir.join(DAVEOPS_DIR);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            Settings::default().save(&config_path)?;
            println!("Created {}", config_path.display());
        }
    }

    Ok(())
}
