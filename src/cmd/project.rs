//! Project setup — `daveops init`.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use daveops::config::{DAVEOPS_DIR, Settings};
use daveops::deploy::db::DeployDb;

pub fn cmd_init(project_dir: &Path, force: bool) -> Result<()> {
    let daveops_dir = project_dir.join(DAVEOPS_DIR);
    std::fs::create_dir_all(&daveops_dir)
        .with_context(|| format!("Failed to create {}", daveops_dir.display()))?;

    let config_path = Settings::config_path(project_dir);
    if config_path.exists() && !force {
        println!(
            "{} {} already exists (use --force to overwrite)",
            style("•").dim(),
            config_path.display()
        );
    } else {
        Settings::default().save(&config_path)?;
        println!("{} Wrote {}", style("✓").green(), config_path.display());
    }

    let settings = Settings::load_or_default(project_dir)?;
    let db_path = settings.db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    DeployDb::new(&db_path)?;
    println!("{} Database ready at {}", style("✓").green(), db_path.display());

    println!();
    println!("Initialized daveops project");
    println!(
        "Set {} and {} (or put them in .env) before deploying.",
        style("GITHUB_TOKEN").bold(),
        style("DAVEOPS_ADMIN_TOKEN").bold()
    );
    Ok(())
}
