//! Deployment commands — `daveops deploy`, `trigger`, `history`, `show`.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use daveops::config::Settings;
use daveops::deploy::db::DeployDb;
use daveops::deploy::models::{Deployment, DeploymentStatus};
use daveops::deploy::server::build_state;

fn open_db(settings: &Settings) -> Result<DeployDb> {
    let path = settings.db_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    DeployDb::new(&path)
}

fn spinner(msg: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .expect("progress bar template is a valid static string"),
    );
    bar.set_message(msg.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// `MMM d, yyyy HH:mm` in UTC, or the raw value if it does not parse.
pub fn format_timestamp(ts: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(ts)
        .map(|dt| {
            dt.with_timezone(&chrono::Utc)
                .format("%b %-d, %Y %H:%M")
                .to_string()
        })
        .unwrap_or_else(|_| ts.to_string())
}

fn styled_status(status: DeploymentStatus) -> console::StyledObject<&'static str> {
    let s = style(status.as_str());
    match status {
        DeploymentStatus::Pending => s.dim(),
        DeploymentStatus::Approved => s.cyan(),
        DeploymentStatus::Deploying => s.yellow(),
        DeploymentStatus::Deployed => s.green(),
        DeploymentStatus::Failed => s.red(),
    }
}

fn print_deployment(d: &Deployment) {
    println!("{} {}", style("Deployment").bold(), d.id);
    println!("  status:     {}", styled_status(d.status));
    println!("  created:    {}", format_timestamp(&d.created_at));
    if let Some(ts) = &d.approved_at {
        println!("  approved:   {}", format_timestamp(ts));
    }
    if let Some(ts) = &d.deployed_at {
        println!("  deployed:   {}", format_timestamp(ts));
    }
    if let Some(url) = &d.deployment_url {
        println!("  url:        {}", url);
    }
    if let Some(hash) = &d.commit_hash {
        println!("  commit:     {}", hash);
    }
    if let Some(notes) = &d.notes {
        println!("  notes:      {}", notes);
    }
    if let Some(err) = &d.error_message {
        println!("  error:      {}", style(err).red());
    }
}

pub async fn cmd_deploy(settings: &Settings, yes: bool) -> Result<()> {
    let state = build_state(settings, &settings.db_path())?;
    let target = state.deployer.target();

    if !yes {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!("Trigger a deployment of {}?", target))
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirm {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let bar = spinner(&format!("Dispatching deploy workflow to {}", target));
    let result = state.deployer.request_deployment().await;
    bar.finish_and_clear();

    match result {
        Ok(deployment) => {
            println!(
                "{} Deployment started. Check GitHub Actions for progress.",
                style("✓").green()
            );
            print_deployment(&deployment);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(e).context("Failed to trigger portfolio deployment")),
    }
}

pub async fn cmd_trigger(settings: &Settings, deployment_id: &str) -> Result<()> {
    let state = build_state(settings, &settings.db_path())?;
    let bar = spinner(&format!("Triggering deployment {}", deployment_id));
    let result = state.deployer.trigger(deployment_id).await;
    bar.finish_and_clear();

    let deployment = result.map_err(|e| anyhow::anyhow!(e))?;
    println!("{} Deployment triggered successfully", style("✓").green());
    print_deployment(&deployment);
    Ok(())
}

pub fn cmd_history(settings: &Settings, limit: u32) -> Result<()> {
    let db = open_db(settings)?;
    let deployments = db.list_deployments(Some(limit))?;

    if deployments.is_empty() {
        println!("No deployments yet. Run `daveops deploy` to trigger the first one.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:<18}  {:<18}  {}",
        "ID", "STATUS", "CREATED", "DEPLOYED", "NOTES"
    );
    for d in &deployments {
        let deployed = d
            .deployed_at
            .as_deref()
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<36}  {:<10}  {:<18}  {:<18}  {}",
            d.id,
            // pad by visible width; escape codes would skew `{:<10}`
            styled_status(d.status).to_string()
                + &" ".repeat(10usize.saturating_sub(d.status.as_str().len())),
            format_timestamp(&d.created_at),
            deployed,
            d.summary().unwrap_or("-")
        );
    }
    Ok(())
}

pub fn cmd_show(settings: &Settings, id: &str) -> Result<()> {
    let db = open_db(settings)?;
    let deployment = db
        .get_deployment(id)?
        .with_context(|| format!("Deployment {} not found", id))?;
    print_deployment(&deployment);
    Ok(())
}
