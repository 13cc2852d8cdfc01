//! Integration tests for the daveops CLI
//!
//! These run the built binary against a throwaway project directory.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a daveops Command with no secrets leaking in from the host
fn daveops() -> Command {
    let mut cmd = cargo_bin_cmd!("daveops");
    cmd.env_remove("GITHUB_TOKEN")
        .env_remove("DAVEOPS_ADMIN_TOKEN")
        .env_remove("DAVEOPS_GITHUB_REPOSITORY")
        .env_remove("DAVEOPS_SITE_URL")
        .env("RUST_LOG", "off");
    cmd
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Helper to initialize a daveops project in a temp directory
fn init_project(dir: &TempDir) {
    daveops()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_daveops_help() {
        daveops()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("deploy"));
    }

    #[test]
    fn test_daveops_version() {
        daveops().arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_structure() {
        let dir = create_temp_project();

        daveops()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized daveops project"));

        assert!(dir.path().join(".daveops").is_dir());
        assert!(dir.path().join(".daveops/daveops.toml").is_file());
        assert!(dir.path().join(".daveops/daveops.db").is_file());
    }

    #[test]
    fn test_init_keeps_existing_config_without_force() {
        let dir = create_temp_project();
        init_project(&dir);

        let config = dir.path().join(".daveops/daveops.toml");
        fs::write(&config, "[github]\nevent_type = \"custom-event\"\n").unwrap();

        daveops()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        let content = fs::read_to_string(&config).unwrap();
        assert!(content.contains("custom-event"));
    }

    #[test]
    fn test_project_dir_flag() {
        let dir = create_temp_project();

        daveops()
            .arg("--project-dir")
            .arg(dir.path())
            .arg("init")
            .assert()
            .success();

        assert!(dir.path().join(".daveops/daveops.toml").exists());
    }
}

// =============================================================================
// Deployment History
// =============================================================================

mod history {
    use super::*;

    #[test]
    fn test_history_empty() {
        let dir = create_temp_project();
        init_project(&dir);

        daveops()
            .current_dir(dir.path())
            .arg("history")
            .assert()
            .success()
            .stdout(predicate::str::contains("No deployments yet"));
    }

    #[test]
    fn test_show_missing_deployment_fails() {
        let dir = create_temp_project();
        init_project(&dir);

        daveops()
            .current_dir(dir.path())
            .args(["show", "missing"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Deployment missing not found"));
    }

    #[test]
    fn test_trigger_unknown_deployment_fails() {
        let dir = create_temp_project();
        init_project(&dir);

        daveops()
            .current_dir(dir.path())
            .args(["trigger", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));
    }
}

// =============================================================================
// Deploy Without Credentials
// =============================================================================

mod deploy {
    use super::*;

    #[test]
    fn test_deploy_help_mentions_server_guard() {
        daveops()
            .args(["deploy", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("daveops serve"))
            .stdout(predicate::str::contains("POST /api/deployments"));
    }

    #[test]
    fn test_deploy_without_token_records_failure() {
        let dir = create_temp_project();
        init_project(&dir);

        daveops()
            .current_dir(dir.path())
            .args(["deploy", "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("GitHub token not configured"));

        daveops()
            .current_dir(dir.path())
            .arg("history")
            .assert()
            .success()
            .stdout(predicate::str::contains("failed"))
            .stdout(predicate::str::contains("GitHub token not configured"));
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();

        daveops()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using default configuration"))
            .stdout(predicate::str::contains("dmaru09sub/dave-ops"))
            .stdout(predicate::str::contains("GITHUB_TOKEN not set"));
    }

    #[test]
    fn test_config_show_never_prints_token() {
        let dir = create_temp_project();

        daveops()
            .current_dir(dir.path())
            .env("GITHUB_TOKEN", "ghp_supersecretvalue")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("GITHUB_TOKEN set"))
            .stdout(predicate::str::contains("supersecret").not());
    }

    #[test]
    fn test_config_validate_warns_about_missing_token() {
        let dir = create_temp_project();

        daveops()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("GITHUB_TOKEN is not set"));
    }

    #[test]
    fn test_config_init_writes_file() {
        let dir = create_temp_project();

        daveops()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created"));

        let content = fs::read_to_string(dir.path().join(".daveops/daveops.toml")).unwrap();
        assert!(content.contains("deploy-portfolio"));
    }

    #[test]
    fn test_invalid_config_fails() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".daveops")).unwrap();
        fs::write(
            dir.path().join(".daveops/daveops.toml"),
            "[server]\nport = \"not a number\"\n",
        )
        .unwrap();

        daveops()
            .current_dir(dir.path())
            .arg("history")
            .assert()
            .failure();
    }
}
