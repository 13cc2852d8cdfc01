//! Configuration for daveops, read from `.daveops/daveops.toml`.
//!
//! Layering is defaults → file → environment → CLI flags. Secrets are
//! never read from the file.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3141
//! db_path = ".daveops/daveops.db"
//! allow_any_origin = false
//!
//! [github]
//! repository = "dmaru09sub/dave-ops"
//! event_type = "deploy-portfolio"
//! api_base = "https://api.github.com"
//!
//! [site]
//! deployment_url = "https://dmaru09sub.github.io/dave-ops-portfolio"
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! dir = ".daveops/logs"
//! ```
//!
//! # Environment
//!
//! | Variable                    | Effect                                  |
//! |-----------------------------|-----------------------------------------|
//! | `GITHUB_TOKEN`              | Token used for `repository_dispatch`    |
//! | `DAVEOPS_ADMIN_TOKEN`       | Bearer token required on admin routes   |
//! | `DAVEOPS_GITHUB_REPOSITORY` | Overrides `github.repository`           |
//! | `DAVEOPS_SITE_URL`          | Overrides `site.deployment_url`         |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::deploy::github;

pub const DAVEOPS_DIR: &str = ".daveops";
pub const CONFIG_FILE: &str = "daveops.toml";

pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_ADMIN_TOKEN: &str = "DAVEOPS_ADMIN_TOKEN";
pub const ENV_REPOSITORY: &str = "DAVEOPS_GITHUB_REPOSITORY";
pub const ENV_SITE_URL: &str = "DAVEOPS_SITE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Relative paths resolve against the project directory.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Send `Access-Control-Allow-Origin: *` on every response.
    #[serde(default)]
    pub allow_any_origin: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3141
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DAVEOPS_DIR).join("daveops.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            allow_any_origin: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSection {
    /// Source repository whose workflow builds the site, as `owner/repo` or URL.
    #[serde(default = "default_repository")]
    pub repository: String,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_repository() -> String {
    "dmaru09sub/dave-ops".to_string()
}

fn default_event_type() -> String {
    "deploy-portfolio".to_string()
}

fn default_api_base() -> String {
    github::GITHUB_API_BASE.to_string()
}

impl Default for GitHubSection {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            event_type: default_event_type(),
            api_base: default_api_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSection {
    /// Public URL written onto deployments once the workflow is triggered.
    #[serde(default = "default_deployment_url")]
    pub deployment_url: String,
}

fn default_deployment_url() -> String {
    "https://dmaru09sub.github.io/dave-ops-portfolio".to_string()
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            deployment_url: default_deployment_url(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Also write daily-rolling log files here.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub github: GitHubSection,
    #[serde(default)]
    pub site: SiteSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(skip)]
    base_dir: PathBuf,
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse daveops.toml")
    }

    /// Load `<project_dir>/.daveops/daveops.toml`, or defaults if it does not exist.
    pub fn load_or_default(project_dir: &Path) -> Result<Self> {
        let path = Self::config_path(project_dir);
        let mut settings = if path.exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        settings.base_dir = project_dir.to_path_buf();
        Ok(settings)
    }

    pub fn config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(DAVEOPS_DIR).join(CONFIG_FILE)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize daveops.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Database path, resolved against the project directory.
    pub fn db_path(&self) -> PathBuf {
        self.resolve(&self.server.db_path)
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.logging.dir.as_deref().map(|d| self.resolve(d))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn github_token(&self) -> Option<String> {
        env_non_empty(ENV_GITHUB_TOKEN)
    }

    pub fn admin_token(&self) -> Option<String> {
        env_non_empty(ENV_ADMIN_TOKEN)
    }

    /// The repository reference, with the environment override applied.
    pub fn repository(&self) -> String {
        env_non_empty(ENV_REPOSITORY).unwrap_or_else(|| self.github.repository.clone())
    }

    /// Normalized `owner/repo` for the dispatch URL.
    pub fn owner_repo(&self) -> Result<String> {
        let repository = self.repository();
        github::parse_owner_repo(&repository).with_context(|| {
            format!(
                "Invalid github.repository '{}': expected owner/repo or a github.com URL",
                repository
            )
        })
    }

    pub fn site_url(&self) -> String {
        env_non_empty(ENV_SITE_URL).unwrap_or_else(|| self.site.deployment_url.clone())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = self.owner_repo() {
            warnings.push(e.to_string());
        }
        if self.github.event_type.trim().is_empty() {
            warnings.push("github.event_type is empty".to_string());
        }
        let site = self.site_url();
        if !site.starts_with("https://") && !site.starts_with("http://") {
            warnings.push(format!("site.deployment_url '{}' is not an http(s) URL", site));
        }
        match self.github_token() {
            None => warnings.push(format!(
                "{} is not set; deployments will fail until it is",
                ENV_GITHUB_TOKEN
            )),
            Some(token) if !github::is_valid_github_token(&token) => warnings.push(format!(
                "{} does not look like a GitHub token (unrecognized prefix)",
                ENV_GITHUB_TOKEN
            )),
            Some(_) => {}
        }
        if self.admin_token().is_none() {
            warnings.push(format!(
                "{} is not set; admin routes accept unauthenticated requests",
                ENV_ADMIN_TOKEN
            ));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            warnings.push(format!(
                "logging.level '{}' is not one of trace, debug, info, warn, error",
                self.logging.level
            ));
        }

        warnings
    }
}
