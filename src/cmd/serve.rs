//! Admin API server command — `daveops serve`.

use anyhow::Result;
use std::path::PathBuf;

use daveops::config::Settings;
use daveops::deploy::server::{ServerConfig, start_server};

pub async fn cmd_serve(
    settings: &Settings,
    port: Option<u16>,
    db_path: Option<PathBuf>,
    dev: bool,
) -> Result<()> {
    let mut config = ServerConfig::from_settings(settings);
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(db_path) = db_path {
        config.db_path = db_path;
    }
    config.dev_mode = dev;

    start_server(config, settings).await
}
