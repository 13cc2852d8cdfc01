use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use super::api::{self, AppState};
use super::db::{DbHandle, DeployDb};
use super::github::GitHubDispatcher;
use super::trigger::Deployer;
use super::ws;
use crate::config::Settings;

/// Configuration for the deploy server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    pub allow_any_origin: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3141,
            db_path: PathBuf::from(".daveops/daveops.db"),
            dev_mode: false,
            allow_any_origin: false,
        }
    }
}

impl ServerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            db_path: settings.db_path(),
            dev_mode: false,
            allow_any_origin: settings.server.allow_any_origin,
        }
    }

    fn bind_addr(&self) -> String {
        let host = if self.dev_mode { "0.0.0.0" } else { self.host.as_str() };
        format!("{}:{}", host, self.port)
    }
}

/// Build the full application router: API routes plus the event WebSocket.
pub fn build_router(state: Arc<AppState>) -> Router {
    let ws_tx = state.ws_tx.clone();

    api::api_router()
        .route(
            "/ws",
            get(move |ws_upgrade| ws::ws_handler_with_sender(ws_upgrade, ws_tx)),
        )
        .with_state(state)
}

/// Open the database and assemble the shared state from settings.
pub fn build_state(settings: &Settings, db_path: &std::path::Path) -> Result<Arc<AppState>> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let db = DeployDb::new(db_path).context("Failed to initialize deployment database")?;
    let (ws_tx, _rx) = broadcast::channel::<String>(256);

    let github_token = settings.github_token();
    let dispatcher = GitHubDispatcher::new(
        settings.github.api_base.clone(),
        settings.owner_repo()?,
        settings.github.event_type.clone(),
        github_token.clone().unwrap_or_default(),
    );
    let deployer = Deployer::new(
        DbHandle::new(db),
        Arc::new(dispatcher),
        github_token,
        settings.site_url(),
    )
    .with_events(ws_tx.clone());

    Ok(Arc::new(AppState {
        deployer,
        ws_tx,
        admin_token: settings.admin_token(),
    }))
}

/// Start the deploy server and run until Ctrl-C.
pub async fn start_server(config: ServerConfig, settings: &Settings) -> Result<()> {
    let state = build_state(settings, &config.db_path)?;
    if state.admin_token.is_none() {
        tracing::warn!("DAVEOPS_ADMIN_TOKEN is not set; admin routes are unauthenticated");
    }

    let mut app = build_router(state);
    if config.dev_mode || config.allow_any_origin {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, db = %config.db_path.display(), "daveops server listening");
    println!("daveops running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
