use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::models::*;
use crate::errors::StoreError;

/// Async-safe handle to the deployment database.
///
/// Wraps `DeployDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O
/// never ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<DeployDb>>,
}

impl DbHandle {
    pub fn new(db: DeployDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&DeployDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. Only for startup and tests.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, DeployDb>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))
    }
}

const DEPLOYMENT_COLUMNS: &str = "id, status, created_at, approved_at, deployed_at, \
     deployment_url, commit_hash, notes, error_message";

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_deployment(row: &Row<'_>) -> rusqlite::Result<Deployment> {
    let status: String = row.get(1)?;
    let status = DeploymentStatus::from_str(&status).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })?;
    Ok(Deployment {
        id: row.get(0)?,
        status,
        created_at: row.get(2)?,
        approved_at: row.get(3)?,
        deployed_at: row.get(4)?,
        deployment_url: row.get(5)?,
        commit_hash: row.get(6)?,
        notes: row.get(7)?,
        error_message: row.get(8)?,
    })
}

pub struct DeployDb {
    conn: Connection,
}

impl DeployDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS deployments (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    id TEXT NOT NULL UNIQUE,
                    status TEXT NOT NULL DEFAULT 'pending',
                    created_at TEXT NOT NULL,
                    approved_at TEXT,
                    deployed_at TEXT,
                    deployment_url TEXT,
                    commit_hash TEXT,
                    notes TEXT,
                    error_message TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_deployments_created ON deployments(created_at);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Deployment CRUD ───────────────────────────────────────────────

    pub fn create_deployment(&self, notes: Option<&str>) -> Result<Deployment> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO deployments (id, status, created_at, notes) VALUES (?1, ?2, ?3, ?4)",
                params![id, DeploymentStatus::Pending.as_str(), now(), notes],
            )
            .context("Failed to insert deployment")?;
        self.get_deployment(&id)?
            .context("Deployment not found after insert")
    }

    pub fn get_deployment(&self, id: &str) -> Result<Option<Deployment>> {
        let sql = format!("SELECT {} FROM deployments WHERE id = ?1", DEPLOYMENT_COLUMNS);
        self.conn
            .query_row(&sql, params![id], row_to_deployment)
            .optional()
            .context("Failed to query deployment")
    }

    /// Newest first. Rows created within the same microsecond keep insertion order.
    pub fn list_deployments(&self, limit: Option<u32>) -> Result<Vec<Deployment>> {
        let sql = format!(
            "SELECT {} FROM deployments ORDER BY created_at DESC, seq DESC LIMIT ?1",
            DEPLOYMENT_COLUMNS
        );
        let limit = limit.map(i64::from).unwrap_or(-1);
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_deployments")?;
        let rows = stmt
            .query_map(params![limit], row_to_deployment)
            .context("Failed to query deployments")?;
        let mut deployments = Vec::new();
        for row in rows {
            deployments.push(row.context("Failed to read deployment row")?);
        }
        Ok(deployments)
    }

    pub fn mark_approved(&self, id: &str) -> Result<Deployment> {
        self.transition(
            id,
            DeploymentStatus::Approved,
            "approved_at = ?2",
            params![DeploymentStatus::Approved.as_str(), now(), id],
        )
    }

    /// Only an `approved` row moves here; a row the workflow already
    /// completed is left alone.
    pub fn mark_deploying(&self, id: &str, deployment_url: &str) -> Result<Deployment> {
        self.transition(
            id,
            DeploymentStatus::Deploying,
            "deployment_url = ?2",
            params![DeploymentStatus::Deploying.as_str(), deployment_url, id],
        )
    }

    pub fn mark_failed(&self, id: &str, detail: &FailureDetail) -> Result<Deployment> {
        let status = DeploymentStatus::Failed;
        match detail {
            FailureDetail::Notes(notes) => self.transition(
                id,
                status,
                "notes = ?2",
                params![status.as_str(), notes, id],
            ),
            FailureDetail::ErrorMessage(message) => self.transition(
                id,
                status,
                "error_message = ?2",
                params![status.as_str(), message, id],
            ),
        }
    }

    /// Record a successful CI run. A `None` url keeps whatever the trigger wrote.
    pub fn mark_deployed(
        &self,
        id: &str,
        commit_hash: Option<&str>,
        deployment_url: Option<&str>,
    ) -> Result<Deployment> {
        self.transition(
            id,
            DeploymentStatus::Deployed,
            "deployed_at = ?2, commit_hash = ?3, deployment_url = COALESCE(?4, deployment_url)",
            params![
                DeploymentStatus::Deployed.as_str(),
                now(),
                commit_hash,
                deployment_url,
                id
            ],
        )
    }

    pub fn delete_deployment(&self, id: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM deployments WHERE id = ?1", params![id])
            .context("Failed to delete deployment")?;
        Ok(changed > 0)
    }

    /// Compare-and-set status write.
    ///
    /// `status = ?1`, `sets` uses `?2..`, and the id is always the last
    /// parameter. The row only changes if its current status may move to
    /// `to`; otherwise the result is a `StoreError`.
    fn transition(
        &self,
        id: &str,
        to: DeploymentStatus,
        sets: &str,
        params: impl rusqlite::Params,
    ) -> Result<Deployment> {
        let sources = DeploymentStatus::sources_of(to)
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let id_param = sets.matches('?').count() + 2;
        let sql = format!(
            "UPDATE deployments SET status = ?1, {} WHERE id = ?{} AND status IN ({})",
            sets, id_param, sources
        );
        let changed = self
            .conn
            .execute(&sql, params)
            .context("Failed to update deployment")?;
        if changed == 0 {
            let err = match self.get_deployment(id)? {
                None => StoreError::NotFound { id: id.to_string() },
                Some(current) => StoreError::Conflict {
                    id: id.to_string(),
                    current: current.status,
                    wanted: to,
                },
            };
            return Err(err.into());
        }
        self.get_deployment(id)?
            .context("Deployment not found after update")
    }
}
