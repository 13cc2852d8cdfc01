//! Typed errors for the deployment subsystem.
//!
//! - `DispatchError` — the outbound CI trigger call failed
//! - `StoreError` — a guarded status write matched no row
//! - `DeployError` — a trigger or admin deploy request failed

use thiserror::Error;

use crate::deploy::models::DeploymentStatus;

/// Errors from the GitHub `repository_dispatch` call.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// GitHub answered with a non-success status.
    #[error("GitHub API error: {status} {message}")]
    Rejected {
        status: u16,
        /// The `message` field of GitHub's JSON error body, or the raw body.
        message: String,
        /// Raw response body as received.
        body: String,
    },

    /// The request never produced a response.
    #[error("GitHub request failed: {0}")]
    Transport(String),
}

impl DispatchError {
    /// Build a `Rejected` error from a status code and response body.
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| body.clone());
        Self::Rejected {
            status,
            message,
            body,
        }
    }

    /// Text written to the deployment row's notes when the dispatch fails.
    pub fn failure_notes(&self) -> String {
        match self {
            Self::Rejected { status, body, .. } => {
                format!("Function call failed: {} {}", status, body)
            }
            Self::Transport(msg) => format!("Function call failed: {}", msg),
        }
    }
}

/// Why a status write in the store changed nothing.
///
/// Status writes only apply while the row's current status may move to the new one.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Deployment {id} not found")]
    NotFound { id: String },

    #[error("Deployment {id} is {current}; cannot move to {wanted}")]
    Conflict {
        id: String,
        current: DeploymentStatus,
        wanted: DeploymentStatus,
    },
}

/// Errors from triggering or requesting a deployment.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("deployment_id is required")]
    MissingDeploymentId,

    #[error("Deployment {id} not found")]
    NotFound { id: String },

    #[error("GitHub token not configured")]
    TokenNotConfigured,

    #[error("Deployment {id} is {from}; cannot move to {to}")]
    InvalidTransition {
        id: String,
        from: DeploymentStatus,
        to: DeploymentStatus,
    },

    #[error("A deployment request is already in flight")]
    AlreadyInFlight,

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),
}

impl DeployError {
    /// Lift typed store failures out of an `anyhow` chain.
    pub fn from_db(err: anyhow::Error) -> Self {
        match err.downcast_ref::<StoreError>() {
            Some(StoreError::NotFound { id }) => Self::NotFound { id: id.clone() },
            Some(StoreError::Conflict {
                id,
                current,
                wanted,
            }) => Self::InvalidTransition {
                id: id.clone(),
                from: *current,
                to: *wanted,
            },
            None => Self::Database(err),
        }
    }
}
