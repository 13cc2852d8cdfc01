//! Deployment orchestration: approve, dispatch, reconcile.
//!
//! `trigger` is the server-side function the admin client calls with an
//! existing deployment id. `request_deployment` is the admin "Deploy now"
//! button: it creates the pending row, calls `trigger`, and records any
//! failure on the row. Neither waits for CI; the terminal outcome arrives
//! later through `complete`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::db::DbHandle;
use super::models::*;
use super::ws::{WsMessage, broadcast_message};
use crate::errors::{DeployError, DispatchError, StoreError};

/// Starts the out-of-band build for a deployment.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, deployment_id: &str) -> Result<(), DispatchError>;

    /// Human-readable target, for logs and the CLI.
    fn describe(&self) -> String;
}

/// Clears the in-flight flag when dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Deployer {
    db: DbHandle,
    dispatcher: Arc<dyn Dispatcher>,
    github_token: Option<String>,
    site_url: String,
    in_flight: AtomicBool,
    events: Option<broadcast::Sender<String>>,
}

impl Deployer {
    pub fn new(
        db: DbHandle,
        dispatcher: Arc<dyn Dispatcher>,
        github_token: Option<String>,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            dispatcher,
            github_token: github_token.filter(|t| !t.trim().is_empty()),
            site_url: site_url.into(),
            in_flight: AtomicBool::new(false),
            events: None,
        }
    }

    /// Broadcast row changes on `tx` as they happen.
    pub fn with_events(mut self, tx: broadcast::Sender<String>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn db(&self) -> &DbHandle {
        &self.db
    }

    pub fn target(&self) -> String {
        self.dispatcher.describe()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn publish(&self, msg: WsMessage) {
        if let Some(tx) = &self.events {
            broadcast_message(tx, &msg);
        }
    }

    /// Best-effort failure write; an error here is only logged.
    async fn record_failure(&self, id: &str, detail: FailureDetail) {
        let owned_id = id.to_string();
        let result = self
            .db
            .call(move |db| db.mark_failed(&owned_id, &detail))
            .await
            .map_err(DeployError::from_db);
        match result {
            Ok(deployment) => self.publish(WsMessage::DeploymentUpdated { deployment }),
            Err(DeployError::InvalidTransition { from, .. }) => {
                tracing::warn!(deployment_id = id, status = %from, "Deployment already finished; failure not recorded")
            }
            Err(e) => {
                tracing::error!(deployment_id = id, error = %e, "Failed to record deployment failure")
            }
        }
    }

    /// Re-read a row, falling back to `last_known` if the read fails.
    async fn reload(&self, id: &str, last_known: Deployment) -> Deployment {
        let owned_id = id.to_string();
        match self.db.call(move |db| db.get_deployment(&owned_id)).await {
            Ok(Some(row)) => row,
            _ => last_known,
        }
    }

    /// Approve the deployment, dispatch the CI workflow, and mark it deploying.
    pub async fn trigger(&self, deployment_id: &str) -> Result<Deployment, DeployError> {
        let id = deployment_id.trim().to_string();
        if id.is_empty() {
            return Err(DeployError::MissingDeploymentId);
        }

        let lookup_id = id.clone();
        let current = self
            .db
            .call(move |db| db.get_deployment(&lookup_id))
            .await
            .map_err(DeployError::Database)?
            .ok_or_else(|| DeployError::NotFound { id: id.clone() })?;

        if !current.status.can_transition_to(DeploymentStatus::Approved) {
            return Err(DeployError::InvalidTransition {
                id,
                from: current.status,
                to: DeploymentStatus::Approved,
            });
        }

        let Some(token) = self.github_token.as_deref() else {
            let err = DeployError::TokenNotConfigured;
            tracing::error!(deployment_id = %id, "GitHub token not configured");
            self.record_failure(&id, FailureDetail::Notes(format!("Function call failed: {}", err)))
                .await;
            return Err(err);
        };
        if !super::github::is_valid_github_token(token) {
            tracing::warn!(deployment_id = %id, "GitHub token has an unrecognized prefix");
        }

        // A concurrent trigger for the same row loses here and dispatches nothing.
        tracing::info!(deployment_id = %id, "Updating deployment status to approved");
        let approve_id = id.clone();
        let approved = self
            .db
            .call(move |db| db.mark_approved(&approve_id))
            .await
            .map_err(DeployError::from_db)?;
        self.publish(WsMessage::DeploymentUpdated {
            deployment: approved.clone(),
        });

        tracing::info!(deployment_id = %id, target = %self.dispatcher.describe(), "Triggering deploy workflow");
        if let Err(err) = self.dispatcher.dispatch(&id).await {
            tracing::error!(deployment_id = %id, error = %err, "Dispatch failed");
            self.record_failure(&id, FailureDetail::Notes(err.failure_notes()))
                .await;
            return Err(err.into());
        }

        let deploying_id = id.clone();
        let site_url = self.site_url.clone();
        let result = self
            .db
            .call(move |db| db.mark_deploying(&deploying_id, &site_url))
            .await
            .map_err(DeployError::from_db);
        match result {
            Ok(deployment) => {
                tracing::info!(deployment_id = %id, "Deploy workflow triggered");
                self.publish(WsMessage::DeploymentUpdated {
                    deployment: deployment.clone(),
                });
                Ok(deployment)
            }
            Err(DeployError::InvalidTransition { from, .. }) => {
                // The completion report arrived first; keep what it wrote.
                tracing::info!(deployment_id = %id, status = %from, "Deployment completed before it was marked deploying");
                Ok(self.reload(&id, approved).await)
            }
            Err(e) => {
                // The workflow is already running; report success with the approved row.
                tracing::error!(deployment_id = %id, error = %e, "Failed to mark deployment as deploying");
                Ok(approved)
            }
        }
    }

    /// Create a pending deployment and trigger it. At most one request runs at a time.
    pub async fn request_deployment(&self) -> Result<Deployment, DeployError> {
        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or(DeployError::AlreadyInFlight)?;

        tracing::info!("Creating deployment record");
        let created = self
            .db
            .call(|db| db.create_deployment(Some(ADMIN_PANEL_NOTES)))
            .await
            .map_err(DeployError::Database)?;
        self.publish(WsMessage::DeploymentCreated {
            deployment: created.clone(),
        });

        match self.trigger(&created.id).await {
            Ok(deployment) => Ok(deployment),
            Err(err) => {
                tracing::error!(deployment_id = %created.id, error = %err, "Error triggering deployment");
                self.record_failure(&created.id, FailureDetail::ErrorMessage(err.to_string()))
                    .await;
                Err(err)
            }
        }
    }

    /// Apply the terminal outcome reported by the CI workflow.
    pub async fn complete(
        &self,
        deployment_id: &str,
        report: CompletionReport,
    ) -> Result<Deployment, DeployError> {
        let id = deployment_id.to_string();
        let next = match report.status {
            CompletionStatus::Deployed => DeploymentStatus::Deployed,
            CompletionStatus::Failed => DeploymentStatus::Failed,
        };

        // Status check and write share one lock.
        let update_id = id.clone();
        let deployment = self
            .db
            .call(move |db| {
                let current = db
                    .get_deployment(&update_id)?
                    .ok_or_else(|| StoreError::NotFound {
                        id: update_id.clone(),
                    })?;
                if !current.status.is_in_flight() {
                    return Err(StoreError::Conflict {
                        id: update_id,
                        current: current.status,
                        wanted: next,
                    }
                    .into());
                }
                match report.status {
                    CompletionStatus::Deployed => db.mark_deployed(
                        &update_id,
                        report.commit_hash.as_deref(),
                        report.deployment_url.as_deref(),
                    ),
                    CompletionStatus::Failed => db.mark_failed(
                        &update_id,
                        &FailureDetail::ErrorMessage(
                            report
                                .error_message
                                .unwrap_or_else(|| "Deploy workflow failed".to_string()),
                        ),
                    ),
                }
            })
            .await
            .map_err(DeployError::from_db)?;

        tracing::info!(deployment_id = %id, status = %deployment.status, "Deployment completed");
        self.publish(WsMessage::DeploymentUpdated {
            deployment: deployment.clone(),
        });
        Ok(deployment)
    }
}
