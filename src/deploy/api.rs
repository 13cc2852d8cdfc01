use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tokio::sync::broadcast;

use super::models::{CompletionReport, TriggerResponse};
use super::trigger::Deployer;
use super::ws::{WsMessage, broadcast_message};
use crate::errors::DeployError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub deployer: Deployer,
    pub ws_tx: broadcast::Sender<String>,
    /// When set, `/api/*` and `/functions/*` require `Authorization: Bearer <token>`.
    pub admin_token: Option<String>,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub deployment_id: Option<String>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<DeployError> for ApiError {
    fn from(err: DeployError) -> Self {
        let msg = err.to_string();
        match err {
            DeployError::MissingDeploymentId => ApiError::BadRequest(msg),
            DeployError::NotFound { .. } => ApiError::NotFound(msg),
            DeployError::InvalidTransition { .. } | DeployError::AlreadyInFlight => {
                ApiError::Conflict(msg)
            }
            DeployError::TokenNotConfigured
            | DeployError::Dispatch(_)
            | DeployError::Database(_) => ApiError::Internal(msg),
        }
    }
}

// ── Admin check ───────────────────────────────────────────────────────

/// Extractor that rejects requests without the configured admin bearer token.
pub struct AdminAuth;

impl FromRequestParts<SharedState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_deref() else {
            return Ok(AdminAuth);
        };
        let provided = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match provided {
            Some(token) if token == expected => Ok(AdminAuth),
            _ => Err(ApiError::Unauthorized(
                "Missing or invalid admin token".to_string(),
            )),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route(
            "/api/deployments",
            get(list_deployments).post(create_deployment),
        )
        .route(
            "/api/deployments/{id}",
            get(get_deployment).delete(delete_deployment),
        )
        .route("/api/deployments/{id}/complete", post(complete_deployment))
        .route("/functions/trigger-deployment", post(trigger_deployment))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_deployments(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let deployments = state
        .deployer
        .db()
        .call(move |db| db.list_deployments(params.limit))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(deployments))
}

async fn get_deployment(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lookup = id.clone();
    let deployment = state
        .deployer
        .db()
        .call(move |db| db.get_deployment(&lookup))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    match deployment {
        Some(deployment) => Ok(Json(deployment)),
        None => Err(ApiError::NotFound(format!("Deployment {} not found", id))),
    }
}

/// The admin "Deploy now" button.
async fn create_deployment(
    _auth: AdminAuth,
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let deployment = state.deployer.request_deployment().await?;
    Ok((StatusCode::CREATED, Json(deployment)))
}

async fn delete_deployment(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let target = id.clone();
    let deleted = state
        .deployer
        .db()
        .call(move |db| db.delete_deployment(&target))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if deleted {
        broadcast_message(
            &state.ws_tx,
            &WsMessage::DeploymentDeleted { deployment_id: id },
        );
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Deployment {} not found", id)))
    }
}

async fn complete_deployment(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(report): Json<CompletionReport>,
) -> Result<impl IntoResponse, ApiError> {
    let deployment = state.deployer.complete(&id, report).await?;
    Ok(Json(deployment))
}

/// Server-side trigger function: approve, dispatch, reconcile.
async fn trigger_deployment(
    _auth: AdminAuth,
    State(state): State<SharedState>,
    Json(req): Json<TriggerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = req.deployment_id.unwrap_or_default();
    state.deployer.trigger(&id).await?;
    Ok(Json(TriggerResponse::triggered()))
}
