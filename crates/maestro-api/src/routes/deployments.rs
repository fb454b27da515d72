//! `/deployments`, `/in-progress`, `/paused`, `/awaiting-pause`.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use maestro_core::deployment::{Deployment, DeploymentKey, Status};
use maestro_core::id::ResourceId;
use maestro_core::store::{DeploymentQuery, DeploymentStore, TaskStore};
use maestro_core::task::Task;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/deployments", get(query_deployments))
        .route("/deployments/{id}", get(get_deployment))
        .route("/deployments/{id}/tasks", get(get_tasks))
        .route("/deployments/{id}/logs", get(get_logs))
        .route("/in-progress", get(in_progress))
        .route("/paused", get(paused))
        .route("/awaiting-pause", get(awaiting_pause))
}

#[derive(Debug, Deserialize)]
struct DeploymentQueryParams {
    application: Option<String>,
    environment: Option<String>,
    region: Option<String>,
    status: Option<String>,
    from: Option<String>,
    size: Option<u32>,
    #[serde(rename = "start-from")]
    start_from: Option<u32>,
    #[serde(rename = "start-to")]
    start_to: Option<u32>,
    #[allow(dead_code)]
    full: Option<bool>,
}

fn parse_status(raw: &str) -> Result<Status, ApiError> {
    match raw {
        "running" => Ok(Status::Running),
        "completed" => Ok(Status::Completed),
        "failed" => Ok(Status::Failed),
        "terminated" => Ok(Status::Terminated),
        "paused" => Ok(Status::Paused),
        other => Err(ApiError::BadRequest(format!("invalid status '{other}'"))),
    }
}

async fn query_deployments(
    State(state): State<AppState>,
    Query(params): Query<DeploymentQueryParams>,
) -> Result<Json<Vec<Deployment>>, ApiError> {
    let status = params.status.as_deref().map(parse_status).transpose()?;
    let from = params
        .from
        .as_deref()
        .map(|raw| raw.parse::<DateTime<Utc>>().map_err(|e| ApiError::BadRequest(format!("invalid 'from': {e}"))))
        .transpose()?;

    let query = DeploymentQuery {
        application: params.application,
        environment: params.environment,
        region: params.region,
        status,
        from,
        size: params.size,
        start_from: params.start_from,
        start_to: params.start_to,
    };

    let deployments = state.store.query_deployments(query).await?;
    Ok(Json(deployments))
}

async fn get_deployment(State(state): State<AppState>, Path(id): Path<ResourceId>) -> Result<Json<Deployment>, ApiError> {
    Ok(Json(state.store.get_deployment(id).await?))
}

async fn get_tasks(State(state): State<AppState>, Path(id): Path<ResourceId>) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.store.get_tasks(id).await?))
}

#[derive(Debug, Deserialize)]
struct LogQueryParams {
    since: Option<DateTime<Utc>>,
}

async fn get_logs(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    Query(params): Query<LogQueryParams>,
) -> Result<Json<Value>, ApiError> {
    let logs = state.store.get_logs(id, params.since).await?;
    Ok(Json(json!(logs)))
}

async fn in_progress(State(state): State<AppState>) -> Result<Json<Vec<DeploymentKey>>, ApiError> {
    Ok(Json(state.control_plane.list_in_progress().await?))
}

async fn paused(State(state): State<AppState>) -> Result<Json<Vec<DeploymentKey>>, ApiError> {
    Ok(Json(state.control_plane.list_paused().await?))
}

/// Deployments currently running with a `pause-after-*-healthy` flag set but
/// not yet paused — the window between "requested a pause" and "the
/// executor actually hit the gate".
async fn awaiting_pause(State(state): State<AppState>) -> Result<Json<Vec<Deployment>>, ApiError> {
    let paused_keys = state.control_plane.list_paused().await?;
    let mut out = Vec::new();

    for key in state.control_plane.list_in_progress().await? {
        if paused_keys.contains(&key) {
            continue;
        }
        let Some(deployment) = state.store.last_deployment_for(&key.application, &key.environment, &key.region).await? else {
            continue;
        };
        if deployment.status != Status::Running {
            continue;
        }
        let requests_pause = deployment
            .new_state
            .deployment_params
            .get("pause-after-instances-healthy")
            .or_else(|| deployment.new_state.deployment_params.get("pause-after-load-balancers-healthy"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if requests_pause {
            out.push(deployment);
        }
    }

    Ok(Json(out))
}
