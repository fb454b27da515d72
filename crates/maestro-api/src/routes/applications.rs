//! `/applications`, `/environments`, and the per-(application, environment)
//! deploy/undo/rollback/pause/resume actions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use maestro_core::application::Application;
use maestro_core::deployment::DeploymentKey;
use maestro_core::id::ResourceId;
use maestro_core::store::ApplicationStore;
use maestro_scheduler::control_plane::{validate_application_name, BeginRequest};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/applications", get(list_applications))
        .route("/applications/{app}", get(get_application).put(upsert_application))
        .route("/applications/{app}/{env}/deploy", post(deploy))
        .route("/applications/{app}/{env}/undo", post(undo))
        .route("/applications/{app}/{env}/rollback", post(rollback))
        .route("/applications/{app}/{env}/pause", post(pause).delete(unpause))
        .route("/applications/{app}/{env}/resume", post(resume))
        .route("/environments", get(list_environments))
}

async fn list_applications(State(state): State<AppState>) -> Result<Json<Vec<Application>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

async fn get_application(State(state): State<AppState>, Path(app): Path<String>) -> Result<Json<Application>, ApiError> {
    state.store.get(&app).await?.map(Json).ok_or_else(|| ApiError::NotFound(format!("application '{app}'")))
}

#[derive(Debug, Deserialize)]
struct UpsertApplicationRequest {
    environments: Vec<String>,
    contact: Option<String>,
}

async fn upsert_application(
    State(state): State<AppState>,
    Path(app): Path<String>,
    Json(request): Json<UpsertApplicationRequest>,
) -> Result<StatusCode, ApiError> {
    validate_application_name(&app)?;
    state.store.upsert(&Application { name: app, environments: request.environments, contact: request.contact }).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_environments(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.store.list_environments().await?))
}

#[derive(Debug, Deserialize)]
struct DeployRequest {
    ami: String,
    hash: String,
    message: String,
    #[serde(default)]
    silent: bool,
    user: String,
    region: Option<String>,
}

#[derive(Debug, Serialize)]
struct IdResponse {
    id: ResourceId,
}

async fn deploy(
    State(state): State<AppState>,
    Path((app, env)): Path<(String, String)>,
    Json(request): Json<DeployRequest>,
) -> Result<Json<IdResponse>, ApiError> {
    let region = request.region.unwrap_or_else(|| state.config.default_region.clone());
    let id = state
        .control_plane
        .begin(BeginRequest {
            application: app,
            environment: env,
            region,
            user: request.user,
            message: request.message,
            image_id: request.ami,
            hash: request.hash,
            silent: request.silent,
        })
        .await?;
    Ok(Json(IdResponse { id }))
}

async fn undo(State(state): State<AppState>, Path((app, env)): Path<(String, String)>) -> Result<Json<IdResponse>, ApiError> {
    let id = state.control_plane.undo(&app, &env, &state.config.default_region).await?;
    Ok(Json(IdResponse { id }))
}

async fn rollback(State(state): State<AppState>, Path((app, env)): Path<(String, String)>) -> Result<Json<IdResponse>, ApiError> {
    let id = state.control_plane.rollback(&app, &env, &state.config.default_region).await?;
    Ok(Json(IdResponse { id }))
}

fn key_for(state: &AppState, app: String, env: String) -> DeploymentKey {
    DeploymentKey { application: app, environment: env, region: state.config.default_region.clone() }
}

async fn pause(State(state): State<AppState>, Path((app, env)): Path<(String, String)>) -> Result<StatusCode, ApiError> {
    let key = key_for(&state, app, env);
    if state.control_plane.register_pause(&key).await? {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::CONFLICT)
    }
}

async fn unpause(State(state): State<AppState>, Path((app, env)): Path<(String, String)>) -> Result<StatusCode, ApiError> {
    let key = key_for(&state, app, env);
    state.control_plane.unregister_pause(&key).await?;
    Ok(StatusCode::OK)
}

async fn resume(State(state): State<AppState>, Path((app, env)): Path<(String, String)>) -> Result<StatusCode, ApiError> {
    let key = key_for(&state, app, env);
    state.control_plane.resume(&key).await?;
    Ok(StatusCode::OK)
}
