//! `/lock`: the global deployment lock.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/lock", get(get_lock).post(set_lock).delete(clear_lock))
}

async fn get_lock(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    if state.control_plane.is_locked().await? {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

async fn set_lock(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.control_plane.lock().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_lock(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.control_plane.unlock().await?;
    Ok(StatusCode::NO_CONTENT)
}
