//! API routes.

pub mod applications;
pub mod deployments;
pub mod health;
pub mod lock;

use axum::Router;

use crate::AppState;

/// Build the main API router. Flat, unversioned route tree rather than a
/// nested `/api/v1` hierarchy.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(lock::router())
        .merge(deployments::router())
        .merge(applications::router())
        .with_state(state)
}
