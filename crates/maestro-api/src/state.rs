//! Shared application state.

use std::sync::Arc;

use maestro_config::SystemConfig;
use maestro_db::PgStore;
use maestro_scheduler::ControlPlane;
use sqlx::PgPool;

/// State shared across every route handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub store: Arc<PgStore>,
    pub control_plane: Arc<ControlPlane>,
    pub config: Arc<SystemConfig>,
}

impl AppState {
    pub fn new(pool: PgPool, store: Arc<PgStore>, control_plane: Arc<ControlPlane>, config: Arc<SystemConfig>) -> Self {
        Self { pool, store, control_plane, config }
    }
}
