//! CLI command implementations. Each command opens its own connection pool
//! and talks to the control plane directly — there is no HTTP client layer
//! here, since the CLI is meant to run alongside or in place of the API
//! server, not as a remote caller of it.

pub mod control;
pub mod deployments;

use std::sync::Arc;

use anyhow::Result;
use maestro_config::SystemConfig;
use maestro_db::{create_pool, PgStore};
use maestro_scheduler::{ControlPlane, WorkQueue};

/// Open a database pool and build the control plane the rest of the CLI's
/// commands operate against.
pub async fn connect(config: &SystemConfig) -> Result<Arc<ControlPlane>> {
    let pool = create_pool(&config.database_url).await?;
    let store = Arc::new(PgStore::new(pool.clone()));
    let queue = Arc::new(WorkQueue::new(pool));
    Ok(Arc::new(ControlPlane::new(store, queue)))
}
