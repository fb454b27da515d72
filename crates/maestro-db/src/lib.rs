//! Postgres-backed store adapter for Maestro.
//!
//! [`PgStore`] implements both `maestro_core::store::DeploymentStore` and
//! `maestro_core::store::TaskStore` over the same connection pool, plus the
//! CAS-backed lock/in-progress/pause registries the control plane uses.

pub mod application_store;
pub mod deployment_store;
pub mod error;
pub mod registry;
pub mod task_store;

pub use error::{DbError, DbResult};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Postgres-backed implementation of the core store ports.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
