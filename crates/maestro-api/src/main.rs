//! Maestro API server: serves the HTTP surface and runs the
//! deployment workers in the same process.

use std::net::SocketAddr;
use std::sync::Arc;

use maestro_api::stub_collaborators::StubCollaborators;
use maestro_api::{routes, AppState};
use maestro_config::SystemConfig;
use maestro_core::collaborators::SystemClock;
use maestro_db::{create_pool, run_migrations, PgStore};
use maestro_executor::TaskExecutor;
use maestro_pipeline::PipelineRunner;
use maestro_scheduler::{Collaborators, ControlPlane, Worker, WorkQueue};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Number of worker tasks claiming messages off the work queue concurrently.
const WORKER_COUNT: usize = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(SystemConfig::from_env());

    info!("connecting to database...");
    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;
    info!("database connected and migrated");

    let store = Arc::new(PgStore::new(pool.clone()));
    let queue = Arc::new(WorkQueue::new(pool.clone()));
    let control_plane = Arc::new(ControlPlane::new(store.clone(), queue.clone()));

    let stub = Arc::new(StubCollaborators);
    let pipeline = Arc::new(PipelineRunner::default());
    let executor = Arc::new(TaskExecutor::new(
        stub.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(SystemClock),
        stub.clone(),
        &config,
    ));

    for n in 0..WORKER_COUNT {
        let worker = Worker::new(
            format!("worker-{n}"),
            queue.clone(),
            store.clone(),
            pipeline.clone(),
            executor.clone(),
            Collaborators {
                cloud: stub.clone(),
                metadata: stub.clone(),
                configuration: stub.clone(),
                policy: stub.clone(),
                clock: Arc::new(SystemClock),
            },
        );
        tokio::spawn(async move { worker.run().await });
    }

    let state = AppState::new(pool, store, control_plane, config.clone());

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr: SocketAddr = config.bind_addr;
    info!("starting server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
