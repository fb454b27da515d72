//! `deploy` / `undo` / `rollback` commands.

use anyhow::Result;
use maestro_config::SystemConfig;
use maestro_scheduler::BeginRequest;

use super::connect;

#[allow(clippy::too_many_arguments)]
pub async fn deploy(
    config: &SystemConfig,
    application: String,
    environment: String,
    region: Option<String>,
    image: String,
    hash: String,
    message: String,
    user: String,
    silent: bool,
) -> Result<()> {
    let control_plane = connect(config).await?;
    let id = control_plane
        .begin(BeginRequest {
            application,
            environment,
            region: region.unwrap_or_else(|| config.default_region.clone()),
            user,
            message,
            image_id: image,
            hash,
            silent,
        })
        .await?;
    println!("{id}");
    Ok(())
}

pub async fn undo(config: &SystemConfig, application: &str, environment: &str, region: Option<String>) -> Result<()> {
    let control_plane = connect(config).await?;
    let region = region.unwrap_or_else(|| config.default_region.clone());
    let id = control_plane.undo(application, environment, &region).await?;
    println!("{id}");
    Ok(())
}

pub async fn rollback(config: &SystemConfig, application: &str, environment: &str, region: Option<String>) -> Result<()> {
    let control_plane = connect(config).await?;
    let region = region.unwrap_or_else(|| config.default_region.clone());
    let id = control_plane.rollback(application, environment, &region).await?;
    println!("{id}");
    Ok(())
}
