//! `lock` / `unlock` / `status` / `pause` / `resume` / `in-progress` /
//! `paused` commands.

use anyhow::Result;
use maestro_config::SystemConfig;
use maestro_core::deployment::DeploymentKey;

use super::connect;

pub async fn lock(config: &SystemConfig) -> Result<()> {
    let control_plane = connect(config).await?;
    if control_plane.lock().await? {
        println!("locked");
    } else {
        println!("already locked");
    }
    Ok(())
}

pub async fn unlock(config: &SystemConfig) -> Result<()> {
    let control_plane = connect(config).await?;
    control_plane.unlock().await?;
    println!("unlocked");
    Ok(())
}

pub async fn status(config: &SystemConfig) -> Result<()> {
    let control_plane = connect(config).await?;
    println!("locked: {}", control_plane.is_locked().await?);
    Ok(())
}

fn key(application: String, environment: String, region: Option<String>, config: &SystemConfig) -> DeploymentKey {
    DeploymentKey { application, environment, region: region.unwrap_or_else(|| config.default_region.clone()) }
}

pub async fn pause(config: &SystemConfig, application: String, environment: String, region: Option<String>) -> Result<()> {
    let control_plane = connect(config).await?;
    if control_plane.register_pause(&key(application, environment, region, config)).await? {
        println!("pause registered");
    } else {
        println!("already paused");
    }
    Ok(())
}

pub async fn unpause(config: &SystemConfig, application: String, environment: String, region: Option<String>) -> Result<()> {
    let control_plane = connect(config).await?;
    control_plane.unregister_pause(&key(application, environment, region, config)).await?;
    println!("pause cleared");
    Ok(())
}

pub async fn resume(config: &SystemConfig, application: String, environment: String, region: Option<String>) -> Result<()> {
    let control_plane = connect(config).await?;
    control_plane.resume(&key(application, environment, region, config)).await?;
    println!("resumed");
    Ok(())
}

pub async fn in_progress(config: &SystemConfig) -> Result<()> {
    let control_plane = connect(config).await?;
    for key in control_plane.list_in_progress().await? {
        println!("{key}");
    }
    Ok(())
}

pub async fn paused(config: &SystemConfig) -> Result<()> {
    let control_plane = connect(config).await?;
    for key in control_plane.list_paused().await? {
        println!("{key}");
    }
    Ok(())
}
