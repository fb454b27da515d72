//! Command-line client for the Maestro deployment control plane.

use clap::{Parser, Subcommand};
use maestro_config::SystemConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "maestro")]
#[command(about = "Deployment control plane CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Begin a new deployment.
    Deploy {
        application: String,
        environment: String,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        image: String,
        #[arg(long)]
        hash: String,
        #[arg(long, default_value = "")]
        message: String,
        #[arg(long, default_value = "cli")]
        user: String,
        #[arg(long)]
        silent: bool,
    },
    /// Reverse the current or most recently failed deployment.
    Undo {
        application: String,
        environment: String,
        #[arg(long)]
        region: Option<String>,
    },
    /// Redeploy the penultimate completed configuration.
    Rollback {
        application: String,
        environment: String,
        #[arg(long)]
        region: Option<String>,
    },
    /// Register a pause point for an in-progress deployment.
    Pause {
        application: String,
        environment: String,
        #[arg(long)]
        region: Option<String>,
    },
    /// Clear a registered pause without resuming.
    Unpause {
        application: String,
        environment: String,
        #[arg(long)]
        region: Option<String>,
    },
    /// Resume a paused deployment.
    Resume {
        application: String,
        environment: String,
        #[arg(long)]
        region: Option<String>,
    },
    /// Acquire the global deployment lock.
    Lock,
    /// Release the global deployment lock.
    Unlock,
    /// Report whether the global deployment lock is held.
    Status,
    /// List deployments currently in progress.
    InProgress,
    /// List deployments currently paused.
    Paused,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let config = SystemConfig::from_env();
    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy { application, environment, region, image, hash, message, user, silent } => {
            commands::deployments::deploy(&config, application, environment, region, image, hash, message, user, silent).await?;
        }
        Commands::Undo { application, environment, region } => {
            commands::deployments::undo(&config, &application, &environment, region).await?;
        }
        Commands::Rollback { application, environment, region } => {
            commands::deployments::rollback(&config, &application, &environment, region).await?;
        }
        Commands::Pause { application, environment, region } => {
            commands::control::pause(&config, application, environment, region).await?;
        }
        Commands::Unpause { application, environment, region } => {
            commands::control::unpause(&config, application, environment, region).await?;
        }
        Commands::Resume { application, environment, region } => {
            commands::control::resume(&config, application, environment, region).await?;
        }
        Commands::Lock => commands::control::lock(&config).await?,
        Commands::Unlock => commands::control::unlock(&config).await?,
        Commands::Status => commands::control::status(&config).await?,
        Commands::InProgress => commands::control::in_progress(&config).await?,
        Commands::Paused => commands::control::paused(&config).await?,
    }

    Ok(())
}
