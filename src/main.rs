mod cli;
mod config;
mod database;
mod error;
mod instance;
mod local;
mod output;
mod provision;
mod remote;
mod render;
mod secrets;
mod shell;
mod ssh;
#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use provision::InitialiseOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .without_time()
        .init();

    let project_root = std::env::current_dir()?;

    match cli.command {
        Command::Init => {
            cli::init::run(&cli.config)?;
        }

        Command::Initialise {
            instance,
            domains,
            application,
            db_adapter,
            yes,
        } => {
            let config = config::DevopsConfig::load(&cli.config)?;
            let options = InitialiseOptions {
                domains,
                application,
                db_adapter,
            };
            cli::initialise::run(config, &instance, options, yes, project_root).await?;
        }

        Command::Upgrade {
            instance,
            application,
        } => {
            let config = config::DevopsConfig::load(&cli.config)?;
            cli::upgrade::run(config, &instance, application.as_deref(), project_root).await?;
        }

        Command::Restart { instance } => {
            let config = config::DevopsConfig::load(&cli.config)?;
            cli::restart::run(config, &instance, project_root).await?;
        }

        Command::Manage { instance, args } => {
            let config = config::DevopsConfig::load(&cli.config)?;
            cli::manage::run(config, &instance, &args, project_root).await?;
        }

        Command::Env { instance, reveal } => {
            let config = config::DevopsConfig::load(&cli.config)?;
            cli::env::run(config, &instance, reveal, project_root).await?;
        }
    }

    Ok(())
}
