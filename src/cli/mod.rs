use clap::{Parser, Subcommand};
use std::path::PathBuf;

use anyhow::Result;
use tracing::warn;

use crate::config::DevopsConfig;
use crate::render::TemplateRenderer;

pub mod env;
pub mod init;
pub mod initialise;
pub mod manage;
pub mod restart;
pub mod upgrade;

#[derive(Parser)]
#[command(
    name = "devops",
    version,
    about = "Provision and upgrade Django instances on a single host"
)]
pub struct Cli {
    /// Path to devops.toml
    #[arg(short, long, default_value = "devops.toml")]
    pub config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scaffold devops.toml in the current directory
    Init,

    /// Create or reset an instance (rotates its database password and secret key)
    Initialise {
        /// Instance name (live, test, staging, ...)
        instance: String,
        /// Domain served by the instance, repeatable. Defaults to the config file
        #[arg(short, long = "domain")]
        domains: Vec<String>,
        /// Application kind: web-app or static
        #[arg(long)]
        application: Option<String>,
        /// Database adapter: mysql or postgres
        #[arg(long)]
        db_adapter: Option<String>,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Deploy the latest pushed commit to an instance
    Upgrade {
        instance: String,
        /// Application kind: web-app or static
        #[arg(long)]
        application: Option<String>,
    },

    /// Reload the instance's application processes
    Restart { instance: String },

    /// Run a Django management command on an instance
    Manage {
        instance: String,
        /// Arguments passed to manage.py
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Show the environment variables exported for an instance
    Env {
        instance: String,
        /// Print values instead of masking them
        #[arg(long)]
        reveal: bool,
    },
}

/// Bundled templates, shadowed by `application.templates_dir` when set.
pub fn renderer(config: &DevopsConfig) -> TemplateRenderer {
    TemplateRenderer::new(config.application.templates_dir.as_ref().map(PathBuf::from))
}

/// Combine a workflow result with the outcome of closing its SSH session.
/// The workflow's own error always wins; a close failure only surfaces
/// when the workflow succeeded.
pub fn settle<T>(result: Result<T>, closed: Result<()>) -> Result<T> {
    match (result, closed) {
        (Ok(value), closed) => closed.map(|()| value),
        (Err(err), Err(close_err)) => {
            warn!("also failed to close SSH session: {:#}", close_err);
            Err(err)
        }
        (Err(err), Ok(())) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn workflow_error_wins_over_close_error() {
        let err = settle::<()>(Err(anyhow!("GRANT failed")), Err(anyhow!("mux gone"))).unwrap_err();
        assert_eq!(err.to_string(), "GRANT failed");

        let err = settle(Ok(1), Err(anyhow!("mux gone"))).unwrap_err();
        assert_eq!(err.to_string(), "mux gone");

        assert_eq!(settle(Ok(1), Ok(())).unwrap(), 1);
    }

    #[test]
    fn manage_keeps_hyphenated_arguments() {
        let cli = Cli::parse_from(["devops", "manage", "live", "migrate", "--fake-initial"]);
        match cli.command {
            Command::Manage { instance, args } => {
                assert_eq!(instance, "live");
                assert_eq!(args, vec!["migrate", "--fake-initial"]);
            }
            _ => panic!("expected manage"),
        }
    }

    #[test]
    fn initialise_collects_repeated_domains() {
        let cli = Cli::parse_from([
            "devops",
            "-c",
            "site.toml",
            "initialise",
            "live",
            "-d",
            "example.com",
            "--domain",
            "www.example.com",
            "--db-adapter",
            "postgres",
            "--yes",
        ]);
        assert_eq!(cli.config, PathBuf::from("site.toml"));
        match cli.command {
            Command::Initialise {
                domains,
                db_adapter,
                yes,
                application,
                ..
            } => {
                assert_eq!(domains, vec!["example.com", "www.example.com"]);
                assert_eq!(db_adapter.as_deref(), Some("postgres"));
                assert!(application.is_none());
                assert!(yes);
            }
            _ => panic!("expected initialise"),
        }
    }
}
