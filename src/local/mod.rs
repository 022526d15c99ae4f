use std::path::PathBuf;
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::error::{describe_status, LocalCommandFailure};
use crate::remote::CommandOutput;
use crate::shell::Cmd;

/// Runs commands on the operator's own machine.
pub trait LocalExecutor: Send + Sync {
    fn execute(&self, cmd: &Cmd) -> Result<CommandOutput>;

    /// Run and fail with [`LocalCommandFailure`] on a non-zero exit.
    fn run(&self, cmd: &Cmd) -> Result<String> {
        let out = self.execute(cmd)?;
        if !out.succeeded {
            return Err(LocalCommandFailure {
                command: cmd.redacted(),
                status: describe_status(out.status),
                stderr: out.stderr.trim().to_string(),
            }
            .into());
        }
        Ok(out.stdout)
    }
}

/// Spawns processes directly (no shell) inside the project checkout.
pub struct LocalShell {
    project_root: PathBuf,
}

impl LocalShell {
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }

    /// Fail early when a required tool is not on PATH.
    pub fn require(&self, program: &str) -> Result<()> {
        if which::which(program).is_err() {
            bail!("`{}` is not installed or not on PATH", program);
        }
        Ok(())
    }
}

impl LocalExecutor for LocalShell {
    fn execute(&self, cmd: &Cmd) -> Result<CommandOutput> {
        debug!("[local] exec: {}", cmd);

        let argv = cmd.argv();
        let (program, args) = argv.split_first().context("Empty local command")?;

        let output = Command::new(program)
            .args(args)
            .envs(cmd.env_pairs())
            .current_dir(&self.project_root)
            .output()
            .with_context(|| format!("Failed to run local command: {}", cmd))?;

        Ok(CommandOutput {
            succeeded: output.status.success(),
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
