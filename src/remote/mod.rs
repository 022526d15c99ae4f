use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{describe_status, RemoteCommandFailure};
use crate::output;
use crate::shell::{quote, Cmd};

/// Result of a command that ran to completion, successfully or not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub succeeded: bool,
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs a shell script on the target host.
///
/// `Err` is reserved for transport failures (the command could not be
/// started at all). A non-zero exit is reported through
/// [`CommandOutput::succeeded`].
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    fn host(&self) -> &str;

    async fn execute(&self, script: &str) -> Result<CommandOutput>;
}

/// A view of the remote host with a working directory and a chain of
/// prefix commands (such as sourcing a virtualenv's activate script).
///
/// Scopes nest by value: [`Remote::cd`] and [`Remote::prefix`] return a new
/// context and leave the receiver untouched, so leaving a block on any path
/// restores the outer context.
#[derive(Clone)]
pub struct Remote<'a> {
    executor: &'a dyn RemoteExecutor,
    directory: Option<String>,
    prefixes: Vec<Cmd>,
}

impl<'a> Remote<'a> {
    pub fn new(executor: &'a dyn RemoteExecutor) -> Self {
        Self {
            executor,
            directory: None,
            prefixes: Vec::new(),
        }
    }

    pub fn host(&self) -> &str {
        self.executor.host()
    }

    pub fn cd(&self, directory: impl Into<String>) -> Remote<'a> {
        Remote {
            executor: self.executor,
            directory: Some(directory.into()),
            prefixes: self.prefixes.clone(),
        }
    }

    pub fn prefix(&self, cmd: Cmd) -> Remote<'a> {
        let mut prefixes = self.prefixes.clone();
        prefixes.push(cmd);
        Remote {
            executor: self.executor,
            directory: self.directory.clone(),
            prefixes,
        }
    }

    fn script(&self, cmd: &Cmd, redact: bool) -> String {
        let mut parts = Vec::with_capacity(self.prefixes.len() + 2);
        if let Some(dir) = &self.directory {
            parts.push(format!("cd {}", quote(dir)));
        }
        for prefix in &self.prefixes {
            parts.push(if redact { prefix.redacted() } else { prefix.render() });
        }
        parts.push(if redact { cmd.redacted() } else { cmd.render() });
        parts.join(" && ")
    }

    /// Run without any failure policy.
    pub async fn output(&self, cmd: &Cmd) -> Result<CommandOutput> {
        debug!("[{}] exec: {}", self.host(), self.script(cmd, true));
        self.executor.execute(&self.script(cmd, false)).await
    }

    /// Run and fail with [`RemoteCommandFailure`] on a non-zero exit.
    pub async fn run(&self, cmd: &Cmd) -> Result<String> {
        let out = self.output(cmd).await?;
        if !out.succeeded {
            return Err(RemoteCommandFailure {
                host: self.host().to_string(),
                command: self.script(cmd, true),
                status: describe_status(out.status),
                stdout: out.stdout.trim().to_string(),
                stderr: out.stderr.trim().to_string(),
            }
            .into());
        }
        Ok(out.stdout)
    }

    /// Run, reporting a non-zero exit as a warning instead of an error.
    pub async fn run_tolerant(&self, cmd: &Cmd) -> Result<CommandOutput> {
        let out = self.output(cmd).await?;
        if !out.succeeded {
            warn!(
                "[{}] tolerated failure (exit {}): {}",
                self.host(),
                describe_status(out.status),
                cmd
            );
            output::warning(&format!(
                "`{}` failed (exit {}), continuing",
                cmd,
                describe_status(out.status)
            ));
        }
        Ok(out)
    }

    /// Run a probe and report whether it exited zero.
    pub async fn test(&self, cmd: &Cmd) -> Result<bool> {
        Ok(self.output(cmd).await?.succeeded)
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        self.test(&Cmd::new("test").args(["-e", path])).await
    }

    pub async fn is_file(&self, path: &str) -> Result<bool> {
        self.test(&Cmd::new("test").args(["-f", path])).await
    }

    /// Replace `path` with `content`. The content is treated as secret so it
    /// never reaches the logs.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let cmd = Cmd::new("printf")
            .arg("%s")
            .secret_arg(content)
            .stdout_to(path);
        self.run(&cmd).await?;
        Ok(())
    }
}
