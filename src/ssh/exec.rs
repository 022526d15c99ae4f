use anyhow::{Context, Result};
use async_trait::async_trait;

use super::SshSession;
use crate::remote::{CommandOutput, RemoteExecutor};

#[async_trait]
impl RemoteExecutor for SshSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn execute(&self, script: &str) -> Result<CommandOutput> {
        let output = self
            .session
            .command("bash")
            .arg("-c")
            .arg(script)
            .output()
            .await
            .with_context(|| format!("Failed to execute command on {}", self.host))?;

        Ok(CommandOutput {
            succeeded: output.status.success(),
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
