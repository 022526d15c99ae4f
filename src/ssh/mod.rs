pub mod exec;

use anyhow::{Context, Result};
use openssh::{KnownHosts, Session, SessionBuilder};
use tracing::debug;

use crate::config::HostConfig;

pub struct SshSession {
    session: Session,
    host: String,
}

impl SshSession {
    pub async fn connect(host: &HostConfig) -> Result<Self> {
        debug!("Connecting to {}@{}", host.user, host.address);

        let mut builder = SessionBuilder::default();
        builder.known_hosts_check(KnownHosts::Add);
        builder.user(host.user.clone());

        if let Some(port) = host.port {
            builder.port(port);
        }

        let session = builder
            .connect(&host.address)
            .await
            .with_context(|| format!("Failed to connect to {}@{}", host.user, host.address))?;

        Ok(Self {
            session,
            host: host.address.clone(),
        })
    }

    pub async fn close(self) -> Result<()> {
        self.session
            .close()
            .await
            .with_context(|| format!("Failed to close SSH session to {}", self.host))?;
        Ok(())
    }
}
