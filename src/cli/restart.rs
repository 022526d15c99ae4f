use std::path::PathBuf;

use anyhow::Result;

use crate::config::DevopsConfig;
use crate::local::LocalShell;
use crate::output;
use crate::provision::{InstanceProvisioner, TerminalConfirm};
use crate::ssh::SshSession;

pub async fn run(config: DevopsConfig, instance: &str, project_root: PathBuf) -> Result<()> {
    let session = SshSession::connect(&config.host).await?;
    let local = LocalShell::new(project_root);
    let renderer = super::renderer(&config);

    output::header(&format!("Restarting {} ({})", config.project.repo, instance));

    let provisioner = InstanceProvisioner::new(&config, &session, &local, &renderer, &TerminalConfirm);
    let result = provisioner.restart(instance).await;

    super::settle(result, session.close().await)
}
