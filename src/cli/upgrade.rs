use std::path::PathBuf;

use anyhow::Result;

use crate::config::DevopsConfig;
use crate::local::LocalShell;
use crate::provision::{InstanceProvisioner, TerminalConfirm};
use crate::ssh::SshSession;

pub async fn run(
    config: DevopsConfig,
    instance: &str,
    application: Option<&str>,
    project_root: PathBuf,
) -> Result<()> {
    let local = LocalShell::new(project_root);
    local.require("git")?;

    let session = SshSession::connect(&config.host).await?;
    let renderer = super::renderer(&config);

    let provisioner = InstanceProvisioner::new(&config, &session, &local, &renderer, &TerminalConfirm);
    let result = provisioner.upgrade(instance, application).await;

    super::settle(result, session.close().await)
}
