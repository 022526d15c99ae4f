use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::config::DevopsConfig;
use crate::local::LocalShell;
use crate::provision::{
    AssumeYes, Confirm, InitialiseOptions, InitialiseOutcome, InstanceProvisioner, TerminalConfirm,
};
use crate::ssh::SshSession;

pub async fn run(
    config: DevopsConfig,
    instance: &str,
    options: InitialiseOptions,
    yes: bool,
    project_root: PathBuf,
) -> Result<()> {
    let session = SshSession::connect(&config.host).await?;
    let local = LocalShell::new(project_root);
    let renderer = super::renderer(&config);
    let confirm: &dyn Confirm = if yes { &AssumeYes } else { &TerminalConfirm };

    let provisioner = InstanceProvisioner::new(&config, &session, &local, &renderer, confirm);
    let result = provisioner.initialise(instance, &options).await;

    if let InitialiseOutcome::Completed { variables } =
        super::settle(result, session.close().await)?
    {
        info!(count = variables.len(), "instance initialised");
    }
    Ok(())
}
