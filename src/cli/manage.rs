use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::config::DevopsConfig;
use crate::local::LocalShell;
use crate::provision::{InstanceProvisioner, TerminalConfirm};
use crate::ssh::SshSession;

pub async fn run(
    config: DevopsConfig,
    instance: &str,
    args: &[String],
    project_root: PathBuf,
) -> Result<()> {
    if args.is_empty() {
        bail!("No management command specified");
    }

    let session = SshSession::connect(&config.host).await?;
    let local = LocalShell::new(project_root);
    let renderer = super::renderer(&config);

    let provisioner = InstanceProvisioner::new(&config, &session, &local, &renderer, &TerminalConfirm);
    let result = provisioner.manage(instance, args).await;

    let output = super::settle(result, session.close().await)?;
    print!("{}", output);
    Ok(())
}
