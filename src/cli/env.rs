use std::path::PathBuf;

use anyhow::Result;

use crate::config::DevopsConfig;
use crate::local::LocalShell;
use crate::output;
use crate::provision::{InstanceProvisioner, TerminalConfirm};
use crate::secrets::mask;
use crate::ssh::SshSession;

pub async fn run(
    config: DevopsConfig,
    instance: &str,
    reveal: bool,
    project_root: PathBuf,
) -> Result<()> {
    let session = SshSession::connect(&config.host).await?;
    let local = LocalShell::new(project_root);
    let renderer = super::renderer(&config);

    let provisioner = InstanceProvisioner::new(&config, &session, &local, &renderer, &TerminalConfirm);
    let result = provisioner.environment(instance).await;

    let mut vars = super::settle(result, session.close().await)?;

    if vars.is_empty() {
        output::info(&format!("No environment written for {} yet", instance));
        return Ok(());
    }

    if !reveal {
        for value in vars.values_mut() {
            *value = mask(value.as_str());
        }
    }

    output::header(&format!("Environment for {} ({})", config.project.repo, instance));
    output::variables(&vars);
    Ok(())
}
