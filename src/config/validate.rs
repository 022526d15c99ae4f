use anyhow::{bail, Result};

use super::{ApplicationKind, DevopsConfig};
use crate::database::DbAdapter;
use crate::error::ConfigurationError;

pub fn validate(config: &DevopsConfig) -> Result<()> {
    if config.host.address.is_empty() {
        return Err(ConfigurationError::MissingHost.into());
    }

    config.application.kind.parse::<ApplicationKind>()?;
    config.database.adapter.parse::<DbAdapter>()?;

    if config.application.restart_sentinel.is_empty() {
        bail!("application.restart_sentinel cannot be empty");
    }

    if !config.project.git_remote.contains("{repo}") {
        bail!("project.git_remote must contain a {{repo}} placeholder");
    }

    for (name, instance) in &config.instances {
        if instance.domains.iter().any(|d| d.trim().is_empty()) {
            bail!("Instance '{}' has an empty domain", name);
        }
    }

    Ok(())
}
