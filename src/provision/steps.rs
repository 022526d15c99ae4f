use std::collections::BTreeMap;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::database::{self, DatabaseCredential};
use crate::instance::render_env_file;
use crate::output;
use crate::remote::Remote;
use crate::render::{self, ConfigKind, ConfigRenderer, SiteDescription};
use crate::shell::Cmd;

use super::context::ProvisionContext;

pub async fn create_directories(remote: &Remote<'_>, ctx: &ProvisionContext<'_>) -> Result<()> {
    remote
        .run(&Cmd::new("mkdir").args([
            "-p",
            ctx.paths.virtualenv.as_str(),
            ctx.paths.directory.as_str(),
        ]))
        .await
        .context("Failed to create instance directories")?;

    output::success(&format!("{} and {}", ctx.paths.directory, ctx.paths.virtualenv));
    Ok(())
}

/// Build the virtualenv unless one is already there. An existing
/// environment is left as it is.
pub async fn create_virtualenv(remote: &Remote<'_>, ctx: &ProvisionContext<'_>) -> Result<()> {
    if remote.exists(&ctx.paths.activate_script()).await? {
        output::success("Virtualenv already exists (skipped)");
        return Ok(());
    }

    let spinner = output::create_spinner("Creating virtualenv...");

    remote
        .run(&Cmd::new("virtualenv").args([
            "-p",
            ctx.config.application.python.as_str(),
            ctx.paths.virtualenv.as_str(),
        ]))
        .await
        .context("Failed to create virtualenv")?;

    remote
        .run(&Cmd::new(ctx.paths.bin("pip")).args([
            "install",
            "--upgrade",
            "pip",
            "setuptools",
            "wheel",
        ]))
        .await
        .context("Failed to install packaging tools")?;

    spinner.finish_and_clear();
    output::success("Virtualenv created");
    Ok(())
}

pub async fn setup_database(remote: &Remote<'_>, credential: &DatabaseCredential) -> Result<()> {
    database::provision(remote, credential)
        .await
        .with_context(|| format!("Failed to provision {} database", credential.adapter))?;

    output::success(&format!(
        "Database {} granted to {}",
        credential.database, credential.user
    ));
    Ok(())
}

/// Write the export file and make `bin/activate` source it.
pub async fn write_environment(
    remote: &Remote<'_>,
    ctx: &ProvisionContext<'_>,
    variables: &BTreeMap<String, String>,
) -> Result<()> {
    let env_file = ctx.paths.env_file();
    let content = render_env_file(variables, &chrono::Utc::now().to_rfc3339());

    remote
        .write_file(&env_file, &content)
        .await
        .context("Failed to write environment file")?;

    remote
        .run(&Cmd::new("chmod").args(["600", env_file.as_str()]))
        .await
        .context("Failed to set environment file permissions")?;

    let hook = format!("source {}", env_file);
    let activate = ctx.paths.activate_script();
    let hooked = remote
        .test(&Cmd::new("grep").args(["-qxF", hook.as_str(), activate.as_str()]))
        .await?;

    if !hooked {
        remote
            .run(&Cmd::new("printf").args([r"%s\n", hook.as_str()]).append_to(&activate))
            .await
            .context("Failed to hook environment file into activate")?;
    }

    output::success(&format!("{} variables written", variables.len()));
    Ok(())
}

/// Clone into the working directory, or pull if a checkout is already there.
pub async fn checkout(remote: &Remote<'_>, ctx: &ProvisionContext<'_>) -> Result<()> {
    let workdir = remote.cd(ctx.paths.directory.clone());

    let cloned = workdir.run_tolerant(&ctx.git_clone()).await?;
    if cloned.succeeded {
        output::success("Repository cloned");
        return Ok(());
    }

    info!("clone failed, falling back to pull");
    workdir
        .run(&ctx.git_pull())
        .await
        .context("Failed to update existing checkout")?;

    output::success("Existing checkout updated");
    Ok(())
}

/// Install from `requirements/<instance>.txt`, else `requirements.txt`.
/// Neither being present is not an error.
pub async fn install_requirements(remote: &Remote<'_>, ctx: &ProvisionContext<'_>) -> Result<()> {
    let venv = ctx.virtualenv(remote);
    let candidates = [
        format!("requirements/{}.txt", ctx.instance()),
        "requirements.txt".to_string(),
    ];

    for manifest in &candidates {
        if !venv.is_file(manifest).await? {
            continue;
        }

        let spinner = output::create_spinner(&format!("Installing {}...", manifest));
        let result = venv
            .run(&Cmd::new("pip").args(["install", "-r", manifest.as_str()]))
            .await;
        spinner.finish_and_clear();
        result.with_context(|| format!("Failed to install {}", manifest))?;

        output::success(&format!("Installed {}", manifest));
        return Ok(());
    }

    warn!("no requirements manifest in {}", ctx.paths.directory);
    output::warning("No requirements file found, skipping install");
    Ok(())
}

/// Render one artifact and upload it unless the host already has the same
/// content.
pub async fn upload_config(
    remote: &Remote<'_>,
    ctx: &ProvisionContext<'_>,
    renderer: &dyn ConfigRenderer,
    site: &SiteDescription,
    kind: ConfigKind,
) -> Result<()> {
    let content = render::render_artifact(renderer, &ctx.identity.repo, site, ctx.instance(), kind)?;
    let path = ctx.config_path(kind);
    let digest = hex::encode(Sha256::digest(content.as_bytes()));

    let current = remote
        .output(&Cmd::new("sha256sum").arg(&path))
        .await?;
    let unchanged = current.succeeded
        && current.stdout.split_whitespace().next() == Some(digest.as_str());

    if unchanged {
        output::success(&format!("{} unchanged (skipped)", kind.file_name()));
    } else {
        remote
            .write_file(&path, &content)
            .await
            .with_context(|| format!("Failed to upload {}", path))?;
        output::success(&format!("Uploaded {}", path));
    }

    if kind.holds_secrets() {
        remote
            .run(&Cmd::new("chmod").args(["600", path.as_str()]))
            .await
            .with_context(|| format!("Failed to set permissions on {}", path))?;
    }

    Ok(())
}

/// Run management commands whose failure is expected on a first run or
/// is not critical on its own.
pub async fn manage_tolerant(
    remote: &Remote<'_>,
    ctx: &ProvisionContext<'_>,
    lines: &[&str],
) -> Result<()> {
    let venv = ctx.virtualenv(remote);
    for line in lines {
        let out = venv.run_tolerant(&ctx.manage_line(line)).await?;
        if out.succeeded {
            output::success(&format!("manage.py {}", line));
        }
    }
    Ok(())
}

/// Touch the file uwsgi watches. Does not wait for the reload.
pub async fn restart(remote: &Remote<'_>, ctx: &ProvisionContext<'_>) -> Result<()> {
    let sentinel = ctx.reload_sentinel();
    remote
        .run(&Cmd::new("touch").arg(&sentinel))
        .await
        .context("Failed to touch reload sentinel")?;

    output::success(&format!("Touched {}", sentinel));
    Ok(())
}

pub async fn run_hooks(remote: &Remote<'_>, ctx: &ProvisionContext<'_>, hooks: &[String]) -> Result<()> {
    let venv = ctx.virtualenv(remote);
    for hook in hooks {
        venv.run(&Cmd::shell(hook.as_str()))
            .await
            .with_context(|| format!("Hook failed: {}", hook))?;
        output::success(&format!("Hook: {}", hook));
    }
    Ok(())
}
