pub mod context;
mod steps;

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{ApplicationKind, DevopsConfig};
use crate::database::{self, DatabaseCredential, DbAdapter};
use crate::error::ConfigurationError;
use crate::instance::{self, parse_env_file, InstanceIdentity};
use crate::local::LocalExecutor;
use crate::output;
use crate::remote::{Remote, RemoteExecutor};
use crate::render::{ConfigKind, ConfigRenderer};
use crate::secrets::Secrets;
use crate::shell::Cmd;

use context::ProvisionContext;

const INITIALISE_STEPS: usize = 11;
const UPGRADE_STEPS: usize = 5;

/// Asks the operator before a destructive operation.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        let answer = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        Ok(answer)
    }
}

/// `--yes`.
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Per-call overrides for initialise; `None` and empty fields fall back to
/// the config file.
#[derive(Debug, Clone, Default)]
pub struct InitialiseOptions {
    pub domains: Vec<String>,
    pub application: Option<String>,
    pub db_adapter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialiseOutcome {
    /// Finished; holds the variables that were printed.
    Completed { variables: BTreeMap<String, String> },
    /// The operator declined; nothing on the host was touched.
    Aborted,
}

/// Brings named instances of one repository from nothing to running, and
/// keeps them up to date.
pub struct InstanceProvisioner<'a> {
    config: &'a DevopsConfig,
    remote: &'a dyn RemoteExecutor,
    local: &'a dyn LocalExecutor,
    renderer: &'a dyn ConfigRenderer,
    confirm: &'a dyn Confirm,
}

impl<'a> InstanceProvisioner<'a> {
    pub fn new(
        config: &'a DevopsConfig,
        remote: &'a dyn RemoteExecutor,
        local: &'a dyn LocalExecutor,
        renderer: &'a dyn ConfigRenderer,
        confirm: &'a dyn Confirm,
    ) -> Self {
        Self {
            config,
            remote,
            local,
            renderer,
            confirm,
        }
    }

    /// Identity for `instance`, or the first missing field.
    pub fn validate(&self, instance: &str) -> Result<InstanceIdentity, ConfigurationError> {
        InstanceIdentity {
            project: self.config.project.project.clone(),
            repo: self.config.project.repo.clone(),
            app: self.config.app().to_string(),
            instance: instance.to_string(),
        }
        .validate()
    }

    fn application(&self, requested: Option<&str>) -> Result<ApplicationKind, ConfigurationError> {
        requested
            .unwrap_or(&self.config.application.kind)
            .parse()
    }

    fn context(&self, instance: &str, application: Option<&str>) -> Result<ProvisionContext<'a>> {
        let identity = self.validate(instance)?;
        let application = self.application(application)?;
        let domains = self.config.domains(instance).to_vec();
        Ok(ProvisionContext::new(self.config, identity, application, domains))
    }

    /// Create or reset an instance. Always rotates the database password
    /// and secret key, so previously distributed credentials stop working.
    pub async fn initialise(
        &self,
        instance: &str,
        options: &InitialiseOptions,
    ) -> Result<InitialiseOutcome> {
        let identity = self.validate(instance)?;
        let application = self.application(options.application.as_deref())?;
        let adapter: DbAdapter = options
            .db_adapter
            .as_deref()
            .unwrap_or(&self.config.database.adapter)
            .parse()?;
        let domains = if options.domains.is_empty() {
            self.config.domains(instance).to_vec()
        } else {
            options.domains.clone()
        };
        if domains.is_empty() {
            return Err(ConfigurationError::MissingDomains(instance.to_string()).into());
        }
        database::admin_password(&self.config.database)?;

        let ctx = ProvisionContext::new(self.config, identity, application, domains);
        output::header(&format!(
            "Initialising {} ({}) on {}",
            ctx.identity.repo,
            ctx.instance(),
            self.remote.host()
        ));

        output::step(1, INITIALISE_STEPS, "Confirming");
        let prompt = format!(
            "This resets the database password and secret key for {} ({}). Continue?",
            ctx.identity.repo,
            ctx.instance()
        );
        if !self.confirm.confirm(&prompt)? {
            output::info("Aborted, nothing was changed");
            return Ok(InitialiseOutcome::Aborted);
        }

        output::step(2, INITIALISE_STEPS, "Generating secrets");
        let secrets = Secrets::generate();
        let credential = DatabaseCredential::for_instance(
            &self.config.database,
            adapter,
            &ctx.identity,
            &secrets,
        )?;
        let variables = instance::environment_variables(
            &ctx.identity,
            &secrets,
            &credential.database,
            &credential.user,
        );
        info!(?secrets, instance = ctx.instance(), "generated secrets");

        let remote = Remote::new(self.remote);

        output::step(3, INITIALISE_STEPS, "Creating directories");
        steps::create_directories(&remote, &ctx).await?;

        output::step(4, INITIALISE_STEPS, "Preparing virtualenv");
        steps::create_virtualenv(&remote, &ctx).await?;

        output::step(5, INITIALISE_STEPS, "Provisioning database");
        steps::setup_database(&remote, &credential).await?;

        output::step(6, INITIALISE_STEPS, "Writing environment");
        steps::write_environment(&remote, &ctx, &variables).await?;

        output::step(7, INITIALISE_STEPS, "Checking out source");
        steps::checkout(&remote, &ctx).await?;

        output::step(8, INITIALISE_STEPS, "Installing requirements");
        steps::install_requirements(&remote, &ctx).await?;

        let site = ctx.site(&variables);

        output::step(9, INITIALISE_STEPS, "Uploading nginx config");
        steps::upload_config(&remote, &ctx, self.renderer, &site, ConfigKind::Nginx).await?;

        output::step(10, INITIALISE_STEPS, "Setting up application");
        if ctx.application.is_web_app() {
            let app = &self.config.application;
            steps::manage_tolerant(&remote, &ctx, &[&app.schema_sync, &app.collect_static])
                .await?;
            steps::upload_config(&remote, &ctx, self.renderer, &site, ConfigKind::Uwsgi).await?;
            steps::restart(&remote, &ctx).await?;
        } else {
            output::success(&format!("Nothing to do for a {} site", ctx.application));
        }

        output::step(11, INITIALISE_STEPS, "Generated environment");
        output::variables(&variables);

        steps::run_hooks(&remote, &ctx, &self.config.hooks.initialise)
            .await
            .context("Initialise hook failed after the new credentials were printed")?;

        println!();
        output::success(&format!("{} ({}) is initialised", ctx.identity.repo, ctx.instance()));
        Ok(InitialiseOutcome::Completed { variables })
    }

    /// Deploy the operator's latest pushed commit to an existing instance.
    pub async fn upgrade(&self, instance: &str, application: Option<&str>) -> Result<()> {
        let ctx = self.context(instance, application)?;
        output::header(&format!(
            "Upgrading {} ({}) on {}",
            ctx.identity.repo,
            ctx.instance(),
            self.remote.host()
        ));

        output::step(1, UPGRADE_STEPS, "Syncing local repository");
        self.local
            .run(&ctx.git_pull())
            .context("Failed to pull local repository")?;
        self.local
            .run(&Cmd::new("git").arg("push"))
            .context("Failed to push local repository")?;
        output::success("Local repository pushed");

        let remote = Remote::new(self.remote);

        output::step(2, UPGRADE_STEPS, "Pulling source");
        ctx.virtualenv(&remote)
            .run(&ctx.git_pull())
            .await
            .context("Failed to pull on the host")?;
        output::success("Source updated");

        output::step(3, UPGRADE_STEPS, "Installing requirements");
        steps::install_requirements(&remote, &ctx).await?;

        output::step(4, UPGRADE_STEPS, "Updating application");
        if ctx.application.is_web_app() {
            let app = &self.config.application;
            steps::manage_tolerant(
                &remote,
                &ctx,
                &[&app.schema_sync, &app.migrate, &app.collect_static],
            )
            .await?;
        } else {
            output::success(&format!("Nothing to do for a {} site", ctx.application));
        }

        output::step(5, UPGRADE_STEPS, "Restarting");
        if ctx.application.is_web_app() {
            steps::restart(&remote, &ctx).await?;
        } else {
            output::success("No process manager to restart");
        }
        steps::run_hooks(&remote, &ctx, &self.config.hooks.upgrade).await?;

        println!();
        output::success(&format!("{} ({}) is up to date", ctx.identity.repo, ctx.instance()));
        Ok(())
    }

    /// Ask uwsgi to reload its workers.
    pub async fn restart(&self, instance: &str) -> Result<()> {
        let ctx = self.context(instance, None)?;
        steps::restart(&Remote::new(self.remote), &ctx).await
    }

    /// `python manage.py <args>` in the activated environment. The arguments
    /// are passed through as given.
    pub async fn manage(&self, instance: &str, args: &[String]) -> Result<String> {
        let ctx = self.context(instance, None)?;
        let remote = Remote::new(self.remote);

        ctx.virtualenv(&remote)
            .run(&ctx.manage_cmd(args))
            .await
            .with_context(|| format!("manage.py {} failed", args.join(" ")))
    }

    /// Variables currently exported by the instance's environment file.
    pub async fn environment(&self, instance: &str) -> Result<BTreeMap<String, String>> {
        let ctx = self.context(instance, None)?;
        let remote = Remote::new(self.remote);
        let env_file = ctx.paths.env_file();

        if !remote.is_file(&env_file).await? {
            return Ok(BTreeMap::new());
        }

        let content = remote
            .run(&Cmd::new("cat").arg(&env_file))
            .await
            .context("Failed to read environment file")?;
        Ok(parse_env_file(&content))
    }
}
