use std::collections::BTreeMap;

use crate::config::{ApplicationKind, DevopsConfig};
use crate::instance::{InstanceIdentity, InstancePaths};
use crate::remote::Remote;
use crate::render::{ConfigKind, ConfigRequest, InstanceEntry, SiteDescription};
use crate::shell::Cmd;

/// Immutable state for one workflow invocation.
pub struct ProvisionContext<'a> {
    pub config: &'a DevopsConfig,
    pub identity: InstanceIdentity,
    pub paths: InstancePaths,
    pub application: ApplicationKind,
    pub domains: Vec<String>,
}

impl<'a> ProvisionContext<'a> {
    pub fn new(
        config: &'a DevopsConfig,
        identity: InstanceIdentity,
        application: ApplicationKind,
        domains: Vec<String>,
    ) -> Self {
        let paths = identity.paths(&config.paths);
        Self {
            config,
            identity,
            paths,
            application,
            domains,
        }
    }

    pub fn instance(&self) -> &str {
        &self.identity.instance
    }

    /// Commands run from the checkout with the runtime environment active.
    pub fn virtualenv<'r>(&self, remote: &Remote<'r>) -> Remote<'r> {
        remote
            .cd(self.paths.directory.clone())
            .prefix(self.paths.activate())
    }

    pub fn reload_sentinel(&self) -> String {
        format!(
            "{}/{}",
            self.paths.directory, self.config.application.restart_sentinel
        )
    }

    pub fn config_path(&self, kind: ConfigKind) -> String {
        format!("{}/{}", self.paths.directory, kind.file_name())
    }

    /// `python manage.py <subcommand...>`, splitting a configured command
    /// line such as `"migrate --noinput"` on whitespace.
    pub fn manage_cmd<S: AsRef<str>>(&self, args: &[S]) -> Cmd {
        Cmd::new("python")
            .arg("manage.py")
            .args(args.iter().map(|a| a.as_ref().to_string()))
    }

    pub fn manage_line(&self, line: &str) -> Cmd {
        let args: Vec<&str> = line.split_whitespace().collect();
        self.manage_cmd(&args)
    }

    pub fn git_clone(&self) -> Cmd {
        Cmd::new("git").args(["clone", self.config.git_remote().as_str(), "."])
    }

    pub fn git_pull(&self) -> Cmd {
        Cmd::new("git").args(["pull", "--rebase"])
    }

    /// One instance entry and the config artifacts this application needs.
    pub fn site(&self, env: &BTreeMap<String, String>) -> SiteDescription {
        let entry = InstanceEntry {
            name: self.identity.instance.clone(),
            domains: self.domains.clone(),
            directory: self.paths.directory.clone(),
            virtualenv: self.paths.virtualenv.clone(),
            reload_sentinel: self.reload_sentinel(),
        };

        let request = |kind, env: BTreeMap<String, String>| ConfigRequest {
            kind,
            application: self.application,
            app: self.identity.app.clone(),
            env,
        };

        let site = SiteDescription::new(entry).with_config(request(ConfigKind::Nginx, BTreeMap::new()));

        if self.application.is_web_app() {
            site.with_config(request(ConfigKind::Uwsgi, env.clone()))
        } else {
            site
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRemote;

    fn config() -> DevopsConfig {
        toml::from_str(
            r#"
[project]
project = "links-creative"
repo = "app"

[host]
address = "example.net"
"#,
        )
        .unwrap()
    }

    fn identity() -> InstanceIdentity {
        InstanceIdentity {
            project: "links-creative".to_string(),
            repo: "app".to_string(),
            app: "app".to_string(),
            instance: "live".to_string(),
        }
    }

    #[tokio::test]
    async fn virtualenv_scope_enters_checkout_and_activates() {
        let config = config();
        let ctx = ProvisionContext::new(&config, identity(), ApplicationKind::WebApp, vec![]);
        let fake = FakeRemote::new();
        let remote = Remote::new(&fake);

        ctx.virtualenv(&remote)
            .run(&ctx.manage_line("migrate  --noinput"))
            .await
            .unwrap();

        assert_eq!(
            fake.scripts(),
            vec!["cd /srv/app/live && source /env/app/live/bin/activate && python manage.py migrate --noinput"]
        );
    }

    #[test]
    fn static_sites_only_request_nginx() {
        let config = config();
        let ctx = ProvisionContext::new(
            &config,
            identity(),
            ApplicationKind::Static,
            vec!["example.com".to_string()],
        );
        let site = ctx.site(&BTreeMap::new());

        assert!(site.config(ConfigKind::Nginx).is_some());
        assert!(site.config(ConfigKind::Uwsgi).is_none());
        assert_eq!(site.instance("live").unwrap().domains, vec!["example.com"]);
    }

    #[test]
    fn clone_url_comes_from_template() {
        let config = config();
        let ctx = ProvisionContext::new(&config, identity(), ApplicationKind::WebApp, vec![]);
        assert_eq!(
            ctx.git_clone().render(),
            "git clone git@github.com:links-creative/app.git ."
        );
    }
}
