use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigurationError;

mod validate;

/// What gets served for an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApplicationKind {
    /// Django behind uwsgi: database, management commands, process manager.
    #[serde(rename = "web-app")]
    WebApp,
    /// Files served straight from the checkout by nginx.
    #[serde(rename = "static")]
    Static,
}

impl ApplicationKind {
    pub fn is_web_app(self) -> bool {
        matches!(self, ApplicationKind::WebApp)
    }
}

impl FromStr for ApplicationKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web-app" => Ok(ApplicationKind::WebApp),
            "static" => Ok(ApplicationKind::Static),
            other => Err(ConfigurationError::UnsupportedApplication(other.to_string())),
        }
    }
}

impl fmt::Display for ApplicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApplicationKind::WebApp => "web-app",
            ApplicationKind::Static => "static",
        })
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DevopsConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    pub host: HostConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub application: ApplicationConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
    #[serde(default)]
    pub instances: HashMap<String, InstanceConfig>,
}

/// Identity of the deployed code. Empty strings are allowed here and
/// rejected per instance when a workflow starts.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProjectConfig {
    /// Namespace on the git host, only used by `git_remote` templates.
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub repo: String,
    /// Django package name, defaults to `repo`.
    pub app: Option<String>,
    /// Clone URL template with `{organization}`, `{project}` and `{repo}`
    /// placeholders.
    #[serde(default = "default_git_remote")]
    pub git_remote: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            organization: String::new(),
            project: String::new(),
            repo: String::new(),
            app: None,
            git_remote: default_git_remote(),
        }
    }
}

fn default_git_remote() -> String {
    "git@github.com:{project}/{repo}.git".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HostConfig {
    pub address: String,
    pub port: Option<u16>,
    #[serde(default = "default_user")]
    pub user: String,
}

fn default_user() -> String {
    "wsgi".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_srv_root")]
    pub srv_root: String,
    #[serde(default = "default_env_root")]
    pub env_root: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            srv_root: default_srv_root(),
            env_root: default_env_root(),
        }
    }
}

fn default_srv_root() -> String {
    "/srv".to_string()
}

fn default_env_root() -> String {
    "/env".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApplicationConfig {
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(default = "default_restart_sentinel")]
    pub restart_sentinel: String,
    #[serde(default = "default_schema_sync")]
    pub schema_sync: String,
    #[serde(default = "default_migrate")]
    pub migrate: String,
    #[serde(default = "default_collect_static")]
    pub collect_static: String,
    /// Directory whose templates take precedence over the bundled ones.
    pub templates_dir: Option<String>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            python: default_python(),
            restart_sentinel: default_restart_sentinel(),
            schema_sync: default_schema_sync(),
            migrate: default_migrate(),
            collect_static: default_collect_static(),
            templates_dir: None,
        }
    }
}

fn default_kind() -> String {
    "web-app".to_string()
}
fn default_python() -> String {
    "python3".to_string()
}
fn default_restart_sentinel() -> String {
    "reload".to_string()
}
fn default_schema_sync() -> String {
    "syncdb --noinput".to_string()
}
fn default_migrate() -> String {
    "migrate --noinput".to_string()
}
fn default_collect_static() -> String {
    "collectstatic --noinput".to_string()
}

/// Control-plane credentials used to create per-instance databases.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_adapter")]
    pub adapter: String,
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_user")]
    pub user: String,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            adapter: default_adapter(),
            host: default_db_host(),
            user: default_db_user(),
            password: None,
        }
    }
}

fn default_adapter() -> String {
    "mysql".to_string()
}
fn default_db_host() -> String {
    "localhost".to_string()
}
fn default_db_user() -> String {
    "root".to_string()
}

/// Shell lines run inside the activated environment after a workflow.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct HooksConfig {
    #[serde(default)]
    pub initialise: Vec<String>,
    #[serde(default)]
    pub upgrade: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct InstanceConfig {
    #[serde(default)]
    pub domains: Vec<String>,
}

impl DevopsConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_overrides(|key| std::env::var(key).ok());

        validate::validate(&config)?;

        Ok(config)
    }

    /// Environment variables win over the file: `REPO`, `PROJECT`, `APP`,
    /// `DB_USER`, `DB_PASSWORD`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(repo) = set("REPO") {
            self.project.repo = repo;
        }
        if let Some(project) = set("PROJECT") {
            self.project.project = project;
        }
        if let Some(app) = set("APP") {
            self.project.app = Some(app);
        }
        if let Some(user) = set("DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = set("DB_PASSWORD") {
            self.database.password = Some(password);
        }
    }

    pub fn app(&self) -> &str {
        self.project
            .app
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.project.repo)
    }

    pub fn git_remote(&self) -> String {
        self.project
            .git_remote
            .replace("{organization}", &self.project.organization)
            .replace("{project}", &self.project.project)
            .replace("{repo}", &self.project.repo)
    }

    pub fn domains(&self, instance: &str) -> &[String] {
        self.instances
            .get(instance)
            .map(|i| i.domains.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[project]
project = "links-creative"
repo = "links-creative-site"

[host]
address = "example.net"
port = 22734
"#;

    #[test]
    fn defaults_fill_optional_sections() {
        let config: DevopsConfig = toml::from_str(MINIMAL).unwrap();

        assert_eq!(config.host.user, "wsgi");
        assert_eq!(config.paths.srv_root, "/srv");
        assert_eq!(config.paths.env_root, "/env");
        assert_eq!(config.application.kind, "web-app");
        assert_eq!(config.database.adapter, "mysql");
        assert_eq!(config.app(), "links-creative-site");
        assert!(config.domains("live").is_empty());
    }

    #[test]
    fn git_remote_template_is_expanded() {
        let config: DevopsConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(
            config.git_remote(),
            "git@github.com:links-creative/links-creative-site.git"
        );
    }

    #[test]
    fn git_remote_template_can_name_organization() {
        let mut config: DevopsConfig = toml::from_str(MINIMAL).unwrap();
        config.project.organization = "linkscreative".to_string();
        config.project.git_remote =
            "git@codebasehq.com:{organization}/{project}/{repo}.git".to_string();
        assert_eq!(
            config.git_remote(),
            "git@codebasehq.com:linkscreative/links-creative/links-creative-site.git"
        );
    }

    #[test]
    fn environment_overrides_win() {
        let mut config: DevopsConfig = toml::from_str(MINIMAL).unwrap();
        config.apply_overrides(|key| match key {
            "APP" => Some("site".to_string()),
            "DB_PASSWORD" => Some("admin-pw".to_string()),
            "REPO" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.app(), "site");
        assert_eq!(config.project.repo, "links-creative-site");
        assert_eq!(config.database.password.as_deref(), Some("admin-pw"));
    }

    #[test]
    fn load_reads_and_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devops.toml");
        std::fs::write(
            &path,
            format!("{}\n[instances.live]\ndomains = [\"example.com\"]\n", MINIMAL),
        )
        .unwrap();

        let config = DevopsConfig::load(&path).unwrap();
        assert_eq!(config.domains("live"), ["example.com".to_string()]);
    }

    #[test]
    fn load_rejects_unknown_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devops.toml");
        std::fs::write(&path, format!("{}\n[database]\nadapter = \"sqlite\"\n", MINIMAL)).unwrap();

        let err = DevopsConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("sqlite"));
    }
}
