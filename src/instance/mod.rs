use std::collections::BTreeMap;
use std::fmt;

use crate::config::PathsConfig;
use crate::error::ConfigurationError;
use crate::secrets::Secrets;
use crate::shell::{quote, Cmd};

/// Who is being deployed where. Every field is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity {
    pub project: String,
    pub repo: String,
    pub app: String,
    pub instance: String,
}

impl InstanceIdentity {
    /// Fail with the first missing field, in the order app, repo,
    /// instance, project.
    pub fn validate(self) -> Result<Self, ConfigurationError> {
        let fields = [
            ("APP", &self.app),
            ("REPO", &self.repo),
            ("Instance", &self.instance),
            ("PROJECT", &self.project),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ConfigurationError::MissingField(name));
            }
        }

        Ok(self)
    }

    pub fn paths(&self, roots: &PathsConfig) -> InstancePaths {
        InstancePaths {
            directory: format!("{}/{}/{}", roots.srv_root, self.repo, self.instance),
            virtualenv: format!("{}/{}/{}", roots.env_root, self.repo, self.instance),
        }
    }

    pub fn settings_variant(&self) -> SettingsVariant {
        SettingsVariant::for_instance(&self.instance)
    }
}

/// Where an instance lives on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePaths {
    /// Checkout of the repository.
    pub directory: String,
    /// Isolated Python runtime environment.
    pub virtualenv: String,
}

impl InstancePaths {
    pub fn activate_script(&self) -> String {
        format!("{}/bin/activate", self.virtualenv)
    }

    pub fn activate(&self) -> Cmd {
        Cmd::new("source").arg(self.activate_script())
    }

    /// Shell-sourceable `export` file, sourced by the activate script.
    pub fn env_file(&self) -> String {
        format!("{}/bin/postactivate", self.virtualenv)
    }

    pub fn bin(&self, tool: &str) -> String {
        format!("{}/bin/{}", self.virtualenv, tool)
    }
}

/// Django settings module suffix picked from the instance name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsVariant {
    Production,
    Local,
    Named(String),
}

impl SettingsVariant {
    pub fn for_instance(instance: &str) -> Self {
        match instance {
            "live" => SettingsVariant::Production,
            "test" => SettingsVariant::Local,
            other => SettingsVariant::Named(other.to_string()),
        }
    }
}

impl fmt::Display for SettingsVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsVariant::Production => f.write_str("production"),
            SettingsVariant::Local => f.write_str("local"),
            SettingsVariant::Named(name) => f.write_str(name),
        }
    }
}

/// Variables exported into the activated runtime environment.
pub fn environment_variables(
    identity: &InstanceIdentity,
    secrets: &Secrets,
    database: &str,
    db_user: &str,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "DJANGO_SETTINGS_MODULE".to_string(),
            format!("{}.settings.{}", identity.app, identity.settings_variant()),
        ),
        ("DJANGO_DB_NAME".to_string(), database.to_string()),
        ("DJANGO_DB_USER".to_string(), db_user.to_string()),
        (
            "DJANGO_DB_PASSWORD".to_string(),
            secrets.db_password.clone(),
        ),
        ("DJANGO_SECRET_KEY".to_string(), secrets.secret_key.clone()),
    ])
}

/// One `export KEY=value` line per variable, values shell-quoted.
pub fn render_env_file(variables: &BTreeMap<String, String>, generated_at: &str) -> String {
    let mut out = format!("# Managed by devops, generated {}\n", generated_at);
    for (key, value) in variables {
        out.push_str(&format!("export {}={}\n", key, quote(value)));
    }
    out
}

/// Read back a file written by [`render_env_file`].
pub fn parse_env_file(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("export "))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), crate::shell::unquote(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(instance: &str) -> InstanceIdentity {
        InstanceIdentity {
            project: "links-creative".to_string(),
            repo: "links-creative-site".to_string(),
            app: "site".to_string(),
            instance: instance.to_string(),
        }
    }

    fn secrets() -> Secrets {
        Secrets {
            db_password: "pa$$ word".to_string(),
            secret_key: "k'ey".to_string(),
        }
    }

    #[test]
    fn validate_accepts_complete_identity() {
        assert!(identity("live").validate().is_ok());
    }

    #[test]
    fn validate_names_the_missing_field() {
        let cases: [(fn(&mut InstanceIdentity), &str); 4] = [
            (|i| i.app.clear(), "APP"),
            (|i| i.repo.clear(), "REPO"),
            (|i| i.instance.clear(), "Instance"),
            (|i| i.project.clear(), "PROJECT"),
        ];

        for (clear, field) in cases {
            let mut id = identity("live");
            clear(&mut id);
            assert_eq!(id.validate(), Err(ConfigurationError::MissingField(field)));
        }
    }

    #[test]
    fn paths_are_keyed_by_repo_and_instance() {
        let paths = identity("test").paths(&PathsConfig::default());
        assert_eq!(paths.directory, "/srv/links-creative-site/test");
        assert_eq!(paths.virtualenv, "/env/links-creative-site/test");
        assert_eq!(paths.env_file(), "/env/links-creative-site/test/bin/postactivate");
    }

    #[test]
    fn settings_variant_follows_instance_name() {
        assert_eq!(SettingsVariant::for_instance("live"), SettingsVariant::Production);
        assert_eq!(SettingsVariant::for_instance("test"), SettingsVariant::Local);
        assert_eq!(
            SettingsVariant::for_instance("staging").to_string(),
            "staging"
        );
    }

    #[test]
    fn environment_selects_settings_module() {
        let vars = environment_variables(&identity("test"), &secrets(), "db", "user");
        assert_eq!(vars["DJANGO_SETTINGS_MODULE"], "site.settings.local");

        let vars = environment_variables(&identity("live"), &secrets(), "db", "user");
        assert_eq!(vars["DJANGO_SETTINGS_MODULE"], "site.settings.production");
        assert_eq!(vars["DJANGO_DB_PASSWORD"], "pa$$ word");
    }

    #[test]
    fn env_file_quotes_every_value_and_reads_back() {
        let vars = environment_variables(&identity("live"), &secrets(), "db", "user");
        let content = render_env_file(&vars, "2026-01-01T00:00:00Z");

        assert!(content.contains("export DJANGO_DB_PASSWORD='pa$$ word'\n"));
        assert!(content.contains("export DJANGO_SECRET_KEY='k'\\''ey'\n"));
        assert_eq!(parse_env_file(&content), vars);
    }
}
