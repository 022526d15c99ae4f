use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use minijinja::{path_loader, Environment};
use serde::Serialize;

use crate::config::ApplicationKind;

const NGINX_TEMPLATE: &str = include_str!("../../templates/nginx.conf.j2");
const UWSGI_TEMPLATE: &str = include_str!("../../templates/uwsgi.ini.j2");

/// A configuration artifact the workflow can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigKind {
    Nginx,
    Uwsgi,
}

impl ConfigKind {
    pub fn name(self) -> &'static str {
        match self {
            ConfigKind::Nginx => "nginx",
            ConfigKind::Uwsgi => "uwsgi",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ConfigKind::Nginx => "conf",
            ConfigKind::Uwsgi => "ini",
        }
    }

    /// File name in the instance's working directory.
    pub fn file_name(self) -> String {
        format!("{}.{}", self.name(), self.extension())
    }

    /// The uwsgi config embeds the instance's environment, credentials
    /// included.
    pub fn holds_secrets(self) -> bool {
        matches!(self, ConfigKind::Uwsgi)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceEntry {
    pub name: String,
    pub domains: Vec<String>,
    pub directory: String,
    pub virtualenv: String,
    /// File uwsgi watches to reload its workers.
    pub reload_sentinel: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigRequest {
    pub kind: ConfigKind,
    pub application: ApplicationKind,
    pub app: String,
    /// Exported into the process manager's environment.
    pub env: BTreeMap<String, String>,
}

/// Everything the templates know about a site.
#[derive(Debug, Clone, Serialize)]
pub struct SiteDescription {
    pub instances: Vec<InstanceEntry>,
    pub configs: Vec<ConfigRequest>,
}

impl SiteDescription {
    pub fn new(instance: InstanceEntry) -> Self {
        Self {
            instances: vec![instance],
            configs: Vec::new(),
        }
    }

    pub fn with_config(mut self, request: ConfigRequest) -> Self {
        self.configs.push(request);
        self
    }

    pub fn instance(&self, name: &str) -> Option<&InstanceEntry> {
        self.instances.iter().find(|i| i.name == name)
    }

    pub fn config(&self, kind: ConfigKind) -> Option<&ConfigRequest> {
        self.configs.iter().find(|c| c.kind == kind)
    }
}

/// Turns a site description into configuration file text.
pub trait ConfigRenderer: Send + Sync {
    fn render(
        &self,
        repo: &str,
        site: &SiteDescription,
        instance: &InstanceEntry,
        config: &ConfigRequest,
        extension: &str,
    ) -> Result<String>;
}

/// Select the entries for `instance_name` and `kind`, then render.
pub fn render_artifact(
    renderer: &dyn ConfigRenderer,
    repo: &str,
    site: &SiteDescription,
    instance_name: &str,
    kind: ConfigKind,
) -> Result<String> {
    let instance = site
        .instance(instance_name)
        .with_context(|| format!("Site has no entry for instance '{}'", instance_name))?;
    let config = site
        .config(kind)
        .with_context(|| format!("Site has no {} config request", kind.name()))?;

    renderer.render(repo, site, instance, config, kind.extension())
}

fn bundled(name: &str) -> Option<&'static str> {
    match name {
        "nginx.conf.j2" => Some(NGINX_TEMPLATE),
        "uwsgi.ini.j2" => Some(UWSGI_TEMPLATE),
        _ => None,
    }
}

/// minijinja renderer over `<kind>.<extension>.j2` templates. Files in the
/// override directory shadow the bundled templates of the same name.
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        let mut env = Environment::new();
        let from_dir = override_dir.map(path_loader);

        env.set_loader(move |name| {
            if let Some(load) = &from_dir {
                if let Some(source) = load(name)? {
                    return Ok(Some(source));
                }
            }
            Ok(bundled(name).map(str::to_string))
        });

        Self { env }
    }
}

impl ConfigRenderer for TemplateRenderer {
    fn render(
        &self,
        repo: &str,
        site: &SiteDescription,
        instance: &InstanceEntry,
        config: &ConfigRequest,
        extension: &str,
    ) -> Result<String> {
        let name = format!("{}.{}.j2", config.kind.name(), extension);
        let tmpl = self
            .env
            .get_template(&name)
            .with_context(|| format!("Failed to load template {}", name))?;

        let rendered = tmpl
            .render(minijinja::context! {
                repo => repo,
                site => site,
                instance => instance,
                config => config,
            })
            .with_context(|| format!("Failed to render {}", name))?;

        Ok(rendered)
    }
}
