use anyhow::{bail, Context, Result};
use dialoguer::{Input, Select};
use minijinja::Environment;
use std::path::Path;

use crate::config::DevopsConfig;

const TEMPLATE: &str = include_str!("../../templates/devops.toml.j2");

struct Answers {
    project: String,
    repo: String,
    app: String,
    address: String,
    domain: String,
    kind: &'static str,
    adapter: &'static str,
}

pub fn run(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        bail!("{} already exists", config_path.display());
    }

    let remote = detect_git_remote();
    let (default_project, default_repo) = remote
        .as_deref()
        .and_then(split_remote)
        .unwrap_or_else(|| (String::new(), current_dir_name()));

    let project: String = Input::new()
        .with_prompt("Project (repository owner)")
        .default(default_project)
        .interact_text()?;

    let repo: String = Input::new()
        .with_prompt("Repository name")
        .default(default_repo)
        .interact_text()?;

    let app: String = Input::new()
        .with_prompt("Django package")
        .default(repo.replace('-', "_"))
        .interact_text()?;

    let address: String = Input::new().with_prompt("Host address").interact_text()?;

    let domain: String = Input::new()
        .with_prompt("Primary domain")
        .interact_text()?;

    let kinds = ["web-app", "static"];
    let kind = kinds[Select::new()
        .with_prompt("Application")
        .items(&kinds)
        .default(0)
        .interact()?];

    let adapters = ["mysql", "postgres"];
    let adapter = adapters[Select::new()
        .with_prompt("Database")
        .items(&adapters)
        .default(0)
        .interact()?];

    let content = render(&Answers {
        project,
        repo,
        app,
        address,
        domain,
        kind,
        adapter,
    })?;

    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    crate::output::success(&format!("Created {}", config_path.display()));
    crate::output::info("Set DB_PASSWORD before running initialise.");

    Ok(())
}

fn render(answers: &Answers) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("devops.toml", TEMPLATE)?;
    let tmpl = env.get_template("devops.toml")?;
    let content = tmpl.render(minijinja::context! {
        project => &answers.project,
        repo => &answers.repo,
        app => &answers.app,
        address => &answers.address,
        domain => &answers.domain,
        kind => answers.kind,
        adapter => answers.adapter,
    })?;

    toml::from_str::<DevopsConfig>(&content).context("Generated config does not parse")?;
    Ok(content)
}

fn current_dir_name() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "site".to_string())
}

/// `git@github.com:owner/repo.git` or `https://github.com/owner/repo` into
/// `(owner, repo)`.
fn split_remote(url: &str) -> Option<(String, String)> {
    let path = url.trim_end_matches('/').trim_end_matches(".git");
    let mut parts = path.rsplit(['/', ':']);
    let repo = parts.next().filter(|s| !s.is_empty())?;
    let owner = parts.next().filter(|s| !s.is_empty())?;
    Some((owner.to_string(), repo.to_string()))
}

fn detect_git_remote() -> Option<String> {
    let output = std::process::Command::new("git")
        .args(["remote", "get-url", "origin"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remotes_split_into_owner_and_repo() {
        assert_eq!(
            split_remote("git@github.com:links-creative/site.git"),
            Some(("links-creative".to_string(), "site".to_string()))
        );
        assert_eq!(
            split_remote("https://github.com/links-creative/site/"),
            Some(("links-creative".to_string(), "site".to_string()))
        );
        assert_eq!(split_remote("site"), None);
    }

    #[test]
    fn scaffold_parses_as_config() {
        let content = render(&Answers {
            project: "links-creative".to_string(),
            repo: "site".to_string(),
            app: "site".to_string(),
            address: "example.net".to_string(),
            domain: "example.com".to_string(),
            kind: "web-app",
            adapter: "postgres",
        })
        .unwrap();

        let config: DevopsConfig = toml::from_str(&content).unwrap();
        assert_eq!(config.git_remote(), "git@github.com:links-creative/site.git");
        assert_eq!(config.database.adapter, "postgres");
        assert_eq!(config.domains("test"), ["test.example.com".to_string()]);
        assert!(config.project.app.is_none());
    }
}
