use thiserror::Error;

/// A precondition the operator must fix before anything touches the host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{0} not defined")]
    MissingField(&'static str),

    #[error("No domains configured for instance '{0}'")]
    MissingDomains(String),

    #[error("Unsupported database adapter '{0}'. Supported: mysql, postgres")]
    UnsupportedAdapter(String),

    #[error("Unsupported application kind '{0}'. Supported: web-app, static")]
    UnsupportedApplication(String),

    #[error("Database control-plane password not set (database.password or DB_PASSWORD)")]
    MissingDatabasePassword,

    #[error("host.address cannot be empty")]
    MissingHost,
}

/// A remote command that ran to completion but exited non-zero.
#[derive(Debug, Error)]
#[error("Command failed on {host} (exit {status}): {command}\nstdout: {stdout}\nstderr: {stderr}")]
pub struct RemoteCommandFailure {
    pub host: String,
    /// Rendered command line with secret words masked.
    pub command: String,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

/// A local command (git) that exited non-zero.
#[derive(Debug, Error)]
#[error("Local command failed (exit {status}): {command}\n{stderr}")]
pub struct LocalCommandFailure {
    pub command: String,
    pub status: String,
    pub stderr: String,
}

pub fn describe_status(code: Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}
