mod mysql;
mod postgres;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;

use crate::config::DatabaseConfig;
use crate::error::ConfigurationError;
use crate::instance::InstanceIdentity;
use crate::remote::Remote;
use crate::secrets::Secrets;

/// Longest user name issued to any adapter. MySQL 5.7+ caps user names at
/// 32 characters; Postgres allows 63.
pub const MAX_USER_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbAdapter {
    Mysql,
    Postgres,
}

impl FromStr for DbAdapter {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" => Ok(DbAdapter::Mysql),
            "postgres" => Ok(DbAdapter::Postgres),
            other => Err(ConfigurationError::UnsupportedAdapter(other.to_string())),
        }
    }
}

impl fmt::Display for DbAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DbAdapter::Mysql => "mysql",
            DbAdapter::Postgres => "postgres",
        })
    }
}

pub fn database_name(repo: &str, instance: &str) -> String {
    format!("{}_{}", repo, instance)
}

pub fn user_name(repo: &str, instance: &str) -> String {
    database_name(repo, instance)
        .chars()
        .take(MAX_USER_LEN)
        .collect()
}

/// The control-plane password, which must be set before any workflow that
/// provisions a database starts.
pub fn admin_password(config: &DatabaseConfig) -> Result<&str, ConfigurationError> {
    config
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or(ConfigurationError::MissingDatabasePassword)
}

/// Everything needed to create one instance's database and owner.
#[derive(Clone)]
pub struct DatabaseCredential {
    pub adapter: DbAdapter,
    pub host: String,
    pub admin_user: String,
    pub admin_password: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl DatabaseCredential {
    pub fn for_instance(
        config: &DatabaseConfig,
        adapter: DbAdapter,
        identity: &InstanceIdentity,
        secrets: &Secrets,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            adapter,
            host: config.host.clone(),
            admin_user: config.user.clone(),
            admin_password: admin_password(config)?.to_string(),
            database: database_name(&identity.repo, &identity.instance),
            user: user_name(&identity.repo, &identity.instance),
            password: secrets.db_password.clone(),
        })
    }
}

impl fmt::Debug for DatabaseCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredential")
            .field("adapter", &self.adapter)
            .field("host", &self.host)
            .field("admin_user", &self.admin_user)
            .field("database", &self.database)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Create the database if needed and (re)issue its user with the freshly
/// generated password.
pub async fn provision(remote: &Remote<'_>, credential: &DatabaseCredential) -> Result<()> {
    match credential.adapter {
        DbAdapter::Mysql => mysql::provision(remote, credential).await,
        DbAdapter::Postgres => postgres::provision(remote, credential).await,
    }
}
