use anyhow::{Context, Result};

use super::DatabaseCredential;
use crate::remote::Remote;
use crate::shell::Cmd;

fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn psql(credential: &DatabaseCredential, sql: String, secret: bool) -> Cmd {
    let cmd = Cmd::new("psql")
        .secret_env("PGPASSWORD", &credential.admin_password)
        .args([
            "-h",
            credential.host.as_str(),
            "-U",
            credential.admin_user.as_str(),
            "-d",
            "postgres",
            "-v",
            "ON_ERROR_STOP=1",
            "-tAc",
        ]);

    if secret {
        cmd.secret_arg(sql)
    } else {
        cmd.arg(sql)
    }
}

/// Postgres has no `CREATE USER IF NOT EXISTS`; the role is created or has
/// its password replaced in one block, which rotates the credential the
/// same way dropping and recreating the MySQL user does.
pub(super) async fn provision(remote: &Remote<'_>, credential: &DatabaseCredential) -> Result<()> {
    let role = identifier(&credential.user);
    let db = identifier(&credential.database);
    let password = literal(&credential.password);

    let upsert_role = format!(
        "DO $$ BEGIN \
         IF EXISTS (SELECT FROM pg_roles WHERE rolname = {name}) THEN \
         ALTER ROLE {role} WITH LOGIN PASSWORD {password}; \
         ELSE CREATE ROLE {role} WITH LOGIN PASSWORD {password}; \
         END IF; END $$;",
        name = literal(&credential.user),
        role = role,
        password = password,
    );
    remote
        .run(&psql(credential, upsert_role, true))
        .await
        .with_context(|| format!("Failed to create database role {}", credential.user))?;

    let existing = remote
        .run(&psql(
            credential,
            format!(
                "SELECT 1 FROM pg_database WHERE datname = {};",
                literal(&credential.database)
            ),
            false,
        ))
        .await
        .context("Failed to look up existing databases")?;

    if existing.trim() != "1" {
        remote
            .run(&psql(
                credential,
                format!("CREATE DATABASE {} OWNER {};", db, role),
                false,
            ))
            .await
            .with_context(|| format!("Failed to create database {}", credential.database))?;
    }

    remote
        .run(&psql(
            credential,
            format!("GRANT ALL PRIVILEGES ON DATABASE {} TO {};", db, role),
            false,
        ))
        .await
        .with_context(|| format!("Failed to grant {} on {}", credential.user, credential.database))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DbAdapter;
    use crate::testing::FakeRemote;

    fn credential() -> DatabaseCredential {
        DatabaseCredential {
            adapter: DbAdapter::Postgres,
            host: "db.internal".to_string(),
            admin_user: "postgres".to_string(),
            admin_password: "admin-pw".to_string(),
            database: "app_test".to_string(),
            user: "app_test".to_string(),
            password: "n3w-pass".to_string(),
        }
    }

    #[tokio::test]
    async fn creates_missing_database() {
        let fake = FakeRemote::new();
        provision(&Remote::new(&fake), &credential()).await.unwrap();

        let scripts = fake.scripts();
        assert_eq!(scripts.len(), 4);
        assert!(scripts[0].contains("CREATE ROLE"));
        assert!(scripts[2].contains("CREATE DATABASE"));
        assert!(scripts[3].contains("GRANT ALL PRIVILEGES"));
        assert!(scripts.iter().all(|s| s.starts_with("PGPASSWORD=admin-pw psql -h db.internal")));
    }

    #[tokio::test]
    async fn skips_create_when_database_exists() {
        let fake = FakeRemote::new();
        fake.respond("FROM pg_database", "1\n");
        provision(&Remote::new(&fake), &credential()).await.unwrap();

        assert!(!fake.ran("CREATE DATABASE"));
        assert!(fake.ran("GRANT ALL PRIVILEGES"));
    }
}
