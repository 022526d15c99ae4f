use anyhow::{Context, Result};

use super::DatabaseCredential;
use crate::remote::Remote;
use crate::shell::Cmd;

/// Host part of the per-instance account; the app connects locally.
const CLIENT_HOST: &str = "localhost";

fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

fn identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn account(credential: &DatabaseCredential) -> String {
    format!("{}@{}", literal(&credential.user), literal(CLIENT_HOST))
}

/// `mysql -e <sql>` as the control-plane user. The admin password travels
/// in `MYSQL_PWD` so it never shows up in the process list.
fn statement(credential: &DatabaseCredential, sql: String, secret: bool) -> Cmd {
    let cmd = Cmd::new("mysql")
        .secret_env("MYSQL_PWD", &credential.admin_password)
        .args(["-h", credential.host.as_str(), "-u", credential.admin_user.as_str(), "-e"]);

    if secret {
        cmd.secret_arg(sql)
    } else {
        cmd.arg(sql)
    }
}

pub(super) fn statements(credential: &DatabaseCredential) -> [Cmd; 4] {
    let db = identifier(&credential.database);
    let user = account(credential);

    [
        statement(
            credential,
            format!("CREATE DATABASE IF NOT EXISTS {};", db),
            false,
        ),
        statement(credential, format!("DROP USER {};", user), false),
        statement(
            credential,
            format!(
                "CREATE USER {} IDENTIFIED BY {};",
                user,
                literal(&credential.password)
            ),
            true,
        ),
        statement(credential, format!("GRANT ALL ON {}.* TO {};", db, user), false),
    ]
}

pub(super) async fn provision(remote: &Remote<'_>, credential: &DatabaseCredential) -> Result<()> {
    let [create_db, drop_user, create_user, grant] = statements(credential);

    remote
        .run(&create_db)
        .await
        .with_context(|| format!("Failed to create database {}", credential.database))?;

    // The user does not exist on a first run.
    remote.run_tolerant(&drop_user).await?;

    remote
        .run(&create_user)
        .await
        .with_context(|| format!("Failed to create database user {}", credential.user))?;

    remote
        .run(&grant)
        .await
        .with_context(|| format!("Failed to grant {} on {}", credential.user, credential.database))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DbAdapter;
    use crate::shell::quote;
    use crate::testing::FakeRemote;

    fn credential() -> DatabaseCredential {
        DatabaseCredential {
            adapter: DbAdapter::Mysql,
            host: "localhost".to_string(),
            admin_user: "root".to_string(),
            admin_password: "admin-pw".to_string(),
            database: "app_live".to_string(),
            user: "app_live".to_string(),
            password: "n3w-pass".to_string(),
        }
    }

    #[tokio::test]
    async fn issues_ddl_in_order() {
        let fake = FakeRemote::new();
        provision(&Remote::new(&fake), &credential()).await.unwrap();

        let scripts = fake.scripts();
        assert_eq!(scripts.len(), 4);
        assert!(scripts[0].ends_with(&quote("CREATE DATABASE IF NOT EXISTS `app_live`;")));
        assert!(scripts[1].ends_with(&quote("DROP USER 'app_live'@'localhost';")));
        assert!(scripts[2].ends_with(&quote(
            "CREATE USER 'app_live'@'localhost' IDENTIFIED BY 'n3w-pass';"
        )));
        assert!(scripts[3].ends_with(&quote("GRANT ALL ON `app_live`.* TO 'app_live'@'localhost';")));
        assert!(scripts.iter().all(|s| s.starts_with("MYSQL_PWD=admin-pw mysql -h localhost -u root -e ")));
    }

    #[tokio::test]
    async fn missing_user_does_not_stop_provisioning() {
        let fake = FakeRemote::new();
        fake.fail_when("DROP USER");
        provision(&Remote::new(&fake), &credential()).await.unwrap();

        assert!(fake.ran("GRANT ALL"));
    }

    #[tokio::test]
    async fn create_user_failure_is_fatal() {
        let fake = FakeRemote::new();
        fake.fail_when("CREATE USER");
        let err = provision(&Remote::new(&fake), &credential()).await.unwrap_err();

        assert!(err.to_string().contains("Failed to create database user app_live"));
        assert!(!fake.ran("GRANT ALL"));
    }

    #[test]
    fn password_is_redacted_when_shown() {
        let [_, _, create_user, _] = statements(&credential());
        assert!(!create_user.redacted().contains("n3w-pass"));
        assert!(!create_user.redacted().contains("admin-pw"));
    }
}
