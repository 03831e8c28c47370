//! Roles and user accounts

use super::{ConvertContext, PassStats};
use crate::config::BIOLOOP_ROLES;
use crate::error::{Error, Result};
use crate::progress::PassProgress;
use crate::source::SourceUser;
use crate::target::{
    assign_role, find_role_id, find_user_id_by_username, insert_user, upsert_role, NewUser,
};
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info};

/// Create the Bioloop roles
pub async fn seed_roles(conn: &mut SqliteConnection) -> Result<PassStats> {
    let mut stats = PassStats::new("roles");

    for &(name, description) in BIOLOOP_ROLES {
        let mut savepoint = conn.begin().await?;
        let outcome = upsert_role(&mut savepoint, name, description).await;
        stats.settle(savepoint, outcome, name, Some(name)).await?;
    }

    info!("Seeded {} roles", stats.converted);
    Ok(stats)
}

/// Migrate CMG users, then add the service account
pub async fn convert_users(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
) -> Result<PassStats> {
    let mut stats = PassStats::new("users");
    let users = &ctx.snapshot.users;
    let progress = PassProgress::start(users.len(), "users");

    for user in users {
        let mut savepoint = conn.begin().await?;
        let outcome = insert_cmg_user(&mut savepoint, ctx, user).await;
        stats
            .settle(savepoint, outcome, &user.id, user.username.as_deref())
            .await?;
        progress.advance();
    }
    progress.finish("users done");

    let mut savepoint = conn.begin().await?;
    let outcome = ensure_service_account(&mut savepoint, ctx).await;
    let username = ctx.config.accounts.service_username.clone();
    stats
        .settle(savepoint, outcome, &username, Some(username.as_str()))
        .await?;

    info!(
        "Migrated {} users ({} skipped)",
        stats.converted,
        stats.skipped.len()
    );
    Ok(stats)
}

async fn insert_cmg_user(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
    user: &SourceUser,
) -> Result<i64> {
    let username = user.username.clone().ok_or(Error::MissingField {
        entity: "user",
        field: "username",
    })?;
    let email = user.email.clone().ok_or(Error::MissingField {
        entity: "user",
        field: "email",
    })?;

    let id = insert_user(
        conn,
        &NewUser {
            username,
            email,
            name: user.fullname.clone(),
            cas_id: user.cas_id.clone(),
            // Accounts without an `active` flag were never activated
            is_deleted: !user.active.unwrap_or(false),
        },
    )
    .await?;

    grant_roles(conn, ctx, id, &user.roles).await?;
    Ok(id)
}

/// Create the service account unless a CMG user already took its name
async fn ensure_service_account(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
) -> Result<i64> {
    let accounts = &ctx.config.accounts;

    let id = match find_user_id_by_username(conn, &accounts.service_username).await? {
        Some(id) => {
            debug!("Reusing existing user '{}' as service account", accounts.service_username);
            id
        }
        None => {
            insert_user(
                conn,
                &NewUser {
                    username: accounts.service_username.clone(),
                    email: accounts.service_email.clone(),
                    name: Some(accounts.service_name.clone()),
                    cas_id: None,
                    is_deleted: false,
                },
            )
            .await?
        }
    };

    grant_roles(conn, ctx, id, &accounts.service_roles).await?;
    Ok(id)
}

/// Map CMG role names to Bioloop roles and grant them
async fn grant_roles(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
    user_id: i64,
    cmg_roles: &[String],
) -> Result<()> {
    for cmg_role in cmg_roles {
        let Some(bioloop_role) = ctx.config.roles.get(cmg_role) else {
            debug!("No Bioloop role for CMG role '{}'", cmg_role);
            continue;
        };

        match find_role_id(conn, bioloop_role).await? {
            Some(role_id) => assign_role(conn, user_id, role_id).await?,
            None => debug!("Role '{}' has not been seeded", bioloop_role),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::source::SourceSnapshot;
    use crate::target::tests::setup_test_db;
    use crate::target::user_roles;

    fn user(id: &str, username: Option<&str>, roles: &[&str], active: Option<bool>) -> SourceUser {
        SourceUser {
            id: id.to_string(),
            username: username.map(str::to_string),
            email: username.map(|u| format!("{}@example.org", u)),
            fullname: None,
            cas_id: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            active,
        }
    }

    #[tokio::test]
    async fn test_users_roles_and_service_account() {
        let (db, _tmp) = setup_test_db().await;
        let config = Config::default();
        let snapshot = SourceSnapshot {
            users: vec![
                user("u1", Some("alice"), &["god", "unknown"], Some(true)),
                user("u2", Some("bob"), &["guest"], None),
                user("u3", None, &[], Some(true)),
                user("u4", Some("alice"), &[], Some(true)),
            ],
            ..Default::default()
        };
        let ctx = ConvertContext::new(&config, &snapshot);

        let mut tx = db.begin().await.unwrap();
        let roles = seed_roles(&mut tx).await.unwrap();
        assert_eq!(roles.converted, BIOLOOP_ROLES.len());

        let stats = convert_users(&mut tx, &ctx).await.unwrap();
        // alice, bob and the service account
        assert_eq!(stats.converted, 3);
        let reasons: Vec<_> = stats.skipped.iter().map(|s| s.reason.as_str()).collect();
        assert_eq!(reasons, vec!["missing-field", "constraint"]);

        let alice = find_user_id_by_username(&mut tx, "alice").await.unwrap().unwrap();
        assert_eq!(user_roles(&mut tx, alice).await.unwrap(), vec!["admin"]);

        let bob_deleted: bool =
            sqlx::query_scalar(r#"SELECT is_deleted FROM "user" WHERE username = 'bob'"#)
                .fetch_one(&mut *tx)
                .await
                .unwrap();
        assert!(bob_deleted);

        let service = ctx.service_user_id(&mut tx).await.unwrap().unwrap();
        assert_eq!(user_roles(&mut tx, service).await.unwrap(), vec!["admin"]);
        assert_eq!(ctx.user_id_for(&mut tx, "u1").await.unwrap(), Some(alice));
    }
}
