//! User and role queries

use crate::error::Result;
use serde::Serialize;
use sqlx::SqliteConnection;

/// Values for a new `user` row
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub cas_id: Option<String>,
    pub is_deleted: bool,
}

/// Insert a role unless it exists, returning its id either way
pub async fn upsert_role(
    conn: &mut SqliteConnection,
    name: &str,
    description: &str,
) -> Result<i64> {
    sqlx::query("INSERT INTO role (name, description) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .bind(description)
        .execute(&mut *conn)
        .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM role WHERE name = ?")
        .bind(name)
        .fetch_one(conn)
        .await?;
    Ok(id)
}

pub async fn find_role_id(conn: &mut SqliteConnection, name: &str) -> Result<Option<i64>> {
    let id = sqlx::query_scalar("SELECT id FROM role WHERE name = ?")
        .bind(name)
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

/// Insert a user and return its id
pub async fn insert_user(conn: &mut SqliteConnection, user: &NewUser) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO "user" (username, email, name, cas_id, is_deleted)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.cas_id)
    .bind(user.is_deleted)
    .execute(conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn find_user_id_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<i64>> {
    let id = sqlx::query_scalar(r#"SELECT id FROM "user" WHERE username = ?"#)
        .bind(username)
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

/// Grant a role to a user (idempotent)
pub async fn assign_role(conn: &mut SqliteConnection, user_id: i64, role_id: i64) -> Result<()> {
    sqlx::query("INSERT INTO user_role (user_id, role_id) VALUES (?, ?) ON CONFLICT DO NOTHING")
        .bind(user_id)
        .bind(role_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Role names held by a user, alphabetically
pub async fn user_roles(conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<String>> {
    let roles = sqlx::query_scalar(
        r#"
        SELECT r.name FROM role r
        JOIN user_role ur ON ur.role_id = r.id
        WHERE ur.user_id = ?
        ORDER BY r.name
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(roles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::tests::setup_test_db;

    #[tokio::test]
    async fn test_roles_and_users() {
        let (db, _tmp) = setup_test_db().await;
        let mut tx = db.begin().await.unwrap();

        let admin = upsert_role(&mut tx, "admin", "Administrator").await.unwrap();
        assert_eq!(upsert_role(&mut tx, "admin", "again").await.unwrap(), admin);
        assert_eq!(find_role_id(&mut tx, "admin").await.unwrap(), Some(admin));
        assert_eq!(find_role_id(&mut tx, "nobody").await.unwrap(), None);

        let user = NewUser {
            username: "alice".to_string(),
            email: "alice@example.org".to_string(),
            name: Some("Alice".to_string()),
            cas_id: None,
            is_deleted: false,
        };
        let id = insert_user(&mut tx, &user).await.unwrap();
        assert!(insert_user(&mut tx, &user).await.unwrap_err().is_record_level());

        assign_role(&mut tx, id, admin).await.unwrap();
        assign_role(&mut tx, id, admin).await.unwrap();
        assert_eq!(user_roles(&mut tx, id).await.unwrap(), vec!["admin"]);
        assert_eq!(
            find_user_id_by_username(&mut tx, "alice").await.unwrap(),
            Some(id)
        );
    }
}
