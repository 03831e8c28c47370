//! Project and about-page queries

use crate::error::Result;
use serde::Serialize;
use sqlx::SqliteConnection;

/// Values for a new `project` row
#[derive(Debug, Clone, Serialize)]
pub struct NewProject {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub browser_enabled: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

pub async fn slug_exists(conn: &mut SqliteConnection, slug: &str) -> Result<bool> {
    let result: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM project WHERE slug = ?")
        .bind(slug)
        .fetch_optional(conn)
        .await?;
    Ok(result.is_some())
}

/// Insert a project; missing timestamps default to the current time
pub async fn insert_project(conn: &mut SqliteConnection, project: &NewProject) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO project (id, name, slug, description, browser_enabled, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, COALESCE(?, CURRENT_TIMESTAMP), COALESCE(?, CURRENT_TIMESTAMP))
        "#,
    )
    .bind(&project.id)
    .bind(&project.name)
    .bind(&project.slug)
    .bind(&project.description)
    .bind(project.browser_enabled)
    .bind(&project.created_at)
    .bind(&project.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Returns `false` when the link already existed
pub async fn link_project_user(
    conn: &mut SqliteConnection,
    project_id: &str,
    user_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO project_user (project_id, user_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
    )
    .bind(project_id)
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns `false` when the link already existed
pub async fn link_project_dataset(
    conn: &mut SqliteConnection,
    project_id: &str,
    dataset_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO project_dataset (project_id, dataset_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
    )
    .bind(project_id)
    .bind(dataset_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_about(
    conn: &mut SqliteConnection,
    html: &str,
    last_updated_by: Option<i64>,
) -> Result<i64> {
    let result = sqlx::query("INSERT INTO about (html, last_updated_by_id) VALUES (?, ?)")
        .bind(html)
        .bind(last_updated_by)
        .execute(conn)
        .await?;
    Ok(result.last_insert_rowid())
}
