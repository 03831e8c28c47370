//! Dataset file tree queries

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

/// A row of the `dataset_file` table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DatasetFile {
    pub id: i64,
    pub name: Option<String>,
    pub path: String,
    pub md5: Option<String>,
    pub size: Option<i64>,
    pub filetype: Option<String>,
    pub dataset_id: i64,
}

/// Insert a directory node unless it exists, returning its id either way
pub async fn upsert_directory(
    conn: &mut SqliteConnection,
    dataset_id: i64,
    path: &str,
    name: &str,
) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT INTO dataset_file (name, path, dataset_id, filetype)
        VALUES (?, ?, ?, 'directory')
        ON CONFLICT(path, dataset_id) DO NOTHING
        "#,
    )
    .bind(name)
    .bind(path)
    .bind(dataset_id)
    .execute(&mut *conn)
    .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM dataset_file WHERE path = ? AND dataset_id = ?")
        .bind(path)
        .bind(dataset_id)
        .fetch_one(conn)
        .await?;
    Ok(id)
}

/// Insert a leaf file node; a repeated path in the same dataset is an error
pub async fn insert_file(
    conn: &mut SqliteConnection,
    dataset_id: i64,
    path: &str,
    name: &str,
    size: Option<i64>,
    md5: Option<&str>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO dataset_file (name, path, md5, size, dataset_id, filetype)
        VALUES (?, ?, ?, ?, ?, 'file')
        "#,
    )
    .bind(name)
    .bind(path)
    .bind(md5)
    .bind(size)
    .bind(dataset_id)
    .execute(conn)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Link a file node to its parent directory (idempotent)
pub async fn link_file_nodes(
    conn: &mut SqliteConnection,
    parent_id: i64,
    child_id: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO dataset_file_hierarchy (parent_id, child_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
    )
    .bind(parent_id)
    .bind(child_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// All file nodes of a dataset, ordered by path
pub async fn list_dataset_files(
    conn: &mut SqliteConnection,
    dataset_id: i64,
) -> Result<Vec<DatasetFile>> {
    let files = sqlx::query_as::<_, DatasetFile>(
        r#"
        SELECT id, name, path, md5, size, filetype, dataset_id
        FROM dataset_file WHERE dataset_id = ? ORDER BY path
        "#,
    )
    .bind(dataset_id)
    .fetch_all(conn)
    .await?;
    Ok(files)
}

/// (parent path, child path) edges of a dataset's file tree
pub async fn list_file_edges(
    conn: &mut SqliteConnection,
    dataset_id: i64,
) -> Result<Vec<(String, String)>> {
    let edges = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT p.path, c.path
        FROM dataset_file_hierarchy h
        JOIN dataset_file p ON p.id = h.parent_id
        JOIN dataset_file c ON c.id = h.child_id
        WHERE c.dataset_id = ?
        ORDER BY p.path, c.path
        "#,
    )
    .bind(dataset_id)
    .fetch_all(conn)
    .await?;
    Ok(edges)
}
