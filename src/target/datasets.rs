//! Dataset, hierarchy and audit queries

use super::{DatasetType, NewDataset, TargetDataset};
use crate::error::Result;
use sqlx::SqliteConnection;

/// Insert a dataset row and return its id
pub async fn insert_dataset(conn: &mut SqliteConnection, row: &NewDataset) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO dataset (
            cmg_id, name, type, is_deleted, description, num_directories, num_files,
            du_size, size, created_at, updated_at, origin_path, archive_path, is_staged, metadata
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)
        "#,
    )
    .bind(&row.cmg_id)
    .bind(&row.name)
    .bind(row.dataset_type.as_str())
    .bind(row.is_deleted)
    .bind(&row.description)
    .bind(row.num_directories)
    .bind(row.num_files)
    .bind(row.du_size)
    .bind(row.size)
    .bind(&row.created_at)
    .bind(&row.updated_at)
    .bind(&row.origin_path)
    .bind(&row.archive_path)
    .bind(row.is_staged)
    .execute(conn)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Whether a row with this exact (name, type, is_deleted) exists
pub async fn dataset_exists(
    conn: &mut SqliteConnection,
    name: &str,
    dataset_type: DatasetType,
    is_deleted: bool,
) -> Result<bool> {
    let result: Option<(i32,)> = sqlx::query_as(
        "SELECT 1 FROM dataset WHERE name = ? AND type = ? AND is_deleted = ? LIMIT 1",
    )
    .bind(name)
    .bind(dataset_type.as_str())
    .bind(is_deleted)
    .fetch_optional(conn)
    .await?;
    Ok(result.is_some())
}

/// Look a dataset up by its stored CMG id
pub async fn find_dataset_by_cmg_id(
    conn: &mut SqliteConnection,
    cmg_id: &str,
) -> Result<Option<TargetDataset>> {
    let dataset = sqlx::query_as::<_, TargetDataset>("SELECT * FROM dataset WHERE cmg_id = ?")
        .bind(cmg_id)
        .fetch_optional(conn)
        .await?;
    Ok(dataset)
}

/// Rows that may have been created from a CMG record with this name.
///
/// Returns rows whose name is the original name or ends with it after a
/// `Duplicate_` prefix; callers narrow the result with an exact name check.
/// With `name == None` the rows carrying a synthesized `UNKNOWN` name are
/// returned instead. `unreferenced_only` restricts to rows without `cmg_id`.
pub async fn find_candidate_datasets(
    conn: &mut SqliteConnection,
    name: Option<&str>,
    dataset_type: DatasetType,
    is_deleted: bool,
    unreferenced_only: bool,
) -> Result<Vec<TargetDataset>> {
    let reference_filter = if unreferenced_only {
        " AND cmg_id IS NULL"
    } else {
        ""
    };

    let candidates = match name {
        Some(name) => {
            let sql = format!(
                r#"
                SELECT * FROM dataset
                WHERE type = ? AND is_deleted = ?
                  AND (name = ? OR (name LIKE 'Duplicate\_%' ESCAPE '\'
                                    AND substr(name, -length(?)) = ?)){}
                ORDER BY id
                "#,
                reference_filter
            );
            sqlx::query_as::<_, TargetDataset>(&sql)
                .bind(dataset_type.as_str())
                .bind(is_deleted)
                .bind(name)
                .bind(name)
                .bind(name)
                .fetch_all(conn)
                .await?
        }
        None => {
            let sql = format!(
                "SELECT * FROM dataset WHERE type = ? AND is_deleted = ? AND name LIKE '%UNKNOWN%'{} ORDER BY id",
                reference_filter
            );
            sqlx::query_as::<_, TargetDataset>(&sql)
                .bind(dataset_type.as_str())
                .bind(is_deleted)
                .fetch_all(conn)
                .await?
        }
    };

    Ok(candidates)
}

/// Link a data product to the raw dataset it was derived from.
///
/// Returns `false` when the edge already existed.
pub async fn insert_hierarchy(
    conn: &mut SqliteConnection,
    source_id: i64,
    derived_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO dataset_hierarchy (source_id, derived_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
    )
    .bind(source_id)
    .bind(derived_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Append an audit log entry for a dataset
pub async fn insert_audit(
    conn: &mut SqliteConnection,
    dataset_id: i64,
    user_id: Option<i64>,
    action: &str,
    timestamp: Option<&str>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO dataset_audit (action, timestamp, dataset_id, user_id) VALUES (?, ?, ?, ?)",
    )
    .bind(action)
    .bind(timestamp)
    .bind(dataset_id)
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(result.last_insert_rowid())
}
