//! Bioloop target database
//!
//! This module owns the relational side of the migration:
//! - Schema creation and reset
//! - Dataset rows, hierarchies, audit logs and file trees
//! - Accounts (users, roles) and projects
//!
//! Query functions take a `&mut SqliteConnection` so passes can run them
//! inside their own transaction and per-record savepoints.

mod accounts;
mod datasets;
mod files;
mod projects;
mod schema;

pub use accounts::*;
pub use datasets::*;
pub use files::*;
pub use projects::*;
pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, Transaction};
use std::str::FromStr;
use tracing::{debug, info};

/// Dataset categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetType {
    RawData,
    DataProduct,
}

impl DatasetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::RawData => "RAW_DATA",
            DatasetType::DataProduct => "DATA_PRODUCT",
        }
    }
}

impl std::fmt::Display for DatasetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RAW_DATA" => Ok(DatasetType::RawData),
            "DATA_PRODUCT" => Ok(DatasetType::DataProduct),
            _ => Err(Error::Other(format!("Unknown dataset type: {}", s))),
        }
    }
}

/// A row of the `dataset` table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TargetDataset {
    pub id: i64,
    pub cmg_id: Option<String>,
    pub name: String,
    #[sqlx(rename = "type")]
    pub dataset_type: String,
    pub is_deleted: bool,
    pub description: Option<String>,
    pub num_directories: Option<i64>,
    pub num_files: Option<i64>,
    pub du_size: Option<i64>,
    pub size: Option<i64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub origin_path: Option<String>,
    pub archive_path: Option<String>,
    pub is_staged: bool,
    pub metadata: Option<String>,
}

impl TargetDataset {
    pub fn get_type(&self) -> Result<DatasetType> {
        self.dataset_type.parse()
    }
}

/// Values for a new `dataset` row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDataset {
    pub cmg_id: Option<String>,
    pub name: String,
    pub dataset_type: DatasetType,
    pub is_deleted: bool,
    pub description: Option<String>,
    pub num_directories: i64,
    pub num_files: i64,
    pub du_size: i64,
    pub size: i64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub origin_path: Option<String>,
    pub archive_path: Option<String>,
    pub is_staged: bool,
}

/// Timestamp format stored in TEXT columns
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Row count of a single table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

/// Bioloop database handle
#[derive(Clone)]
pub struct TargetDb {
    pool: SqlitePool,
}

impl TargetDb {
    /// Connect to the target database
    ///
    /// The pool holds a single connection, so every query of a run sees the
    /// writes made earlier in that run.
    pub async fn connect(config: &Config) -> Result<Self> {
        let db_path = config.target_database();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing Bioloop schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if the schema has been created
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='dataset'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    /// Drop every table and recreate the schema
    pub async fn reset_schema(&self) -> Result<()> {
        info!("Dropping existing Bioloop tables");
        sqlx::query(DROP_SQL).execute(&self.pool).await?;
        self.init_schema().await
    }

    /// Start a transaction on the run's connection
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Row counts for every Bioloop table
    pub async fn table_counts(&self) -> Result<Vec<TableCount>> {
        let mut counts = Vec::with_capacity(TABLES.len());
        for table in TABLES {
            let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{}\"", table))
                .fetch_one(&self.pool)
                .await?;
            counts.push(TableCount {
                table: table.to_string(),
                rows,
            });
        }
        Ok(counts)
    }

    /// Rows of `dataset` with the given type
    pub async fn count_datasets(&self, dataset_type: DatasetType) -> Result<i64> {
        let rows = sqlx::query_scalar("SELECT COUNT(*) FROM dataset WHERE type = ?")
            .bind(dataset_type.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Rows of `user`, leaving out the given account
    pub async fn count_users_except(&self, username: &str) -> Result<i64> {
        let rows = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "user" WHERE username != ?"#)
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) async fn setup_test_db() -> (TargetDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.target.database = tmp.path().join("bioloop.db");

        let db = TargetDb::connect(&config).await.unwrap();
        db.init_schema().await.unwrap();
        (db, tmp)
    }

    #[test]
    fn test_dataset_type_strings() {
        assert_eq!(DatasetType::RawData.to_string(), "RAW_DATA");
        assert_eq!(
            "DATA_PRODUCT".parse::<DatasetType>().unwrap(),
            DatasetType::DataProduct
        );
        assert!("raw".parse::<DatasetType>().is_err());
    }

    #[test]
    fn test_timestamp_format() {
        let at = DateTime::from_timestamp_millis(1_633_462_780_126).unwrap();
        assert_eq!(format_timestamp(&at), "2021-10-05 19:39:40.126");
    }

    #[tokio::test]
    async fn test_schema_init_and_reset() {
        let (db, _tmp) = setup_test_db().await;
        assert!(db.is_initialized().await.unwrap());

        sqlx::query("INSERT INTO role (name) VALUES ('admin')")
            .execute(&db.pool)
            .await
            .unwrap();

        db.reset_schema().await.unwrap();
        let counts = db.table_counts().await.unwrap();
        assert_eq!(counts.len(), TABLES.len());
        assert!(counts.iter().all(|c| c.rows == 0));
    }
}
