//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::target::{DatasetType, TableCount, TargetDb};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub dump_dir: String,
    pub db_path: String,
    pub initialized: bool,
    pub raw_datasets: i64,
    pub data_products: i64,
    pub tables: Vec<TableCount>,
}

/// Get target database status
pub async fn cmd_status(config: &Config, db: &TargetDb) -> Result<StatusInfo> {
    info!("Getting status");

    let initialized = db.is_initialized().await?;
    let (raw_datasets, data_products, tables) = if initialized {
        (
            db.count_datasets(DatasetType::RawData).await?,
            db.count_datasets(DatasetType::DataProduct).await?,
            db.table_counts().await?,
        )
    } else {
        (0, 0, Vec::new())
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        dump_dir: config.dump_dir().display().to_string(),
        db_path: config.target_database().display().to_string(),
        initialized,
        raw_datasets,
        data_products,
        tables,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 cmg-migrate Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Dump: {}", status.dump_dir);
    println!("Database: {}", status.db_path);

    if !status.initialized {
        println!("\n⚠ Schema not created - run 'cmg-migrate migrate' to create it");
        return;
    }

    println!("\nDatasets:");
    println!("  RAW_DATA: {}", status.raw_datasets);
    println!("  DATA_PRODUCT: {}", status.data_products);
    println!("\nTables:");
    for count in &status.tables {
        println!("  {:<24} {}", count.table, count.rows);
    }
}
