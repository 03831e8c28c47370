//! Verify command implementation
//!
//! Compares the number of documents in each exported collection with the
//! rows the migration produced for it. Skipped records show up as a
//! shortfall on the target side.

use crate::config::Config;
use crate::error::Result;
use crate::source::count_documents;
use crate::target::{DatasetType, TableCount, TargetDb};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Source and target counts of one entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountCheck {
    pub collection: String,
    pub table: String,
    pub source: i64,
    pub target: i64,
}

impl CountCheck {
    pub fn matches(&self) -> bool {
        self.source == self.target
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    pub checks: Vec<CountCheck>,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.checks.iter().all(CountCheck::matches)
    }
}

/// Compare collection sizes with target row counts
pub async fn cmd_verify(config: &Config, db: &TargetDb) -> Result<VerifyReport> {
    let dump_dir = config.dump_dir();
    info!("Verifying {:?} against {:?}", dump_dir, config.target_database());

    let tables: Vec<TableCount> = db.table_counts().await?;
    let rows_of = |table: &str| {
        tables
            .iter()
            .find(|t| t.table == table)
            .map(|t| t.rows)
            .unwrap_or(0)
    };

    let targets = [
        ("datasets", "dataset", db.count_datasets(DatasetType::RawData).await?),
        (
            "dataproducts",
            "dataset",
            db.count_datasets(DatasetType::DataProduct).await?,
        ),
        (
            "users",
            "user",
            db.count_users_except(&config.accounts.service_username)
                .await?,
        ),
        ("projects", "project", rows_of("project")),
        ("content", "about", rows_of("about")),
    ];

    let mut checks = Vec::with_capacity(targets.len());
    for (collection, table, target) in targets {
        let source = count_documents(&dump_dir, collection)? as i64;
        let check = CountCheck {
            collection: collection.to_string(),
            table: table.to_string(),
            source,
            target,
        };
        if !check.matches() {
            warn!(
                collection,
                source, target, "Row count differs from source collection"
            );
        }
        checks.push(check);
    }

    Ok(VerifyReport { checks })
}

/// Print verification results to console
pub fn print_verify(report: &VerifyReport) {
    println!("\n🔎 Migration Verification\n");
    for check in &report.checks {
        let mark = if check.matches() { "✓" } else { "✗" };
        println!(
            "{} {:<14} {:>7} -> {:<8} {:>7}",
            mark, check.collection, check.source, check.table, check.target
        );
    }

    if report.is_consistent() {
        println!("\nAll counts match.");
    } else {
        println!("\nSome counts differ; see the skipped records of the last migrate run.");
    }
}
