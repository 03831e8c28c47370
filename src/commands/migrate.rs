//! Migrate command implementation
//!
//! Passes run in dependency order, each inside its own transaction that is
//! committed when the pass completes:
//! roles, users, raw datasets, data products, audit logs, hierarchies,
//! files, projects, about.

use crate::config::Config;
use crate::convert::{
    about::convert_about, audit::convert_audit, datasets::convert_datasets,
    files::convert_files, hierarchy::convert_hierarchies, projects::convert_projects,
    users::{convert_users, seed_roles},
    ConvertContext, PassStats,
};
use crate::error::Result;
use crate::resolve::NamingState;
use crate::source::load_dump;
use crate::target::{DatasetType, TargetDb};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct MigrateOptions {
    /// Drop and recreate the target schema before migrating
    pub reset: bool,
}

/// Outcome of a full migration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub dump_dir: String,
    pub database: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub unknown_names: u32,
    pub passes: Vec<PassStats>,
}

impl MigrationReport {
    pub fn converted(&self) -> usize {
        self.passes.iter().map(|p| p.converted).sum()
    }

    pub fn skipped(&self) -> usize {
        self.passes.iter().map(|p| p.skipped.len()).sum()
    }
}

/// Run every migration pass against the configured dump and database
pub async fn cmd_migrate(
    config: &Config,
    db: &TargetDb,
    options: MigrateOptions,
) -> Result<MigrationReport> {
    let started_at = Utc::now();
    let dump_dir = config.dump_dir();

    if options.reset {
        warn!("Resetting target schema at {:?}", config.target_database());
        db.reset_schema().await?;
    } else if !db.is_initialized().await? {
        db.init_schema().await?;
    }

    let snapshot = load_dump(&dump_dir)?;
    let ctx = ConvertContext::new(config, &snapshot);
    let mut raw_naming = NamingState::new();
    let mut product_naming = NamingState::new();
    let mut passes = Vec::new();

    info!(
        "Migrating {:?} into {:?} (matching: {:?})",
        dump_dir,
        config.target_database(),
        ctx.matcher.strategy()
    );

    let mut tx = db.begin().await?;
    passes.push(seed_roles(&mut tx).await?);
    tx.commit().await?;

    let mut tx = db.begin().await?;
    passes.push(convert_users(&mut tx, &ctx).await?);
    tx.commit().await?;

    let mut tx = db.begin().await?;
    passes.push(convert_datasets(&mut tx, &ctx, DatasetType::RawData, &mut raw_naming).await?);
    tx.commit().await?;

    let mut tx = db.begin().await?;
    passes.push(
        convert_datasets(&mut tx, &ctx, DatasetType::DataProduct, &mut product_naming).await?,
    );
    tx.commit().await?;

    let mut tx = db.begin().await?;
    passes.push(convert_audit(&mut tx, &ctx).await?);
    tx.commit().await?;

    let mut tx = db.begin().await?;
    passes.push(convert_hierarchies(&mut tx, &ctx).await?);
    tx.commit().await?;

    let mut tx = db.begin().await?;
    passes.push(convert_files(&mut tx, &ctx).await?);
    tx.commit().await?;

    let mut tx = db.begin().await?;
    passes.push(convert_projects(&mut tx, &ctx).await?);
    tx.commit().await?;

    let mut tx = db.begin().await?;
    passes.push(convert_about(&mut tx, &ctx).await?);
    tx.commit().await?;

    let report = MigrationReport {
        dump_dir: dump_dir.display().to_string(),
        database: config.target_database().display().to_string(),
        started_at,
        finished_at: Utc::now(),
        unknown_names: raw_naming.unknown_names() + product_naming.unknown_names(),
        passes,
    };

    info!(
        "Migration finished: {} records converted, {} skipped",
        report.converted(),
        report.skipped()
    );
    Ok(report)
}

/// Print migration report to console
pub fn print_report(report: &MigrationReport) {
    println!("\n🚚 Migration Complete\n");
    println!("Dump: {}", report.dump_dir);
    println!("Database: {}", report.database);
    println!(
        "Duration: {:.1}s",
        (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
    );
    println!();

    for pass in &report.passes {
        println!(
            "  {:<14} {:>7} converted  {:>5} skipped",
            pass.pass,
            pass.converted,
            pass.skipped.len()
        );
    }

    if report.unknown_names > 0 {
        println!(
            "\n{} nameless datasets were given UNKNOWN names",
            report.unknown_names
        );
    }

    let skipped: Vec<_> = report
        .passes
        .iter()
        .flat_map(|p| p.skipped.iter().map(move |s| (p.pass.as_str(), s)))
        .collect();
    if !skipped.is_empty() {
        println!("\nSkipped records:");
        for (pass, record) in skipped {
            println!(
                "- [{}] {} ({}): {}",
                pass,
                record.id,
                record.name.as_deref().unwrap_or("-"),
                record.message
            );
        }
    }
}
