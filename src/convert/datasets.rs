//! Dataset rows for raw datasets and data products

use super::{ConvertContext, PassStats};
use crate::error::{Error, Result};
use crate::progress::PassProgress;
use crate::resolve::{
    group_by_name, is_deleted, plan_group, resolve_name, target_row, GroupMember, NameDecision,
    NamingState, RowOptions,
};
use crate::target::{insert_dataset, DatasetType};
use chrono::Utc;
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info};

/// Insert every dataset of one collection, resolving name collisions.
///
/// `state` numbers the `UNKNOWN` names given to nameless records of the pass.
pub async fn convert_datasets(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
    dataset_type: DatasetType,
    state: &mut NamingState,
) -> Result<PassStats> {
    let pass = match dataset_type {
        DatasetType::RawData => "datasets",
        DatasetType::DataProduct => "dataproducts",
    };
    let mut stats = PassStats::new(pass);

    let records = ctx.snapshot.datasets(dataset_type);
    let groups = group_by_name(records, state);
    let options = RowOptions {
        default_visible: ctx.config.datasets.default_visible,
        store_back_reference: ctx.config.datasets.store_back_reference,
    };

    debug!(
        "{} {} records in {} name groups",
        records.len(),
        dataset_type,
        groups.len()
    );

    let progress = PassProgress::start(records.len(), pass);

    for group in &groups {
        let deleted: Vec<bool> = group
            .members
            .iter()
            .map(|m| is_deleted(m.source, dataset_type, options.default_visible))
            .collect();

        for (index, decision) in plan_group(&deleted) {
            let member = &group.members[index];
            let mut savepoint = conn.begin().await?;
            let outcome = insert_member(
                &mut savepoint,
                ctx,
                &group.name,
                member,
                decision,
                dataset_type,
                options,
            )
            .await;
            stats
                .settle(
                    savepoint,
                    outcome,
                    &member.source.id,
                    member.source.name.as_deref(),
                )
                .await?;
            progress.advance();
        }
    }
    progress.finish(&format!("{} done", pass));

    info!(
        "Migrated {} {} records ({} skipped)",
        stats.converted,
        dataset_type,
        stats.skipped.len()
    );
    Ok(stats)
}

async fn insert_member(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
    group_name: &str,
    member: &GroupMember<'_>,
    decision: NameDecision,
    dataset_type: DatasetType,
    options: RowOptions,
) -> Result<i64> {
    if group_name.is_empty() {
        return Err(Error::MissingField {
            entity: "dataset",
            field: "name",
        });
    }

    let deleted = is_deleted(member.source, dataset_type, options.default_visible);
    let name = resolve_name(
        conn,
        group_name,
        decision,
        dataset_type,
        deleted,
        ctx.config.datasets.max_duplicate_attempts,
    )
    .await?;

    let row = target_row(
        member.source,
        dataset_type,
        name,
        member.synthesized,
        Utc::now(),
        options,
    );
    let id = insert_dataset(conn, &row).await?;

    debug!(
        "{} {} -> '{}' (id {}, deleted: {})",
        dataset_type, member.source.id, row.name, id, row.is_deleted
    );
    Ok(id)
}
