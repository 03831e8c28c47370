//! Raw dataset -> data product edges

use super::{ConvertContext, PassStats};
use crate::error::Result;
use crate::progress::PassProgress;
use crate::source::SourceDataset;
use crate::target::{insert_hierarchy, DatasetType};
use sqlx::{Connection, SqliteConnection};
use std::collections::HashMap;
use tracing::{debug, info};

/// Link every data product to the raw dataset it references
pub async fn convert_hierarchies(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
) -> Result<PassStats> {
    let mut stats = PassStats::new("hierarchy");
    let raw_index = ctx.snapshot.dataset_index(DatasetType::RawData);
    let linked: Vec<_> = ctx
        .snapshot
        .data_products
        .iter()
        .filter_map(|p| p.dataset.as_deref().map(|raw_id| (p, raw_id)))
        .collect();
    let progress = PassProgress::start(linked.len(), "hierarchy");

    for (product, raw_id) in linked {
        let mut savepoint = conn.begin().await?;
        let outcome = link_product(&mut savepoint, ctx, product, raw_id, &raw_index).await;
        stats
            .settle(savepoint, outcome, &product.id, product.name.as_deref())
            .await?;
        progress.advance();
    }
    progress.finish("hierarchy done");

    info!(
        "Migrated {} dataset hierarchies ({} skipped)",
        stats.converted,
        stats.skipped.len()
    );
    Ok(stats)
}

async fn link_product(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
    product: &SourceDataset,
    raw_id: &str,
    raw_index: &HashMap<&str, &SourceDataset>,
) -> Result<()> {
    let derived = ctx
        .matcher
        .resolve(conn, product, DatasetType::DataProduct)
        .await?;
    let source = ctx
        .matcher
        .resolve_reference(conn, raw_id, DatasetType::RawData, raw_index)
        .await?;

    if !insert_hierarchy(conn, source.id, derived.id).await? {
        debug!("Edge {} -> {} already present", source.name, derived.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::convert::datasets::convert_datasets;
    use crate::resolve::NamingState;
    use crate::source::SourceSnapshot;
    use crate::target::tests::setup_test_db;

    #[tokio::test]
    async fn test_products_link_to_their_raw_dataset() {
        let (db, _tmp) = setup_test_db().await;
        let config = Config::default();
        let raw = |id: &str, name: &str| SourceDataset {
            id: id.to_string(),
            name: Some(name.to_string()),
            ..Default::default()
        };
        let snapshot = SourceSnapshot {
            raw_datasets: vec![raw("r1", "run")],
            data_products: vec![
                SourceDataset {
                    dataset: Some("r1".to_string()),
                    ..raw("p1", "run_fastq")
                },
                SourceDataset {
                    dataset: Some("missing".to_string()),
                    ..raw("p2", "orphan")
                },
                raw("p3", "standalone"),
            ],
            ..Default::default()
        };
        let ctx = ConvertContext::new(&config, &snapshot);
        let mut tx = db.begin().await.unwrap();
        let mut state = NamingState::new();

        convert_datasets(&mut tx, &ctx, DatasetType::RawData, &mut state)
            .await
            .unwrap();
        convert_datasets(&mut tx, &ctx, DatasetType::DataProduct, &mut state)
            .await
            .unwrap();

        let stats = convert_hierarchies(&mut tx, &ctx).await.unwrap();
        assert_eq!(stats.converted, 1);
        assert_eq!(stats.skipped.len(), 1);
        assert_eq!(stats.skipped[0].id, "p2");
        assert_eq!(stats.skipped[0].reason, "not-found");

        // Running again leaves a single edge
        convert_hierarchies(&mut tx, &ctx).await.unwrap();
        let edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dataset_hierarchy")
            .fetch_one(&mut *tx)
            .await
            .unwrap();
        assert_eq!(edges, 1);
    }
}
