//! Dataset audit log
//!
//! Two sources feed `dataset_audit`: the `events` history embedded in every
//! dataset document, recorded under the service account, and the documents
//! of the `events` collection that reference a dataset or data product,
//! recorded under the CMG user who acted when that user was migrated.

use super::{ConvertContext, PassStats};
use crate::error::{Error, Result};
use crate::progress::PassProgress;
use crate::source::{ActivityEvent, SourceDataset};
use crate::target::{format_timestamp, insert_audit, DatasetType};
use sqlx::{Connection, SqliteConnection};
use std::collections::HashMap;
use tracing::{debug, info};

/// Audit rows from dataset histories and the `events` collection
pub async fn convert_audit(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
) -> Result<PassStats> {
    let mut stats = PassStats::new("audit");
    let service_user = ctx.service_user_id(conn).await?;

    for dataset_type in [DatasetType::RawData, DatasetType::DataProduct] {
        let with_history: Vec<_> = ctx
            .snapshot
            .datasets(dataset_type)
            .iter()
            .filter(|d| !d.events.is_empty())
            .collect();
        let progress = PassProgress::start(with_history.len(), "audit history");

        for source in with_history {
            let mut savepoint = conn.begin().await?;
            let outcome =
                insert_history(&mut savepoint, ctx, source, dataset_type, service_user).await;
            stats
                .settle(savepoint, outcome, &source.id, source.name.as_deref())
                .await?;
            progress.advance();
        }
        progress.finish("audit history done");
    }

    let raw_index = ctx.snapshot.dataset_index(DatasetType::RawData);
    let product_index = ctx.snapshot.dataset_index(DatasetType::DataProduct);
    let activity: Vec<_> = ctx
        .snapshot
        .events
        .iter()
        .filter(|e| e.dataset.is_some() || e.dataproduct.is_some())
        .collect();
    debug!(
        "{} of {} activity events reference a dataset",
        activity.len(),
        ctx.snapshot.events.len()
    );
    let progress = PassProgress::start(activity.len(), "audit events");

    for event in activity {
        let (reference, dataset_type, index) = match (&event.dataproduct, &event.dataset) {
            (Some(id), _) => (id.as_str(), DatasetType::DataProduct, &product_index),
            (None, Some(id)) => (id.as_str(), DatasetType::RawData, &raw_index),
            (None, None) => continue,
        };

        let mut savepoint = conn.begin().await?;
        let outcome = insert_activity(
            &mut savepoint,
            ctx,
            event,
            reference,
            dataset_type,
            index,
            service_user,
        )
        .await;
        stats
            .settle(savepoint, outcome, &event.id, event.action.as_deref())
            .await?;
        progress.advance();
    }
    progress.finish("audit events done");

    info!(
        "Migrated {} audit sources ({} skipped)",
        stats.converted,
        stats.skipped.len()
    );
    Ok(stats)
}

/// Audit rows for a dataset's embedded history; returns the number inserted
async fn insert_history(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
    source: &SourceDataset,
    dataset_type: DatasetType,
    service_user: Option<i64>,
) -> Result<usize> {
    let dataset = ctx.matcher.resolve(conn, source, dataset_type).await?;

    let mut inserted = 0;
    for event in &source.events {
        let Some(action) = event.description.as_deref() else {
            debug!("History entry without description on {}", source.id);
            continue;
        };
        let stamp = event.stamp.as_ref().map(format_timestamp);
        insert_audit(conn, dataset.id, service_user, action, stamp.as_deref()).await?;
        inserted += 1;
    }

    Ok(inserted)
}

async fn insert_activity(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
    event: &ActivityEvent,
    reference: &str,
    dataset_type: DatasetType,
    index: &HashMap<&str, &SourceDataset>,
    service_user: Option<i64>,
) -> Result<i64> {
    let action = activity_action(event)?;
    let dataset = ctx
        .matcher
        .resolve_reference(conn, reference, dataset_type, index)
        .await?;

    let actor = match &event.user {
        Some(cmg_user) => ctx.user_id_for(conn, cmg_user).await?.or(service_user),
        None => service_user,
    };
    let stamp = event.created_at.as_ref().map(format_timestamp);

    insert_audit(conn, dataset.id, actor, &action, stamp.as_deref()).await
}

/// `{action} - {details}`, or whichever of the two is present
fn activity_action(event: &ActivityEvent) -> Result<String> {
    match (event.action.as_deref(), event.details.as_deref()) {
        (Some(action), Some(details)) => Ok(format!("{} - {}", action, details)),
        (Some(text), None) | (None, Some(text)) => Ok(text.to_string()),
        (None, None) => Err(Error::MissingField {
            entity: "event",
            field: "action",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::convert::datasets::convert_datasets;
    use crate::convert::users::{convert_users, seed_roles};
    use crate::resolve::NamingState;
    use crate::source::{DatasetEvent, SourceSnapshot, SourceUser};
    use crate::target::tests::setup_test_db;
    use chrono::{DateTime, Utc};

    fn at(millis: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis)
    }

    #[test]
    fn test_activity_action_text() {
        let mut event = ActivityEvent {
            action: Some("stage".to_string()),
            details: Some("requested by alice".to_string()),
            ..Default::default()
        };
        assert_eq!(activity_action(&event).unwrap(), "stage - requested by alice");
        event.details = None;
        assert_eq!(activity_action(&event).unwrap(), "stage");
        event.action = None;
        assert!(activity_action(&event).is_err());
    }

    #[tokio::test]
    async fn test_history_and_activity_rows() {
        let (db, _tmp) = setup_test_db().await;
        let config = Config::default();
        let snapshot = SourceSnapshot {
            raw_datasets: vec![SourceDataset {
                id: "r1".to_string(),
                name: Some("run".to_string()),
                events: vec![
                    DatasetEvent {
                        description: Some("registered".to_string()),
                        stamp: at(1_000),
                    },
                    DatasetEvent {
                        description: Some("archived".to_string()),
                        stamp: at(2_000),
                    },
                ],
                ..Default::default()
            }],
            users: vec![SourceUser {
                id: "u1".to_string(),
                username: Some("alice".to_string()),
                email: Some("alice@example.org".to_string()),
                active: Some(true),
                ..Default::default()
            }],
            events: vec![
                ActivityEvent {
                    id: "e1".to_string(),
                    user: Some("u1".to_string()),
                    action: Some("stage".to_string()),
                    dataset: Some("r1".to_string()),
                    created_at: at(3_000),
                    ..Default::default()
                },
                ActivityEvent {
                    id: "e2".to_string(),
                    user: Some("ghost".to_string()),
                    action: Some("delete".to_string()),
                    dataset: Some("r1".to_string()),
                    ..Default::default()
                },
                ActivityEvent {
                    id: "e3".to_string(),
                    action: Some("login".to_string()),
                    ..Default::default()
                },
                ActivityEvent {
                    id: "e4".to_string(),
                    action: Some("stage".to_string()),
                    dataproduct: Some("nope".to_string()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let ctx = ConvertContext::new(&config, &snapshot);
        let mut tx = db.begin().await.unwrap();

        seed_roles(&mut tx).await.unwrap();
        convert_users(&mut tx, &ctx).await.unwrap();
        convert_datasets(&mut tx, &ctx, DatasetType::RawData, &mut NamingState::new())
            .await
            .unwrap();

        let stats = convert_audit(&mut tx, &ctx).await.unwrap();
        // r1 history, e1 and e2; e4 references an unknown product
        assert_eq!(stats.converted, 3);
        assert_eq!(stats.skipped.len(), 1);
        assert_eq!(stats.skipped[0].id, "e4");

        let rows: Vec<(String, Option<String>, String)> = sqlx::query_as(
            r#"
            SELECT a.action, a.timestamp, u.username
            FROM dataset_audit a JOIN "user" u ON u.id = a.user_id
            ORDER BY a.id
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].0, "registered");
        assert_eq!(rows[0].1.as_deref(), Some("1970-01-01 00:00:01.000"));
        assert_eq!(rows[0].2, "cmguser");
        assert_eq!(rows[2].0, "stage");
        assert_eq!(rows[2].2, "alice");
        assert_eq!(rows[3].2, "cmguser");
    }
}
