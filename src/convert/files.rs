//! Data product file listings as directory trees
//!
//! Each listed path becomes a leaf `file` node below one `directory` node per
//! ancestor. Directories are shared between the files of a dataset; a file
//! path may appear only once per dataset.

use super::{ConvertContext, PassStats};
use crate::error::{Error, Result};
use crate::progress::PassProgress;
use crate::target::{insert_file, link_file_nodes, upsert_directory, DatasetType};
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info};

/// Add one file, and any missing ancestor directories, to a dataset's tree.
///
/// Returns the id of the file node.
pub async fn ingest_file(
    conn: &mut SqliteConnection,
    dataset_id: i64,
    path: &str,
    size: Option<i64>,
    md5: Option<&str>,
) -> Result<i64> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((file_name, directories)) = segments.split_last() else {
        return Err(Error::MissingField {
            entity: "file",
            field: "path",
        });
    };

    let mut parent: Option<i64> = None;
    let mut cumulative = String::new();

    for directory in directories {
        if !cumulative.is_empty() {
            cumulative.push('/');
        }
        cumulative.push_str(directory);

        let id = upsert_directory(conn, dataset_id, &cumulative, directory).await?;
        if let Some(parent_id) = parent {
            link_file_nodes(conn, parent_id, id).await?;
        }
        parent = Some(id);
    }

    let file_path = segments.join("/");
    let file_id = insert_file(conn, dataset_id, &file_path, file_name, size, md5).await?;
    if let Some(parent_id) = parent {
        link_file_nodes(conn, parent_id, file_id).await?;
    }

    Ok(file_id)
}

/// Build the file trees of every data product
pub async fn convert_files(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
) -> Result<PassStats> {
    let mut stats = PassStats::new("files");
    let products: Vec<_> = ctx
        .snapshot
        .data_products
        .iter()
        .filter(|p| !p.file_list().is_empty())
        .collect();
    let progress = PassProgress::start(products.len(), "files");

    for product in products {
        let resolved = ctx
            .matcher
            .resolve(conn, product, DatasetType::DataProduct)
            .await;
        let Some(dataset) = stats.absorb(resolved, &product.id, product.name.as_deref())? else {
            progress.advance();
            continue;
        };

        for file in product.file_list() {
            let path = file.path.as_deref().unwrap_or_default();
            let record_id = format!("{}:{}", product.id, path);

            let mut savepoint = conn.begin().await?;
            let outcome = ingest_file(
                &mut savepoint,
                dataset.id,
                path,
                file.size,
                file.md5.as_deref(),
            )
            .await;
            stats
                .settle(savepoint, outcome, &record_id, product.name.as_deref())
                .await?;
        }

        debug!(
            "{} files for data product {}",
            product.file_list().len(),
            dataset.name
        );
        progress.advance();
    }
    progress.finish("files done");

    info!(
        "Migrated {} files ({} skipped)",
        stats.converted,
        stats.skipped.len()
    );
    Ok(stats)
}
