//! Dataset identity resolution
//!
//! CMG allows several documents per collection to share a name while the
//! Bioloop `dataset` table keeps (name, type, is_deleted) unique.
//! [`naming`] decides the name each source record is inserted under;
//! [`matching`] later finds the row a source record was inserted as.
//! Both sides build the row a record maps to with [`target_row`], so the
//! attributes compared during matching are exactly the ones written.

pub mod matching;
pub mod naming;

pub use matching::*;
pub use naming::*;

use crate::source::SourceDataset;
use crate::target::{format_timestamp, DatasetType, NewDataset};
use chrono::{DateTime, Utc};

/// Deletion status a source record is migrated with.
///
/// Data products are deleted when hidden; an absent `visible` field falls
/// back to `default_visible`. Raw datasets carry no visibility and are never
/// deleted.
pub fn is_deleted(source: &SourceDataset, dataset_type: DatasetType, default_visible: bool) -> bool {
    match dataset_type {
        DatasetType::RawData => false,
        DatasetType::DataProduct => !source.visible.unwrap_or(default_visible),
    }
}

/// Options that shape the row built for a source record
#[derive(Debug, Clone, Copy)]
pub struct RowOptions {
    pub default_visible: bool,
    pub store_back_reference: bool,
}

/// Row a source record maps to when inserted under `name`.
///
/// `now` is used for the timestamps of records whose name was synthesized.
pub fn target_row(
    source: &SourceDataset,
    dataset_type: DatasetType,
    name: String,
    synthesized: bool,
    now: DateTime<Utc>,
    options: RowOptions,
) -> NewDataset {
    let stamp = |at: Option<DateTime<Utc>>| match (at, synthesized) {
        (Some(at), _) => Some(format_timestamp(&at)),
        (None, true) => Some(format_timestamp(&now)),
        (None, false) => None,
    };

    let raw = dataset_type == DatasetType::RawData;

    NewDataset {
        cmg_id: options
            .store_back_reference
            .then(|| source.id.clone()),
        name,
        dataset_type,
        is_deleted: is_deleted(source, dataset_type, options.default_visible),
        description: source.description.clone(),
        num_directories: source.directories.unwrap_or(0),
        num_files: if raw { source.file_count().unwrap_or(0) } else { 0 },
        du_size: if raw { source.du_size.unwrap_or(0) } else { 0 },
        size: source.size.unwrap_or(0),
        created_at: stamp(source.created_at),
        updated_at: stamp(source.updated_at),
        origin_path: source.paths.origin.clone(),
        archive_path: source.paths.archive.clone(),
        is_staged: source.staged.unwrap_or(false),
    }
}
