//! CMG source documents
//!
//! The source store is read-only: every collection is loaded once from a
//! `mongoexport` dump into a [`SourceSnapshot`] and never mutated.

pub mod de;
mod dump;
pub mod extjson;

pub use dump::*;

use crate::target::DatasetType;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// A CMG dataset (`datasets` collection) or data product (`dataproducts`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceDataset {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de::opt_i64")]
    pub directories: Option<i64>,
    #[serde(default)]
    pub files: Option<FilesField>,
    #[serde(default, deserialize_with = "de::opt_i64")]
    pub du_size: Option<i64>,
    #[serde(default, deserialize_with = "de::opt_i64")]
    pub size: Option<i64>,
    #[serde(rename = "createdAt", default, deserialize_with = "de::opt_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, deserialize_with = "de::opt_datetime")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::null_default")]
    pub paths: DatasetPaths,
    #[serde(default)]
    pub staged: Option<bool>,
    #[serde(default, deserialize_with = "de::null_default")]
    pub events: Vec<DatasetEvent>,
    /// RAW_DATA parent of a data product
    #[serde(default)]
    pub dataset: Option<String>,
}

/// `files` is a count on raw datasets and a listing on data products
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FilesField {
    Count(f64),
    List(Vec<SourceFile>),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetPaths {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub archive: Option<String>,
}

/// An entry of a data product's file listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceFile {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "de::opt_i64")]
    pub size: Option<i64>,
    #[serde(default)]
    pub md5: Option<String>,
}

/// History entry embedded in a dataset document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetEvent {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de::opt_datetime")]
    pub stamp: Option<DateTime<Utc>>,
}

impl SourceDataset {
    /// File count for raw datasets (0 when the field is absent or a listing)
    pub fn file_count(&self) -> Option<i64> {
        match &self.files {
            Some(FilesField::Count(n)) => Some(n.round() as i64),
            _ => None,
        }
    }

    /// File listing for data products (empty when absent or a count)
    pub fn file_list(&self) -> &[SourceFile] {
        match &self.files {
            Some(FilesField::List(files)) => files,
            _ => &[],
        }
    }

    /// Name used in log lines
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// A CMG user account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceUser {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub cas_id: Option<String>,
    #[serde(default, deserialize_with = "de::id_list")]
    pub roles: Vec<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// A CMG project
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceProject {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub browser: Option<bool>,
    #[serde(default, deserialize_with = "de::id_list")]
    pub dataproducts: Vec<String>,
    #[serde(default, deserialize_with = "de::id_list")]
    pub users: Vec<String>,
    #[serde(default, deserialize_with = "de::id_list")]
    pub groups: Vec<String>,
    #[serde(rename = "createdAt", default, deserialize_with = "de::opt_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, deserialize_with = "de::opt_datetime")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A CMG user group
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceGroup {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::id_list")]
    pub members: Vec<String>,
}

/// A document of the CMG `events` collection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityEvent {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub dataproduct: Option<String>,
    #[serde(rename = "createdAt", default, deserialize_with = "de::opt_datetime")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A CMG content blurb
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceContent {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

/// Every CMG collection the migration reads
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshot {
    pub raw_datasets: Vec<SourceDataset>,
    pub data_products: Vec<SourceDataset>,
    pub users: Vec<SourceUser>,
    pub projects: Vec<SourceProject>,
    pub groups: Vec<SourceGroup>,
    pub events: Vec<ActivityEvent>,
    pub content: Vec<SourceContent>,
}

impl SourceSnapshot {
    /// Documents of the collection backing the given dataset type
    pub fn datasets(&self, kind: DatasetType) -> &[SourceDataset] {
        match kind {
            DatasetType::RawData => &self.raw_datasets,
            DatasetType::DataProduct => &self.data_products,
        }
    }

    /// Id -> document index for one dataset collection
    pub fn dataset_index(&self, kind: DatasetType) -> HashMap<&str, &SourceDataset> {
        self.datasets(kind)
            .iter()
            .map(|d| (d.id.as_str(), d))
            .collect()
    }

    pub fn user_index(&self) -> HashMap<&str, &SourceUser> {
        self.users.iter().map(|u| (u.id.as_str(), u)).collect()
    }

    pub fn group_index(&self) -> HashMap<&str, &SourceGroup> {
        self.groups.iter().map(|g| (g.id.as_str(), g)).collect()
    }
}
