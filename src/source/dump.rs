//! Loading of `mongoexport` collection files

use super::{extjson, SourceSnapshot};
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Collection names and the file stems accepted for each
pub const COLLECTIONS: &[(&str, &[&str])] = &[
    ("datasets", &["datasets"]),
    ("dataproducts", &["dataproducts"]),
    ("users", &["users"]),
    ("projects", &["projects"]),
    ("groups", &["groups"]),
    ("events", &["events"]),
    ("content", &["content", "contents"]),
];

/// Load every collection of a dump directory
pub fn load_dump(dir: &Path) -> Result<SourceSnapshot> {
    if !dir.is_dir() {
        return Err(Error::InvalidDump {
            file: dir.display().to_string(),
            message: "dump directory does not exist".to_string(),
        });
    }

    info!("Loading CMG dump from {}", dir.display());

    let snapshot = SourceSnapshot {
        raw_datasets: load_collection(dir, "datasets")?,
        data_products: load_collection(dir, "dataproducts")?,
        users: load_collection(dir, "users")?,
        projects: load_collection(dir, "projects")?,
        groups: load_collection(dir, "groups")?,
        events: load_collection(dir, "events")?,
        content: load_collection(dir, "content")?,
    };

    info!(
        datasets = snapshot.raw_datasets.len(),
        dataproducts = snapshot.data_products.len(),
        users = snapshot.users.len(),
        projects = snapshot.projects.len(),
        "Dump loaded"
    );

    Ok(snapshot)
}

/// Load one collection; a missing file yields an empty collection
pub fn load_collection<T: DeserializeOwned>(dir: &Path, collection: &str) -> Result<Vec<T>> {
    let Some(path) = collection_file(dir, collection) else {
        warn!("No export found for collection '{}', treating as empty", collection);
        return Ok(Vec::new());
    };

    debug!("Reading {}", path.display());
    let content = std::fs::read_to_string(&path)?;
    let documents = parse_documents(&content).map_err(|e| Error::InvalidDump {
        file: path.display().to_string(),
        message: e.to_string(),
    })?;

    documents
        .into_iter()
        .enumerate()
        .map(|(i, doc)| {
            serde_json::from_value(extjson::normalize(doc)).map_err(|e| Error::InvalidDump {
                file: path.display().to_string(),
                message: format!("document {}: {}", i, e),
            })
        })
        .collect()
}

/// Number of documents in a collection file without typing them
pub fn count_documents(dir: &Path, collection: &str) -> Result<usize> {
    match collection_file(dir, collection) {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            Ok(parse_documents(&content)?.len())
        }
        None => Ok(0),
    }
}

fn collection_file(dir: &Path, collection: &str) -> Option<PathBuf> {
    let stems = COLLECTIONS
        .iter()
        .find(|(name, _)| *name == collection)
        .map(|(_, stems)| *stems)
        .unwrap_or(&[]);

    stems
        .iter()
        .flat_map(|stem| [format!("{stem}.json"), format!("{stem}.jsonl")])
        .map(|file| dir.join(file))
        .find(|p| p.is_file())
}

/// Accept a JSON array (`mongoexport --jsonArray`) or one document per line
fn parse_documents(content: &str) -> serde_json::Result<Vec<Value>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed);
    }

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(serde_json::from_str::<Value>)
        .collect()
}
