//! Default values for configuration

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default directory holding the `mongoexport` dumps
pub fn default_dump_dir() -> PathBuf {
    std::env::var("CMG_DUMP_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("cmg-dump"))
}

/// Default target database (resolved against the base dir when relative)
pub fn default_target_database() -> PathBuf {
    std::env::var("BIOLOOP_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("bioloop.db"))
}

/// CMG data products are visible unless the document says otherwise
pub fn default_visible() -> bool {
    true
}

/// Persist `cmg_id` on every inserted dataset
pub fn default_store_back_reference() -> bool {
    true
}

/// Upper bound for `Duplicate_{n}_{name}` probing
pub fn default_max_duplicate_attempts() -> u32 {
    1000
}

pub fn default_service_username() -> String {
    "cmguser".to_string()
}

pub fn default_service_email() -> String {
    "cmguser@localhost".to_string()
}

pub fn default_service_name() -> String {
    "CMG Service Account".to_string()
}

/// CMG roles given to the service account (mapped like any other user)
pub fn default_service_roles() -> Vec<String> {
    vec!["admin".to_string()]
}

/// CMG role -> Bioloop role
pub fn default_role_mapping() -> BTreeMap<String, String> {
    [
        ("admin", "admin"),
        ("god", "admin"),
        ("user", "operator"),
        ("guest", "user"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Roles seeded into the target before users are converted
pub const BIOLOOP_ROLES: &[(&str, &str)] = &[
    ("admin", "Access to the Admin Panel"),
    ("operator", "Operator level access"),
    ("user", "User level access"),
];
