//! Bioloop schema definition (SQLite dialect)

/// SQL schema for the Bioloop database
pub const SCHEMA_SQL: &str = r#"
-- Accounts
CREATE TABLE IF NOT EXISTS "user" (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    name TEXT,
    cas_id TEXT UNIQUE,
    is_deleted BOOLEAN NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS role (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS user_role (
    user_id INTEGER NOT NULL REFERENCES "user"(id),
    role_id INTEGER NOT NULL REFERENCES role(id),
    assigned_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (user_id, role_id)
);

-- Datasets: one row per migrated raw dataset or data product
CREATE TABLE IF NOT EXISTS dataset (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cmg_id TEXT UNIQUE,
    name TEXT NOT NULL,
    type TEXT NOT NULL CHECK (type IN ('RAW_DATA', 'DATA_PRODUCT')),
    num_directories INTEGER,
    num_files INTEGER,
    du_size INTEGER,
    size INTEGER,
    description TEXT,
    is_deleted BOOLEAN NOT NULL DEFAULT 0,
    is_staged BOOLEAN NOT NULL DEFAULT 0,
    origin_path TEXT,
    archive_path TEXT,
    metadata TEXT,
    created_at TEXT,
    updated_at TEXT,
    UNIQUE (name, type, is_deleted)
);

CREATE TABLE IF NOT EXISTS dataset_hierarchy (
    source_id INTEGER NOT NULL REFERENCES dataset(id),
    derived_id INTEGER NOT NULL REFERENCES dataset(id),
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (source_id, derived_id)
);

CREATE TABLE IF NOT EXISTS dataset_audit (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    action TEXT NOT NULL,
    timestamp TEXT,
    old_data TEXT,
    new_data TEXT,
    dataset_id INTEGER REFERENCES dataset(id),
    user_id INTEGER REFERENCES "user"(id)
);

-- Dataset file trees
CREATE TABLE IF NOT EXISTS dataset_file (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    path TEXT NOT NULL,
    md5 TEXT,
    size INTEGER,
    filetype TEXT CHECK (filetype IN ('file', 'directory')),
    metadata TEXT,
    dataset_id INTEGER NOT NULL REFERENCES dataset(id),
    UNIQUE (path, dataset_id)
);

CREATE TABLE IF NOT EXISTS dataset_file_hierarchy (
    parent_id INTEGER NOT NULL REFERENCES dataset_file(id),
    child_id INTEGER NOT NULL REFERENCES dataset_file(id),
    PRIMARY KEY (parent_id, child_id)
);

-- Projects
CREATE TABLE IF NOT EXISTS project (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    description TEXT,
    browser_enabled BOOLEAN NOT NULL DEFAULT 0,
    funding TEXT,
    metadata TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS project_user (
    project_id TEXT NOT NULL REFERENCES project(id),
    user_id INTEGER NOT NULL REFERENCES "user"(id),
    assigned_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (project_id, user_id)
);

CREATE TABLE IF NOT EXISTS project_dataset (
    project_id TEXT NOT NULL REFERENCES project(id),
    dataset_id INTEGER NOT NULL REFERENCES dataset(id),
    assigned_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (project_id, dataset_id)
);

-- Site content and workflow bookkeeping
CREATE TABLE IF NOT EXISTS about (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    html TEXT NOT NULL,
    last_updated_by_id INTEGER REFERENCES "user"(id),
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS workflow (
    id TEXT PRIMARY KEY,
    dataset_id INTEGER NOT NULL REFERENCES dataset(id),
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_dataset_type_deleted ON dataset(type, is_deleted);
CREATE INDEX IF NOT EXISTS idx_dataset_file_dataset ON dataset_file(dataset_id);
CREATE INDEX IF NOT EXISTS idx_dataset_audit_dataset ON dataset_audit(dataset_id);
"#;

/// Drops every Bioloop table, dependents first
pub const DROP_SQL: &str = r#"
DROP TABLE IF EXISTS workflow;
DROP TABLE IF EXISTS about;
DROP TABLE IF EXISTS project_dataset;
DROP TABLE IF EXISTS project_user;
DROP TABLE IF EXISTS project;
DROP TABLE IF EXISTS dataset_file_hierarchy;
DROP TABLE IF EXISTS dataset_file;
DROP TABLE IF EXISTS dataset_audit;
DROP TABLE IF EXISTS dataset_hierarchy;
DROP TABLE IF EXISTS dataset;
DROP TABLE IF EXISTS user_role;
DROP TABLE IF EXISTS role;
DROP TABLE IF EXISTS "user";
"#;

/// Tables reported by `status`, in creation order
pub const TABLES: &[&str] = &[
    "user",
    "role",
    "user_role",
    "dataset",
    "dataset_hierarchy",
    "dataset_audit",
    "dataset_file",
    "dataset_file_hierarchy",
    "project",
    "project_user",
    "project_dataset",
    "about",
    "workflow",
];
