//! End-to-end migration of a small mongoexport dump

use cmg_migrate::commands::{cmd_migrate, cmd_status, cmd_verify, MigrateOptions};
use cmg_migrate::config::Config;
use cmg_migrate::target::TargetDb;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use std::path::Path;
use tempfile::TempDir;

const USERS: &str = r#"[
  {"_id": {"$oid": "u0000000000000000000001"}, "username": "alice", "email": "alice@example.org",
   "fullname": "Alice A", "roles": ["admin"], "active": true},
  {"_id": {"$oid": "u0000000000000000000002"}, "username": "bob", "email": "bob@example.org",
   "roles": ["user"], "active": true}
]"#;

// mongoexport's default output: one document per line
const DATASETS: &str = r#"{"_id": {"$oid": "r0000000000000000000001"}, "name": "run1", "files": 3, "du_size": {"$numberLong": "4096"}, "size": 2048, "createdAt": {"$date": "2021-10-05T19:39:40.126Z"}}
{"_id": {"$oid": "r0000000000000000000002"}, "name": "run1", "files": 1, "size": 10}
{"_id": {"$oid": "r0000000000000000000003"}, "size": 5}
"#;

const DATAPRODUCTS: &str = r#"[
  {"_id": {"$oid": "p0000000000000000000001"}, "name": "run1_fastq", "visible": true,
   "dataset": {"$oid": "r0000000000000000000001"},
   "files": [
     {"path": "a/b/x.fq", "size": {"$numberLong": "10"}, "md5": "m1"},
     {"path": "a/b/y.fq", "size": 20}
   ],
   "events": [{"description": "created", "stamp": {"$date": "2021-10-06T08:00:00.000Z"}}]},
  {"_id": {"$oid": "p0000000000000000000002"}, "name": "run1_fastq", "visible": false,
   "dataset": {"$oid": "r0000000000000000000002"}}
]"#;

const PROJECTS: &str = r#"[
  {"_id": {"$oid": "j0000000000000000000001"}, "name": "Genome Study", "browser": true,
   "users": [{"$oid": "u0000000000000000000001"}],
   "groups": [{"$oid": "g0000000000000000000001"}],
   "dataproducts": [{"$oid": "p0000000000000000000001"}, {"$oid": "p0000000000000000000002"}]}
]"#;

const GROUPS: &str = r#"[
  {"_id": {"$oid": "g0000000000000000000001"}, "name": "lab",
   "members": [{"$oid": "u0000000000000000000002"}]}
]"#;

const EVENTS: &str = r#"[
  {"_id": {"$oid": "e0000000000000000000001"}, "user": {"$oid": "u0000000000000000000001"},
   "action": "stage", "details": "to scratch", "dataproduct": {"$oid": "p0000000000000000000001"}},
  {"_id": {"$oid": "e0000000000000000000002"}, "action": "login"}
]"#;

const CONTENT: &str = r#"[{"_id": {"$oid": "c0000000000000000000001"}, "name": "about", "details": "Hello\n\nWorld"}]"#;

fn write_dump(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    for (file, content) in [
        ("users.json", USERS),
        ("datasets.jsonl", DATASETS),
        ("dataproducts.json", DATAPRODUCTS),
        ("projects.json", PROJECTS),
        ("groups.json", GROUPS),
        ("events.json", EVENTS),
        ("contents.json", CONTENT),
    ] {
        std::fs::write(dir.join(file), content).unwrap();
    }
}

fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.init_paths(Some(tmp.path().to_path_buf()));
    config.source.dump_dir = tmp.path().join("dump");
    config.target.database = tmp.path().join("bioloop.db");
    config
}

async fn query_names(config: &Config, sql: &str) -> Vec<String> {
    let mut conn = SqliteConnectOptions::new()
        .filename(config.target_database())
        .connect()
        .await
        .unwrap();
    let names = sqlx::query_scalar(sql).fetch_all(&mut conn).await.unwrap();
    conn.close().await.unwrap();
    names
}

#[tokio::test]
async fn test_full_migration() {
    let tmp = TempDir::new().unwrap();
    write_dump(&tmp.path().join("dump"));
    let config = test_config(&tmp);
    let db = TargetDb::connect(&config).await.unwrap();

    let report = cmd_migrate(&config, &db, MigrateOptions::default())
        .await
        .unwrap();

    let passes: Vec<(&str, usize)> = report
        .passes
        .iter()
        .map(|p| (p.pass.as_str(), p.converted))
        .collect();
    assert_eq!(
        passes,
        vec![
            ("roles", 3),
            ("users", 3),
            ("datasets", 3),
            ("dataproducts", 2),
            ("audit", 2),
            ("hierarchy", 2),
            ("files", 2),
            ("projects", 1),
            ("about", 1),
        ]
    );
    assert_eq!(report.skipped(), 0);
    assert_eq!(report.unknown_names, 1);

    let verify = cmd_verify(&config, &db).await.unwrap();
    assert!(verify.is_consistent(), "{:?}", verify.checks);

    let status = cmd_status(&config, &db).await.unwrap();
    assert_eq!((status.raw_datasets, status.data_products), (3, 2));
    let rows = |table: &str| {
        status
            .tables
            .iter()
            .find(|t| t.table == table)
            .map(|t| t.rows)
            .unwrap()
    };
    assert_eq!(rows("dataset_file"), 4);
    assert_eq!(rows("dataset_file_hierarchy"), 3);
    assert_eq!(rows("project_user"), 2);
    assert_eq!(rows("project_dataset"), 2);
    db.close().await;

    let names = query_names(&config, "SELECT name FROM dataset ORDER BY id").await;
    assert_eq!(
        names,
        vec![
            "Duplicate_run1",
            "Duplicate_2_run1",
            "UNKNOWN",
            "run1_fastq",
            "Duplicate_run1_fastq",
        ]
    );

    let actions = query_names(&config, "SELECT action FROM dataset_audit ORDER BY id").await;
    assert_eq!(actions, vec!["created", "stage - to scratch"]);
}

#[tokio::test]
async fn test_reset_makes_migration_repeatable() {
    let tmp = TempDir::new().unwrap();
    write_dump(&tmp.path().join("dump"));
    let config = test_config(&tmp);
    let db = TargetDb::connect(&config).await.unwrap();

    let first = cmd_migrate(&config, &db, MigrateOptions::default())
        .await
        .unwrap();
    let second = cmd_migrate(&config, &db, MigrateOptions { reset: true })
        .await
        .unwrap();

    assert_eq!(first.converted(), second.converted());
    assert_eq!(second.skipped(), 0);
    assert_eq!(db.count_datasets("RAW_DATA".parse().unwrap()).await.unwrap(), 3);
    db.close().await;
}

#[tokio::test]
async fn test_missing_dump_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let db = TargetDb::connect(&config).await.unwrap();

    assert!(cmd_migrate(&config, &db, MigrateOptions::default())
        .await
        .is_err());
    db.close().await;
}
