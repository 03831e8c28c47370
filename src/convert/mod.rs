//! Entity converters, one per migration pass
//!
//! Every pass runs inside the transaction its caller opened. Each record is
//! converted inside a savepoint: record-level failures roll the savepoint
//! back, are logged and counted, and the pass moves on. Any other error
//! aborts the pass.

pub mod about;
pub mod audit;
pub mod datasets;
pub mod files;
pub mod hierarchy;
pub mod projects;
pub mod users;

pub use files::ingest_file;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolve::DatasetMatcher;
use crate::source::SourceSnapshot;
use crate::target::find_user_id_by_username;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use tracing::{debug, error, warn};

/// A source record that was not migrated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub id: String,
    pub name: Option<String>,
    pub reason: String,
    pub message: String,
}

/// Outcome of one pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassStats {
    pub pass: String,
    pub converted: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl PassStats {
    pub fn new(pass: &str) -> Self {
        Self {
            pass: pass.to_string(),
            ..Default::default()
        }
    }

    /// Commit or roll back a record's savepoint according to its outcome.
    ///
    /// Returns `Ok(None)` for a skipped record and `Err` only for errors
    /// that must abort the pass.
    pub async fn settle<T>(
        &mut self,
        savepoint: Transaction<'_, Sqlite>,
        outcome: Result<T>,
        id: &str,
        name: Option<&str>,
    ) -> Result<Option<T>> {
        match outcome {
            Ok(value) => {
                savepoint.commit().await?;
                self.converted += 1;
                Ok(Some(value))
            }
            Err(e) if e.is_record_level() => {
                savepoint.rollback().await?;
                self.skip(id, name, &e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Keep a record-level failure from aborting the pass
    pub fn absorb<T>(&mut self, outcome: Result<T>, id: &str, name: Option<&str>) -> Result<Option<T>> {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_record_level() => {
                self.skip(id, name, &e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Record and log a skipped source record
    pub fn skip(&mut self, id: &str, name: Option<&str>, err: &Error) {
        let label = name.unwrap_or("-");
        match err {
            Error::AmbiguousMatch {
                candidates, score, ..
            } => error!(
                pass = %self.pass,
                id,
                name = label,
                candidates,
                score,
                "Ambiguous dataset match, record skipped"
            ),
            _ => warn!(
                pass = %self.pass,
                id,
                name = label,
                reason = err.reason(),
                "Skipping record: {}",
                err
            ),
        }

        self.skipped.push(SkippedRecord {
            id: id.to_string(),
            name: name.map(str::to_string),
            reason: err.reason().to_string(),
            message: err.to_string(),
        });
    }
}

/// Shared inputs of every pass
pub struct ConvertContext<'a> {
    pub config: &'a Config,
    pub snapshot: &'a SourceSnapshot,
    pub matcher: DatasetMatcher,
}

impl<'a> ConvertContext<'a> {
    pub fn new(config: &'a Config, snapshot: &'a SourceSnapshot) -> Self {
        Self {
            config,
            snapshot,
            matcher: DatasetMatcher::from_config(config),
        }
    }

    /// Id of the service account, once the users pass has created it
    pub async fn service_user_id(&self, conn: &mut SqliteConnection) -> Result<Option<i64>> {
        let id =
            find_user_id_by_username(conn, &self.config.accounts.service_username).await?;
        if id.is_none() {
            debug!(
                "Service account '{}' not found",
                self.config.accounts.service_username
            );
        }
        Ok(id)
    }

    /// Target id of a CMG user, by username
    pub async fn user_id_for(
        &self,
        conn: &mut SqliteConnection,
        cmg_user_id: &str,
    ) -> Result<Option<i64>> {
        let Some(username) = self
            .snapshot
            .users
            .iter()
            .find(|u| u.id == cmg_user_id)
            .and_then(|u| u.username.as_deref())
        else {
            return Ok(None);
        };
        find_user_id_by_username(conn, username).await
    }
}
