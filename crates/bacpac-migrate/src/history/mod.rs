//! Run history: the timing record of one migration and where it is stored.
//!
//! A [`MigrationRun`] is owned by the orchestrator for the duration of a
//! run. [`RunLogger`] mirrors it into a [`HistoryStore`] after every phase
//! transition; that mirroring is best-effort and never changes the outcome
//! of the migration.

mod backend;
mod logger;
mod mssql_db;

#[cfg(test)]
pub(crate) mod memory;

pub use backend::{run_status_to_str, str_to_run_status, HistoryStore};
pub use logger::{RunHandle, RunLogger};
pub use mssql_db::MssqlHistoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::config::Config;

/// Run status. Moves forward only; `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Started,
    Exporting,
    Exported,
    Importing,
    Imported,
    Completed,
    Failed,
}

impl RunStatus {
    fn rank(self) -> u8 {
        match self {
            RunStatus::Started => 0,
            RunStatus::Exporting => 1,
            RunStatus::Exported => 2,
            RunStatus::Importing => 3,
            RunStatus::Imported => 4,
            RunStatus::Completed => 5,
            RunStatus::Failed => 6,
        }
    }

    /// Whether no further transitions are allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a forward transition.
    ///
    /// Steps may be skipped (a reused BACPAC goes from `Started` straight to
    /// `Importing`); `Failed` is reachable from every non-terminal status.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == RunStatus::Failed || next.rank() > self.rank()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(run_status_to_str(*self))
    }
}

/// Timing and outcome of one export + import run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRun {
    /// Identity assigned by the history store on first insert.
    pub id: Option<i64>,

    pub source_server: String,
    pub source_database: String,
    pub destination_server: String,
    pub destination_database: String,

    /// Overall start and end (UTC).
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Export phase start and end (UTC).
    pub export_started_at: Option<DateTime<Utc>>,
    pub export_completed_at: Option<DateTime<Utc>>,

    /// Import phase start and end (UTC).
    pub import_started_at: Option<DateTime<Utc>>,
    pub import_completed_at: Option<DateTime<Utc>>,

    /// BACPAC size in megabytes.
    pub artifact_size_mb: Option<f64>,

    /// Compression level used for the export.
    pub compression: String,

    pub status: RunStatus,

    /// Error message if failed.
    pub error: Option<String>,

    pub machine_name: String,
    pub user_name: String,
}

impl MigrationRun {
    /// Create a `Started` run for the given configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            id: None,
            source_server: config.source.server.clone(),
            source_database: config.source.database.clone(),
            destination_server: config.destination.server.clone(),
            destination_database: config.destination.database.clone(),
            started_at: Utc::now(),
            completed_at: None,
            export_started_at: None,
            export_completed_at: None,
            import_started_at: None,
            import_completed_at: None,
            artifact_size_mb: None,
            compression: config.artifact.compression.to_string(),
            status: RunStatus::Started,
            error: None,
            machine_name: machine_name(),
            user_name: user_name(),
        }
    }

    /// Move to `next`, stamping the matching phase timestamp.
    ///
    /// Returns false and leaves the run untouched if the transition would go
    /// backwards or leave a terminal status.
    pub fn advance(&mut self, next: RunStatus) -> bool {
        if !self.status.can_transition_to(next) {
            warn!(
                "Ignoring run status change {} -> {}",
                self.status, next
            );
            return false;
        }

        let now = Utc::now();
        match next {
            RunStatus::Started => {}
            RunStatus::Exporting => self.export_started_at = Some(now),
            RunStatus::Exported => self.export_completed_at = Some(now),
            RunStatus::Importing => self.import_started_at = Some(now),
            RunStatus::Imported => self.import_completed_at = Some(now),
            RunStatus::Completed | RunStatus::Failed => self.completed_at = Some(now),
        }
        self.status = next;
        true
    }

    /// Mark the run as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        let accepted = self.advance(RunStatus::Failed);
        if accepted {
            self.error = Some(error.into());
        }
        accepted
    }

    /// Overall duration in seconds, if the run has ended.
    pub fn duration_secs(&self) -> Option<i64> {
        seconds_between(Some(self.started_at), self.completed_at)
    }

    /// Export duration in seconds, if both endpoints are recorded.
    pub fn export_duration_secs(&self) -> Option<i64> {
        seconds_between(self.export_started_at, self.export_completed_at)
    }

    /// Import duration in seconds, if both endpoints are recorded.
    pub fn import_duration_secs(&self) -> Option<i64> {
        seconds_between(self.import_started_at, self.import_completed_at)
    }
}

fn seconds_between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<i64> {
    Some((end? - start?).num_seconds())
}

fn machine_name() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string())
}

fn user_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
