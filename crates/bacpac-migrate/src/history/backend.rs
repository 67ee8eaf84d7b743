//! History store trait for run records.
//!
//! The [`HistoryStore`] trait defines where [`MigrationRun`] records are
//! persisted. The orchestrator only ever talks to it through
//! [`super::RunLogger`], which turns every store failure into a warning.

use async_trait::async_trait;

use super::{MigrationRun, RunStatus};
use crate::error::{MigrateError, Result};

/// Trait for run history persistence backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow sharing across async tasks.
///
/// # Example
///
/// ```rust,ignore
/// let store: Arc<dyn HistoryStore> = Arc::new(MssqlHistoryStore::connect(cs).await?);
/// store.ensure_schema().await?;
/// let id = store.insert(&run).await?;
/// store.update(id, &run).await?;
/// ```
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Create the backing table and indexes if they do not exist.
    ///
    /// This should be idempotent - safe to call multiple times.
    async fn ensure_schema(&self) -> Result<()>;

    /// Insert a new run and return the identity the store assigned to it.
    async fn insert(&self, run: &MigrationRun) -> Result<i64>;

    /// Overwrite the mutable columns of the run with identity `id`.
    async fn update(&self, id: i64, run: &MigrationRun) -> Result<()>;

    /// Most recent runs, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<MigrationRun>>;

    /// Get the backend type name for logging/debugging.
    fn backend_type(&self) -> &'static str;
}

/// Helper function to convert RunStatus to string representation.
pub fn run_status_to_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Started => "started",
        RunStatus::Exporting => "exporting",
        RunStatus::Exported => "exported",
        RunStatus::Importing => "importing",
        RunStatus::Imported => "imported",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
    }
}

/// Helper function to parse RunStatus from string.
pub fn str_to_run_status(s: &str) -> Result<RunStatus> {
    match s {
        "started" => Ok(RunStatus::Started),
        "exporting" => Ok(RunStatus::Exporting),
        "exported" => Ok(RunStatus::Exported),
        "importing" => Ok(RunStatus::Importing),
        "imported" => Ok(RunStatus::Imported),
        "completed" => Ok(RunStatus::Completed),
        "failed" => Ok(RunStatus::Failed),
        _ => Err(MigrateError::History(format!("Invalid run status: {}", s))),
    }
}
