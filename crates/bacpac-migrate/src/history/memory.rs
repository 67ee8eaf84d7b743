//! In-memory history store for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{HistoryStore, MigrationRun, RunStatus};
use crate::error::{MigrateError, Result};

/// Keeps rows in a vector and records every status written.
#[derive(Default)]
pub(crate) struct MemoryHistoryStore {
    tables_created: Mutex<usize>,
    rows: Mutex<Vec<MigrationRun>>,
    writes: Mutex<Vec<RunStatus>>,
    fail_writes: AtomicBool,
}

impl MemoryHistoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A store whose every write fails.
    pub(crate) fn failing() -> Self {
        let store = Self::default();
        store.set_failing(true);
        store
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn tables_created(&self) -> usize {
        *self.tables_created.lock().unwrap()
    }

    pub(crate) fn rows(&self) -> Vec<MigrationRun> {
        self.rows.lock().unwrap().clone()
    }

    /// Statuses in the order they were written.
    pub(crate) fn written_statuses(&self) -> Vec<RunStatus> {
        self.writes.lock().unwrap().clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MigrateError::History("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn ensure_schema(&self) -> Result<()> {
        self.check_writable()?;
        let mut created = self.tables_created.lock().unwrap();
        if *created == 0 {
            *created = 1;
        }
        Ok(())
    }

    async fn insert(&self, run: &MigrationRun) -> Result<i64> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let id = rows.len() as i64 + 1;
        let mut stored = run.clone();
        stored.id = Some(id);
        rows.push(stored);
        self.writes.lock().unwrap().push(run.status);
        Ok(id)
    }

    async fn update(&self, id: i64, run: &MigrationRun) -> Result<()> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.id == Some(id))
            .ok_or_else(|| MigrateError::History(format!("run {} not found", id)))?;
        *row = MigrationRun {
            id: Some(id),
            ..run.clone()
        };
        self.writes.lock().unwrap().push(run.status);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<MigrationRun>> {
        let mut rows = self.rows();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        rows.truncate(limit);
        Ok(rows)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
