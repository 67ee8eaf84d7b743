//! Best-effort mirroring of run records into a history store.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{HistoryStore, MigrationRun, MssqlHistoryStore};
use crate::config::LoggingConfig;
use crate::error::Result;

/// Identity of a run in the history store.
///
/// A handle from a disabled logger is a no-op: recording through it does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunHandle {
    id: Option<i64>,
    enabled: bool,
}

impl RunHandle {
    fn noop() -> Self {
        Self {
            id: None,
            enabled: false,
        }
    }

    /// Identity assigned by the store, once the run has been inserted.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Whether records written through this handle reach a store.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Writes run records to an optional history store, never failing the caller.
#[derive(Clone, Default)]
pub struct RunLogger {
    store: Option<Arc<dyn HistoryStore>>,
}

impl RunLogger {
    /// Logger backed by `store`.
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Logger that records nothing.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    /// Connect to the configured store.
    ///
    /// With no configuration, or when the store cannot be reached, the
    /// returned logger is disabled and the run proceeds without history.
    pub async fn connect(config: Option<&LoggingConfig>) -> Self {
        let Some(config) = config else {
            debug!("No history store configured");
            return Self::disabled();
        };

        match MssqlHistoryStore::connect(&config.connection_string).await {
            Ok(store) => Self::new(Arc::new(store)),
            Err(e) => {
                warn!("History store unavailable, run will not be recorded: {}", e);
                Self::disabled()
            }
        }
    }

    /// Whether a store is attached.
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// The attached store, for read access (e.g. listing recent runs).
    pub fn store(&self) -> Option<&Arc<dyn HistoryStore>> {
        self.store.as_ref()
    }

    /// Create the history table if needed. Returns whether the schema is ready.
    pub async fn ensure_schema(&self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        match store.ensure_schema().await {
            Ok(()) => {
                debug!("History schema ready ({})", store.backend_type());
                true
            }
            Err(e) => {
                warn!("Failed to prepare history schema: {}", e);
                false
            }
        }
    }

    /// Insert the `Started` record for a run.
    ///
    /// If the insert fails the handle stays enabled without an identity, so
    /// the next [`record`](Self::record) retries the insert.
    pub async fn begin(&self, run: &MigrationRun) -> RunHandle {
        let Some(store) = &self.store else {
            return RunHandle::noop();
        };
        match store.insert(run).await {
            Ok(id) => {
                info!("Recording run history as run {}", id);
                RunHandle {
                    id: Some(id),
                    enabled: true,
                }
            }
            Err(e) => {
                warn!("Failed to record run start: {}", e);
                RunHandle {
                    id: None,
                    enabled: true,
                }
            }
        }
    }

    /// Write the current state of `run`.
    ///
    /// Inserts when the handle has no identity yet, updates otherwise.
    /// Failures are logged and swallowed.
    pub async fn record(&self, handle: &mut RunHandle, run: &MigrationRun) {
        if !handle.enabled {
            return;
        }
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = Self::upsert(store.as_ref(), handle, run).await {
            warn!("Failed to record run status '{}': {}", run.status, e);
        }
    }

    async fn upsert(
        store: &dyn HistoryStore,
        handle: &mut RunHandle,
        run: &MigrationRun,
    ) -> Result<()> {
        match handle.id {
            Some(id) => store.update(id, run).await,
            None => {
                handle.id = Some(store.insert(run).await?);
                Ok(())
            }
        }
    }
}
