//! Overwrite decisions for the BACPAC file and the destination database.

use crate::config::ClobberMode;

/// What the orchestrator must do before export and before import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClobberDecision {
    /// Delete the existing BACPAC before exporting.
    pub delete_artifact: bool,
    /// Run the export (false means reuse the existing BACPAC).
    pub needs_export: bool,
    /// Drop the destination database before importing.
    pub drop_destination_first: bool,
}

impl ClobberDecision {
    /// Evaluate the clobber mode against the current state.
    pub fn evaluate(mode: ClobberMode, artifact_exists: bool, destination_exists: bool) -> Self {
        let mut decision = Self::for_artifact(mode, artifact_exists);
        decision.drop_destination_first = drop_destination_first(mode, destination_exists);
        decision
    }

    /// Artifact half of the decision, without knowing whether the destination exists.
    ///
    /// `drop_destination_first` is left false; callers that need it probe the
    /// destination only when [`ClobberMode::clobbers_destination`] holds.
    pub fn for_artifact(mode: ClobberMode, artifact_exists: bool) -> Self {
        let delete_artifact = mode.clobbers_artifact() && artifact_exists;
        Self {
            delete_artifact,
            needs_export: delete_artifact || !artifact_exists,
            drop_destination_first: false,
        }
    }
}

/// Whether an existing destination database must be dropped before import.
pub fn drop_destination_first(mode: ClobberMode, destination_exists: bool) -> bool {
    mode.clobbers_destination() && destination_exists
}
