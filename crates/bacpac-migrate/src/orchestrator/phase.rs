//! States of a migration run.

use serde::Serialize;
use std::fmt;

/// A state of the migration state machine.
///
/// `Init → ToolResolved → PathResolved → (Exporting | ExportSkipped) →
/// ArtifactVerified → [DestinationChecked] → Importing → Completed`, with
/// `Failed` reachable from anywhere. A run enters a state before doing the
/// work that establishes it, so a failed run reports the state it was
/// entering (locating the tool fails in `ToolResolved`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    ToolResolved,
    PathResolved,
    Exporting,
    ExportSkipped,
    ArtifactVerified,
    DestinationChecked,
    Importing,
    Completed,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Init => "initialization",
            Phase::ToolResolved => "SqlPackage discovery",
            Phase::PathResolved => "BACPAC path resolution",
            Phase::Exporting => "export",
            Phase::ExportSkipped => "export reuse",
            Phase::ArtifactVerified => "BACPAC verification",
            Phase::DestinationChecked => "destination check",
            Phase::Importing => "import",
            Phase::Completed => "completion",
            Phase::Failed => "failure handling",
        })
    }
}
