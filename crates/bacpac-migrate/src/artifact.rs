//! BACPAC file location and lifecycle helpers.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MigrateError, Result};

/// File extension of the exported archive.
pub const ARTIFACT_EXTENSION: &str = "bacpac";

/// Derive the BACPAC path for a destination database, creating the directory if needed.
pub fn resolve_artifact_path(directory: &Path, destination_database: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(directory)
        .map_err(|e| MigrateError::path_creation(directory, e))?;

    let path = directory.join(format!("{}.{}", destination_database, ARTIFACT_EXTENSION));
    debug!("BACPAC path: {}", path.display());
    Ok(path)
}

/// Whether a BACPAC exists at `path` as a regular file.
pub fn artifact_exists(path: &Path) -> bool {
    path.is_file()
}

/// Size of the file at `path` in megabytes, if it can be read.
pub fn artifact_size_mb(path: &Path) -> Option<f64> {
    std::fs::metadata(path)
        .ok()
        .map(|m| m.len() as f64 / (1024.0 * 1024.0))
}
