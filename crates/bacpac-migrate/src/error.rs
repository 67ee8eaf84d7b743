//! Error types for the migration library.

use std::path::PathBuf;

use thiserror::Error;

use crate::orchestrator::Phase;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// No SqlPackage installation matched any candidate path.
    #[error("SqlPackage not found. Searched:\n  {}", .searched.join("\n  "))]
    ToolNotFound { searched: Vec<String> },

    /// Artifact directory could not be created.
    #[error("Cannot create artifact directory {}: {source}", .path.display())]
    PathCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SqlPackage export exited with a non-zero code.
    #[error("Export failed: SqlPackage exited with code {code}")]
    ExportFailed { code: i32 },

    /// SqlPackage import exited with a non-zero code.
    #[error("Import failed: SqlPackage exited with code {code}")]
    ImportFailed { code: i32 },

    /// Artifact file absent after export or when export was skipped.
    #[error("BACPAC file not found at {}", .0.display())]
    ArtifactMissing(PathBuf),

    /// Logging store or destination server error
    #[error("Database error: {0}")]
    Database(#[from] tiberius::error::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Run history store error
    #[error("History store error: {0}")]
    History(String),

    /// A run aborted; wraps the fatal error with the phase it occurred in.
    #[error("Migration failed during {phase}: {source}{}", retained_hint(.artifact))]
    RunFailed {
        phase: Phase,
        #[source]
        source: Box<MigrateError>,
        artifact: Option<PathBuf>,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn retained_hint(artifact: &Option<PathBuf>) -> String {
    match artifact {
        Some(path) => format!(" (BACPAC retained at {} for retry)", path.display()),
        None => String::new(),
    }
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a PathCreation error for the given directory
    pub fn path_creation(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrateError::PathCreation {
            path: path.into(),
            source,
        }
    }

    /// The phase a run failed in, if this is a run failure.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            MigrateError::RunFailed { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// The innermost error, unwrapping a run failure.
    pub fn root(&self) -> &MigrateError {
        match self {
            MigrateError::RunFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self.root() {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::ToolNotFound { .. } => 3,
            MigrateError::ExportFailed { .. } => 4,
            MigrateError::ImportFailed { .. } => 5,
            MigrateError::ArtifactMissing(_) => 6,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
