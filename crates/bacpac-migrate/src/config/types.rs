//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::MigrateError;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database the BACPAC is exported from.
    pub source: EndpointConfig,

    /// Database the BACPAC is imported into.
    pub destination: DestinationConfig,

    /// Where and how the BACPAC file is produced.
    #[serde(default)]
    pub artifact: ArtifactConfig,

    /// SqlPackage discovery and diagnostics.
    #[serde(default)]
    pub tool: ToolConfig,

    /// Run history store (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Source database endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Server name or address.
    pub server: String,

    /// Database name.
    pub database: String,

    /// Hosting platform (default: cloud).
    #[serde(default)]
    pub kind: PlatformKind,
}

/// Destination database endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Server name or address.
    pub server: String,

    /// Database name. Also names the BACPAC file.
    pub database: String,

    /// Hosting platform (default: cloud).
    #[serde(default)]
    pub kind: PlatformKind,

    /// Service objective applied to cloud databases on import.
    #[serde(default = "default_service_tier")]
    pub service_tier: String,
}

/// BACPAC file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Directory that holds the BACPAC file (default: <temp>/bacpac-migrate).
    #[serde(default = "default_artifact_directory")]
    pub directory: PathBuf,

    /// What to delete and recreate before running (default: none).
    #[serde(default)]
    pub clobber: ClobberMode,

    /// BACPAC compression level (default: fast).
    #[serde(default)]
    pub compression: CompressionMode,

    /// Directory SqlPackage spools table data to during export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_directory: Option<PathBuf>,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            directory: default_artifact_directory(),
            clobber: ClobberMode::default(),
            compression: CompressionMode::default(),
            temp_directory: None,
        }
    }
}

/// SqlPackage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Candidate SqlPackage paths (wildcards allowed). Replaces the built-in list when set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,

    /// Pass diagnostics flags to SqlPackage.
    #[serde(default)]
    pub diagnostics: bool,

    /// File SqlPackage writes diagnostics to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics_file: Option<PathBuf>,
}

/// Run history store settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// ADO.NET-style connection string for the history database.
    pub connection_string: String,
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("connection_string", &"[REDACTED]")
            .finish()
    }
}

/// Hosting platform of a database endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    /// Managed cloud SQL service.
    #[default]
    Cloud,

    /// Self-managed SQL Server instance.
    #[serde(alias = "onprem")]
    OnPrem,
}

/// Which pre-existing objects are deleted and recreated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClobberMode {
    /// Reuse an existing BACPAC, import over whatever is there.
    #[default]
    None,

    /// Re-export even if a BACPAC exists.
    Source,

    /// Drop the destination database before import.
    Destination,

    /// Both of the above.
    Both,
}

impl ClobberMode {
    /// Whether an existing BACPAC is deleted and re-exported.
    pub fn clobbers_artifact(self) -> bool {
        matches!(self, ClobberMode::Source | ClobberMode::Both)
    }

    /// Whether an existing destination database is dropped before import.
    pub fn clobbers_destination(self) -> bool {
        matches!(self, ClobberMode::Destination | ClobberMode::Both)
    }
}

/// BACPAC compression level passed to SqlPackage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMode {
    #[default]
    Fast,
    Optimal,
    Maximum,
    #[serde(alias = "nocompression")]
    NoCompression,
}

impl CompressionMode {
    /// Value of the `CompressionOption` property.
    pub fn as_property(self) -> &'static str {
        match self {
            CompressionMode::Fast => "Fast",
            CompressionMode::Optimal => "Optimal",
            CompressionMode::Maximum => "Maximum",
            CompressionMode::NoCompression => "NoCompression",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlatformKind::Cloud => "cloud",
            PlatformKind::OnPrem => "onprem",
        })
    }
}

impl fmt::Display for ClobberMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClobberMode::None => "none",
            ClobberMode::Source => "source",
            ClobberMode::Destination => "destination",
            ClobberMode::Both => "both",
        })
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompressionMode::Fast => "fast",
            CompressionMode::Optimal => "optimal",
            CompressionMode::Maximum => "maximum",
            CompressionMode::NoCompression => "no_compression",
        })
    }
}

impl FromStr for PlatformKind {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cloud" | "azure" => Ok(PlatformKind::Cloud),
            "onprem" | "on_prem" | "on-prem" => Ok(PlatformKind::OnPrem),
            _ => Err(MigrateError::Config(format!(
                "platform kind must be 'cloud' or 'onprem', got '{}'",
                s
            ))),
        }
    }
}

impl FromStr for ClobberMode {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(ClobberMode::None),
            "source" => Ok(ClobberMode::Source),
            "destination" => Ok(ClobberMode::Destination),
            "both" => Ok(ClobberMode::Both),
            _ => Err(MigrateError::Config(format!(
                "clobber mode must be one of none, source, destination, both; got '{}'",
                s
            ))),
        }
    }
}

impl FromStr for CompressionMode {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(CompressionMode::Fast),
            "optimal" => Ok(CompressionMode::Optimal),
            "maximum" => Ok(CompressionMode::Maximum),
            "nocompression" | "no_compression" | "none" => Ok(CompressionMode::NoCompression),
            _ => Err(MigrateError::Config(format!(
                "compression must be one of fast, optimal, maximum, nocompression; got '{}'",
                s
            ))),
        }
    }
}

// Default value functions for serde
fn default_service_tier() -> String {
    "GP_Gen5_2".to_string()
}

fn default_artifact_directory() -> PathBuf {
    std::env::temp_dir().join("bacpac-migrate")
}
