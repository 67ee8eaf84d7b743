//! SqlPackage argument lists.
//!
//! Connection strings travel inside these arguments, so callers log the
//! full list only at debug level.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{CompressionMode, PlatformKind};

/// SqlPackage action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlPackageAction {
    Export,
    Import,
}

impl fmt::Display for SqlPackageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SqlPackageAction::Export => "Export",
            SqlPackageAction::Import => "Import",
        })
    }
}

/// Diagnostics flags shared by export and import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub enabled: bool,
    pub file: Option<PathBuf>,
}

impl Diagnostics {
    fn push_args(&self, args: &mut Vec<String>) {
        if !self.enabled {
            return;
        }
        args.push("/Diagnostics:True".to_string());
        args.push("/DiagnosticsLevel:Verbose".to_string());
        if let Some(file) = &self.file {
            args.push(format!("/DiagnosticsFile:{}", file.display()));
        }
    }
}

/// Arguments for exporting a database to a BACPAC.
pub fn export_args(
    source_connection_string: &str,
    target_file: &Path,
    compression: CompressionMode,
    temp_directory: Option<&Path>,
    diagnostics: &Diagnostics,
) -> Vec<String> {
    let mut args = vec![
        format!("/Action:{}", SqlPackageAction::Export),
        format!("/SourceConnectionString:{}", source_connection_string),
        format!("/TargetFile:{}", target_file.display()),
        "/OverwriteFiles:True".to_string(),
        format!("/p:CompressionOption={}", compression.as_property()),
    ];
    if let Some(dir) = temp_directory {
        args.push(format!("/p:TempDirectoryForTableData={}", dir.display()));
    }
    diagnostics.push_args(&mut args);
    args
}

/// Arguments for importing a BACPAC into a database.
///
/// Only cloud destinations carry the service objective.
pub fn import_args(
    target_connection_string: &str,
    source_file: &Path,
    destination_kind: PlatformKind,
    service_tier: &str,
    diagnostics: &Diagnostics,
) -> Vec<String> {
    let mut args = vec![
        format!("/Action:{}", SqlPackageAction::Import),
        format!("/TargetConnectionString:{}", target_connection_string),
        format!("/SourceFile:{}", source_file.display()),
    ];
    match destination_kind {
        PlatformKind::Cloud => {
            args.push(format!("/p:DatabaseServiceObjective={}", service_tier));
        }
        PlatformKind::OnPrem => {}
    }
    diagnostics.push_args(&mut args);
    args
}
