//! SqlPackage discovery, argument assembly and invocation.
//!
//! [`ToolLocator`] expands a list of candidate path patterns, reads a version
//! for every match and selects the highest one. [`command`] builds the
//! export and import argument lists, and [`ToolRunner`] runs the tool and
//! reports its exit code.

pub mod command;
mod runner;
mod version;

pub use command::{Diagnostics, SqlPackageAction};
pub use runner::{ProcessRunner, ToolRunner};
pub use version::{PathVersionReader, ToolVersion, VersionReader};

use glob_match::glob_match;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::config::ToolConfig;
use crate::error::{MigrateError, Result};

/// A discovered SqlPackage executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInstallation {
    /// Path to the executable.
    pub path: PathBuf,
    /// Version read from the installation, `0.0.0.0` when unknown.
    pub version: ToolVersion,
}

/// Finds the newest SqlPackage among a set of candidate path patterns.
pub struct ToolLocator {
    candidates: Vec<String>,
    reader: Box<dyn VersionReader>,
}

impl ToolLocator {
    /// Create a locator over the given patterns using [`PathVersionReader`].
    pub fn new(candidates: Vec<String>) -> Self {
        Self {
            candidates,
            reader: Box::new(PathVersionReader),
        }
    }

    /// Create a locator over the platform's usual install locations.
    pub fn with_default_candidates() -> Self {
        Self::new(default_candidates())
    }

    /// Locator for a tool configuration: explicit paths when given, else the defaults.
    pub fn from_config(tool: &ToolConfig) -> Self {
        if tool.paths.is_empty() {
            Self::with_default_candidates()
        } else {
            Self::new(tool.paths.clone())
        }
    }

    /// Replace the version reader.
    pub fn with_reader(mut self, reader: Box<dyn VersionReader>) -> Self {
        self.reader = reader;
        self
    }

    /// Patterns this locator searches, in order.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Every installation matching a candidate pattern, in discovery order.
    pub fn discover(&self) -> Vec<ToolInstallation> {
        let mut found: Vec<ToolInstallation> = Vec::new();
        for pattern in &self.candidates {
            for path in expand_pattern(pattern) {
                if !path.is_file() || found.iter().any(|i| i.path == path) {
                    continue;
                }
                let version = self.reader.read_version(&path).unwrap_or_default();
                debug!("Found SqlPackage {} at {}", version, path.display());
                found.push(ToolInstallation { path, version });
            }
        }
        found
    }

    /// Select the installation with the highest version. Ties keep the first found.
    pub fn locate(&self) -> Result<ToolInstallation> {
        let mut best: Option<ToolInstallation> = None;
        for installation in self.discover() {
            match &best {
                Some(current) if installation.version <= current.version => {}
                _ => best = Some(installation),
            }
        }

        let selected = best.ok_or_else(|| MigrateError::ToolNotFound {
            searched: self.candidates.clone(),
        })?;
        info!(
            "Using SqlPackage {} at {}",
            selected.version,
            selected.path.display()
        );
        Ok(selected)
    }
}

/// Expand wildcard segments (`*`, `?`, `[...]`) by listing directory entries.
///
/// Matches within one segment are visited in name order so discovery order
/// is stable across runs.
pub fn expand_pattern(pattern: &str) -> Vec<PathBuf> {
    let mut current = vec![PathBuf::new()];

    for component in Path::new(pattern).components() {
        let segment = match component {
            Component::Normal(name) => name.to_string_lossy().into_owned(),
            other => {
                for base in &mut current {
                    base.push(other.as_os_str());
                }
                continue;
            }
        };

        if !is_wildcard(&segment) {
            for base in &mut current {
                base.push(&segment);
            }
            continue;
        }

        let mut next = Vec::new();
        for base in &current {
            let dir = if base.as_os_str().is_empty() {
                Path::new(".")
            } else {
                base.as_path()
            };
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            let mut names: Vec<String> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| glob_match(&segment, name))
                .collect();
            names.sort();
            next.extend(names.into_iter().map(|name| base.join(name)));
        }
        current = next;
    }

    current
}

fn is_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?', '['])
}

/// Install locations searched when no explicit paths are configured.
pub fn default_candidates() -> Vec<String> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_default();

    let mut candidates = Vec::new();

    if cfg!(windows) {
        for program_files in [r"C:\Program Files", r"C:\Program Files (x86)"] {
            candidates.push(format!(
                r"{}\Microsoft SQL Server\*\DAC\bin\SqlPackage.exe",
                program_files
            ));
            candidates.push(format!(
                r"{}\Microsoft Visual Studio\*\*\Common7\IDE\Extensions\Microsoft\SQLDB\DAC\SqlPackage.exe",
                program_files
            ));
        }
        if !home.is_empty() {
            candidates.push(format!(r"{}\.dotnet\tools\sqlpackage.exe", home));
        }
    } else {
        candidates.push("/opt/sqlpackage/*/sqlpackage".to_string());
        candidates.push("/opt/sqlpackage/sqlpackage".to_string());
        candidates.push("/usr/local/bin/sqlpackage".to_string());
        if !home.is_empty() {
            candidates.push(format!("{}/.dotnet/tools/sqlpackage", home));
            candidates.push(format!("{}/sqlpackage/sqlpackage", home));
        }
    }

    candidates
}
