//! SqlPackage version metadata.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Four-part version (major.minor.build.revision).
///
/// Ordering is lexicographic over the parts; the default is `0.0.0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ToolVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl ToolVersion {
    pub fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for ToolVersion {
    type Err = String;

    /// Parse one to four dot-separated numeric parts; missing parts are zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(format!("invalid version '{}'", s));
        }

        let mut numbers = [0u32; 4];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| format!("invalid version '{}'", s))?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2], numbers[3]))
    }
}

/// Reads the version of a SqlPackage installation.
pub trait VersionReader: Send + Sync {
    /// Version of the executable at `path`, or `None` when it cannot be determined.
    fn read_version(&self, path: &Path) -> Option<ToolVersion>;
}

/// Reads the version from the install directory layout.
///
/// Walks the path from the executable upwards and returns the first
/// dotted version segment (`162.1.167`, `16.0.1.0`). If there is none, a
/// bare two- or three-digit segment (the `Microsoft SQL Server\160` style)
/// is taken as the major version.
///
/// A .NET global tool shim (`~/.dotnet/tools/sqlpackage`) has no version in
/// its path; its version is the highest one installed under the sibling
/// `.store/microsoft.sqlpackage/` directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathVersionReader;

/// Package directory of SqlPackage inside a .NET tool store.
const STORE_PACKAGE: &str = "microsoft.sqlpackage";

impl PathVersionReader {
    fn from_segments(path: &Path) -> Option<ToolVersion> {
        let segments: Vec<String> = path
            .ancestors()
            .skip(1)
            .filter_map(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        segments
            .iter()
            .filter(|s| s.contains('.'))
            .find_map(|s| s.parse().ok())
            .or_else(|| {
                segments
                    .iter()
                    .filter(|s| (2..=3).contains(&s.len()))
                    .find_map(|s| s.parse().ok())
            })
    }

    fn from_tool_store(path: &Path) -> Option<ToolVersion> {
        let store = path.parent()?.join(".store");
        let stem = path.file_stem()?.to_string_lossy().to_lowercase();

        [STORE_PACKAGE.to_string(), stem]
            .iter()
            .filter_map(|package| std::fs::read_dir(store.join(package)).ok())
            .flat_map(|entries| entries.filter_map(|entry| entry.ok()))
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_string_lossy().parse().ok())
            .max()
    }
}

impl VersionReader for PathVersionReader {
    fn read_version(&self, path: &Path) -> Option<ToolVersion> {
        Self::from_segments(path).or_else(|| Self::from_tool_store(path))
    }
}
