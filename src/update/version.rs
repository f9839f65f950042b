use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use semver::Version;
use tempfile::NamedTempFile;

use super::VersionStore;
use crate::error::{Result, UpdateError};

/// Reported by [`VersionStore::read`] when no version marker exists yet.
/// A missing marker is always stale, even against a feed tag of `0.0.0`.
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Plain-text version marker (`ver.ini`) inside the install directory
#[derive(Debug, Clone)]
pub struct FileVersionStore {
    path: PathBuf,
}

impl FileVersionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl VersionStore for FileVersionStore {
    fn read_marker(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(UpdateError::io(&self.path, e)),
        }
    }

    /// Replace the marker via a sibling temp file + rename so a crash never
    /// leaves a truncated version behind.
    fn write(&self, version: &str) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| UpdateError::io(dir, e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| UpdateError::io(dir, e))?;
        tmp.write_all(version.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| UpdateError::io(tmp.path().to_path_buf(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| UpdateError::io(&self.path, e.error))?;
        Ok(())
    }
}

/// Parse a version string (with or without 'v' prefix)
pub fn parse_version(version_str: &str) -> Option<Version> {
    let cleaned = version_str.trim().trim_start_matches(['v', 'V']);
    Version::parse(cleaned).ok()
}

/// True only when both sides are semver and `remote` is older than `installed`
pub fn is_downgrade(remote: &str, installed: &str) -> bool {
    match (parse_version(remote), parse_version(installed)) {
        (Some(remote), Some(installed)) => remote < installed,
        _ => false,
    }
}
