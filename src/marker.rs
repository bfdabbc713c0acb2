//! The commit marker: a one-line file pinning the upstream commit a project
//! was last synchronized against.
//!
//! The marker is written only after a fresh resolution of the upstream
//! reference (`setup` with no marker, or `update-ref`). Replaying a setup
//! from an existing marker never advances it.

use std::fmt;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use porter_git::GitOid;
use serde::Serialize;
use tracing::debug;

use crate::fsutil::FsError;

/// A commit identifier as stored in the marker. Usually a full hex object id
/// but any single-token revision is accepted so a hand-edited marker still
/// resolves.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    /// Returns `None` for blank input or input containing whitespace.
    #[must_use]
    pub fn new(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(value.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<GitOid> for CommitId {
    fn from(oid: GitOid) -> Self {
        Self(oid.to_string())
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle on the marker file.
#[derive(Clone, Debug)]
pub struct CommitMarker {
    path: PathBuf,
}

impl CommitMarker {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the pinned commit. A missing or blank file is `Ok(None)`.
    ///
    /// # Errors
    /// Returns [`FsError`] if the file exists but cannot be read, or if its
    /// first line is not a single token.
    pub fn read(&self) -> Result<Option<CommitId>, FsError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FsError::new("read", &self.path, e)),
        };
        let line = content.lines().next().unwrap_or_default().trim();
        if line.is_empty() {
            return Ok(None);
        }
        CommitId::new(line).map(Some).ok_or_else(|| {
            FsError::new(
                "parse",
                &self.path,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("expected a single commit id, found '{line}'"),
                ),
            )
        })
    }

    /// Replace the marker atomically: write a sibling temp file, then rename
    /// it over the old one.
    ///
    /// # Errors
    /// Returns [`FsError`] if the temp file cannot be written or renamed.
    pub fn write(&self, commit: &CommitId) -> Result<(), FsError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| FsError::new("create", dir, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| FsError::new("create", dir, e))?;
        writeln!(tmp, "{commit}").map_err(|e| FsError::new("write", tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| FsError::new("sync", tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| FsError::new("rename", &self.path, e.error))?;

        debug!(path = %self.path.display(), %commit, "wrote commit marker");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_id_validation() {
        assert_eq!(CommitId::new("  abc123\n").unwrap().as_str(), "abc123");
        assert!(CommitId::new("").is_none());
        assert!(CommitId::new("a b").is_none());
    }

    #[test]
    fn missing_marker_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let marker = CommitMarker::new(dir.path().join("commit.sha"));
        assert_eq!(marker.read().unwrap(), None);
    }

    #[test]
    fn blank_marker_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commit.sha");
        fs::write(&path, "\n\n").unwrap();
        assert_eq!(CommitMarker::new(path).read().unwrap(), None);
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let marker = CommitMarker::new(dir.path().join("commit.sha"));
        let id = CommitId::new("0123456789abcdef0123456789abcdef01234567").unwrap();
        marker.write(&id).unwrap();
        assert_eq!(marker.read().unwrap(), Some(id.clone()));
        assert_eq!(
            fs::read_to_string(marker.path()).unwrap(),
            format!("{id}\n")
        );

        let next = CommitId::new("feedface").unwrap();
        marker.write(&next).unwrap();
        assert_eq!(marker.read().unwrap(), Some(next));
    }

    #[test]
    fn garbage_marker_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commit.sha");
        fs::write(&path, "not a commit\n").unwrap();
        let err = CommitMarker::new(path).read().unwrap_err();
        assert!(err.to_string().contains("not a commit"));
    }
}
