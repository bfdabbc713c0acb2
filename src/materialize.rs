//! Extract a commit's tree into a plain directory.
//!
//! The output is a checkout without a `.git`: every blob is written as a
//! regular file, executables keep their bit on unix, symlinks are written as
//! files holding the link target, and submodule entries are left out.
//! Entries that cannot be read or written are logged and reported as skipped;
//! only failing to resolve the reference or to create the output directory
//! is fatal.

use std::fs;
use std::path::Path;

use porter_git::{EntryMode, GitError, GitRepo, TreeWalk, WalkEntry};
use tracing::{debug, info, warn};

use crate::fsutil::{self, FsError};
use crate::marker::CommitId;

/// What a materialization produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterializeReport {
    /// The commit the reference resolved to.
    pub commit: CommitId,
    /// First line of the commit message.
    pub summary: String,
    pub files_written: usize,
    /// Paths that were not written, with the reason.
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: String,
}

/// Fatal materialization failure.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error(transparent)]
    Resolve(GitError),
    #[error(transparent)]
    Output(FsError),
}

impl From<MaterializeError> for crate::error::WorkspaceError {
    fn from(err: MaterializeError) -> Self {
        match err {
            MaterializeError::Resolve(e) => Self::Vcs(e),
            MaterializeError::Output(e) => Self::Filesystem(e),
        }
    }
}

/// Resolve `reference` and write its tree into `output_dir`.
///
/// `output_dir` is created if needed; existing files are overwritten but
/// not removed. Callers wipe it first when they want an exact copy.
///
/// # Errors
/// [`MaterializeError::Resolve`] if `reference` does not name a commit,
/// [`MaterializeError::Output`] if `output_dir` cannot be created.
pub fn materialize(
    repo: &dyn GitRepo,
    reference: &str,
    output_dir: &Path,
) -> Result<MaterializeReport, MaterializeError> {
    let info = repo.resolve_commit(reference).map_err(MaterializeError::Resolve)?;
    fs::create_dir_all(output_dir)
        .map_err(|e| MaterializeError::Output(FsError::new("create", output_dir, e)))?;

    debug!(reference, commit = %info.oid, "materializing tree");
    let mut report = MaterializeReport {
        commit: CommitId::from(info.oid),
        summary: info.summary,
        files_written: 0,
        skipped: Vec::new(),
    };

    for item in TreeWalk::new(repo, info.tree_oid) {
        match item {
            Ok(entry) => match write_entry(repo, output_dir, &entry) {
                Ok(true) => report.files_written += 1,
                Ok(false) => {}
                Err(reason) => {
                    warn!(path = %entry.path, %reason, "skipping upstream entry");
                    report.skipped.push(SkippedEntry {
                        path: entry.path,
                        reason,
                    });
                }
            },
            Err(e) => {
                warn!(path = %e.path, error = %e.source, "skipping unreadable subtree");
                report.skipped.push(SkippedEntry {
                    path: e.path,
                    reason: e.source.to_string(),
                });
            }
        }
    }

    info!(
        commit = %report.commit,
        files = report.files_written,
        skipped = report.skipped.len(),
        "materialized upstream tree"
    );
    Ok(report)
}

/// Write one walked entry. `Ok(false)` means the entry kind is not
/// materialized (submodules).
fn write_entry(repo: &dyn GitRepo, root: &Path, entry: &WalkEntry) -> Result<bool, String> {
    if !entry.mode.is_blob() {
        debug!(path = %entry.path, mode = ?entry.mode, "leaving out non-blob entry");
        return Ok(false);
    }

    let dest = fsutil::join_relative(root, &entry.path)
        .ok_or_else(|| format!("unsafe path '{}'", entry.path))?;
    let data = repo.read_blob(entry.oid).map_err(|e| e.to_string())?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("create {}: {e}", parent.display()))?;
    }
    fs::write(&dest, data).map_err(|e| format!("write {}: {e}", dest.display()))?;
    if entry.mode == EntryMode::BlobExecutable {
        set_executable(&dest)?;
    }
    Ok(true)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt as _;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|e| format!("chmod {}: {e}", path.display()))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), String> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use porter_git::{CommitInfo, GitOid, TreeEntry};

    use super::*;

    #[derive(Default)]
    struct FakeRepo {
        refs: HashMap<String, GitOid>,
        commits: HashMap<GitOid, CommitInfo>,
        trees: HashMap<GitOid, Vec<TreeEntry>>,
        blobs: HashMap<GitOid, Vec<u8>>,
    }

    fn oid(n: u8) -> GitOid {
        GitOid::from_bytes([n; 20])
    }

    impl GitRepo for FakeRepo {
        fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError> {
            self.refs.get(spec).copied().ok_or_else(|| GitError::NotFound {
                message: spec.to_owned(),
            })
        }

        fn read_blob(&self, oid: GitOid) -> Result<Vec<u8>, GitError> {
            self.blobs.get(&oid).cloned().ok_or_else(|| GitError::NotFound {
                message: format!("blob {oid}"),
            })
        }

        fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
            self.trees.get(&oid).cloned().ok_or_else(|| GitError::NotFound {
                message: format!("tree {oid}"),
            })
        }

        fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError> {
            self.commits.get(&oid).cloned().ok_or_else(|| GitError::WrongKind {
                oid: oid.to_string(),
                expected: "commit",
            })
        }
    }

    fn entry(name: &str, mode: EntryMode, oid: GitOid) -> TreeEntry {
        TreeEntry {
            name: name.to_owned(),
            mode,
            oid,
        }
    }

    fn sample_repo() -> FakeRepo {
        let mut repo = FakeRepo::default();
        repo.refs.insert("main".to_owned(), oid(1));
        repo.commits.insert(
            oid(1),
            CommitInfo {
                oid: oid(1),
                tree_oid: oid(2),
                summary: "init".to_owned(),
            },
        );
        repo.trees.insert(
            oid(2),
            vec![
                entry("a.txt", EntryMode::Blob, oid(10)),
                entry("bin", EntryMode::Tree, oid(3)),
                entry("broken", EntryMode::Tree, oid(99)),
                entry("lost.txt", EntryMode::Blob, oid(98)),
                entry("sub", EntryMode::Commit, oid(50)),
            ],
        );
        repo.trees
            .insert(oid(3), vec![entry("run.sh", EntryMode::BlobExecutable, oid(11))]);
        repo.blobs.insert(oid(10), b"alpha\n".to_vec());
        repo.blobs.insert(oid(11), b"#!/bin/sh\n".to_vec());
        repo
    }

    #[test]
    fn writes_blobs_and_reports_skips() {
        let repo = sample_repo();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("upstream");

        let report = materialize(&repo, "main", &out).unwrap();
        assert_eq!(report.commit, CommitId::from(oid(1)));
        assert_eq!(report.summary, "init");
        assert_eq!(report.files_written, 2);
        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(skipped, vec!["broken", "lost.txt"]);

        assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"alpha\n");
        assert_eq!(fs::read(out.join("bin/run.sh")).unwrap(), b"#!/bin/sh\n");
        assert!(!out.join("sub").exists());
    }

    #[cfg(unix)]
    #[test]
    fn executable_bit_is_kept() {
        use std::os::unix::fs::PermissionsExt as _;
        let repo = sample_repo();
        let dir = tempfile::tempdir().unwrap();
        materialize(&repo, "main", dir.path()).unwrap();
        let mode = fs::metadata(dir.path().join("bin/run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn unknown_reference_is_fatal() {
        let repo = sample_repo();
        let dir = tempfile::tempdir().unwrap();
        let err = materialize(&repo, "nope", &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, MaterializeError::Resolve(GitError::NotFound { .. })));
        assert!(!dir.path().join("out").exists());
    }
}
