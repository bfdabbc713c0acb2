//! Object reads (blobs, trees, commits) on top of gix.

use gix::objs::tree::EntryKind;

use crate::error::GitError;
use crate::gix_repo::{GixRepo, from_gix_oid, to_gix_oid};
use crate::types::{CommitInfo, EntryMode, GitOid, TreeEntry};

fn missing(kind: &str, oid: GitOid, err: impl std::fmt::Display) -> GitError {
    GitError::NotFound {
        message: format!("{kind} {oid}: {err}"),
    }
}

const fn entry_mode(kind: EntryKind) -> EntryMode {
    match kind {
        EntryKind::Tree => EntryMode::Tree,
        EntryKind::Blob => EntryMode::Blob,
        EntryKind::BlobExecutable => EntryMode::BlobExecutable,
        EntryKind::Link => EntryMode::Link,
        EntryKind::Commit => EntryMode::Commit,
    }
}

pub fn read_blob(repo: &GixRepo, oid: GitOid) -> Result<Vec<u8>, GitError> {
    repo.repo
        .find_blob(to_gix_oid(oid))
        .map(|mut blob| blob.take_data())
        .map_err(|e| missing("blob", oid, e))
}

pub fn read_tree(repo: &GixRepo, oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
    let tree = repo
        .repo
        .find_tree(to_gix_oid(oid))
        .map_err(|e| missing("tree", oid, e))?;

    tree.iter()
        .map(|item| -> Result<TreeEntry, GitError> {
            let item = item.map_err(|e| GitError::BackendError {
                message: format!("undecodable entry in tree {oid}: {e}"),
            })?;
            Ok(TreeEntry {
                name: item.inner.filename.to_string(),
                mode: entry_mode(item.inner.mode.kind()),
                oid: from_gix_oid(item.inner.oid)?,
            })
        })
        .collect()
}

/// Read a commit. Tags are peeled; anything else that is not a commit is
/// [`GitError::WrongKind`].
pub fn read_commit(repo: &GixRepo, oid: GitOid) -> Result<CommitInfo, GitError> {
    let commit = repo
        .repo
        .find_object(to_gix_oid(oid))
        .map_err(|e| missing("object", oid, e))?
        .peel_to_commit()
        .map_err(|_| GitError::WrongKind {
            oid: oid.to_string(),
            expected: "commit",
        })?;

    let parsed = commit.decode().map_err(|e| GitError::BackendError {
        message: format!("undecodable commit {oid}: {e}"),
    })?;
    let message = parsed.message.to_string();
    let summary = message.lines().next().unwrap_or_default().trim().to_owned();

    Ok(CommitInfo {
        oid: from_gix_oid(&commit.id)?,
        tree_oid: from_gix_oid(&parsed.tree())?,
        summary,
    })
}
