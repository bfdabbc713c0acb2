//! The [`GitRepo`] trait: the boundary between porter and git.
//!
//! Porter only ever reads from git: it resolves the configured upstream
//! reference and extracts that commit's tree into the baseline directory.
//! The trait therefore covers rev-parse and object reads, nothing else.

use crate::error::GitError;
use crate::types::{CommitInfo, GitOid, TreeEntry};

/// Read-only git access used by the materializer.
///
/// Implementations may be backed by gix ([`GixRepo`](crate::GixRepo)) or a
/// test double.
///
/// # Object safety
///
/// The trait is object-safe; callers hold `&dyn GitRepo` and walk trees
/// with [`TreeWalk`](crate::TreeWalk).
pub trait GitRepo {
    /// Resolve a revision specification (branch, tag, full or abbreviated
    /// commit id, `HEAD~2`, ...) to an object id.
    ///
    /// Returns [`GitError::NotFound`] if the spec cannot be resolved.
    fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError>;

    /// Read the contents of a blob object.
    fn read_blob(&self, oid: GitOid) -> Result<Vec<u8>, GitError>;

    /// Read the entries of a tree object, one level deep, in git tree order.
    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError>;

    /// Read a commit object, peeling annotated tags first.
    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError>;

    /// Resolve `spec` and read the commit it names.
    fn resolve_commit(&self, spec: &str) -> Result<CommitInfo, GitError> {
        let oid = self.rev_parse(spec)?;
        self.read_commit(oid)
    }
}
