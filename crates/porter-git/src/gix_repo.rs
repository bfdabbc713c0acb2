//! The gix-backed implementation of [`GitRepo`].

use std::path::{Path, PathBuf};

use crate::error::GitError;
use crate::repo::GitRepo;
use crate::types::{CommitInfo, GitOid, TreeEntry};

/// A [`GitRepo`] implementation backed by [gix](https://github.com/GitoxideLabs/gitoxide).
///
/// The handle owns open file descriptors into the object database; drop it as
/// soon as the operation that needed it is done.
pub struct GixRepo {
    pub(crate) repo: gix::Repository,
    git_dir: PathBuf,
}

impl GixRepo {
    /// Open the git repository containing `path`, searching parent
    /// directories like `git` itself does.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = gix::discover(path).map_err(|e| GitError::OpenFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self::from_repo(repo))
    }

    /// Open a git repository at exactly `path` (no parent discovery, no
    /// global configuration).
    pub fn open_at(path: &Path) -> Result<Self, GitError> {
        let repo = gix::open_opts(path, gix::open::Options::isolated()).map_err(|e| {
            GitError::OpenFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;
        Ok(Self::from_repo(repo))
    }

    fn from_repo(repo: gix::Repository) -> Self {
        let git_dir = repo.git_dir().to_path_buf();
        tracing::debug!(git_dir = %git_dir.display(), "opened repository");
        Self { repo, git_dir }
    }

    /// The `.git` directory (or bare repository root) backing this handle.
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }
}

impl Drop for GixRepo {
    fn drop(&mut self) {
        tracing::debug!(git_dir = %self.git_dir.display(), "released repository");
    }
}

impl GitRepo for GixRepo {
    fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError> {
        crate::refs_impl::rev_parse(self, spec)
    }

    fn read_blob(&self, oid: GitOid) -> Result<Vec<u8>, GitError> {
        crate::objects_impl::read_blob(self, oid)
    }

    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
        crate::objects_impl::read_tree(self, oid)
    }

    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError> {
        crate::objects_impl::read_commit(self, oid)
    }
}

/// Convert our `GitOid` to a `gix::ObjectId`.
pub(crate) fn to_gix_oid(oid: GitOid) -> gix::ObjectId {
    gix::ObjectId::Sha1(*oid.as_bytes())
}

/// Convert a `gix::oid` to our `GitOid`. Only SHA-1 ids are supported.
pub(crate) fn from_gix_oid(oid: &gix::oid) -> Result<GitOid, GitError> {
    let bytes: [u8; 20] = oid
        .as_bytes()
        .try_into()
        .map_err(|_| GitError::InvalidOid {
            value: oid.to_string(),
            reason: "only SHA-1 object ids are supported".to_owned(),
        })?;
    Ok(GitOid::from_bytes(bytes))
}
