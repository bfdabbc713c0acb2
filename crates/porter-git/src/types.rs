//! Value types shared between the [`GitRepo`](crate::GitRepo) trait and its
//! callers. None of these carry gix types; the backend stays private.

use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// GitOid
// ---------------------------------------------------------------------------

/// A git object identifier (SHA-1, 20 bytes).
///
/// Displays as 40 lowercase hex characters, which is also the form persisted
/// in a project's commit marker.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GitOid([u8; 20]);

impl GitOid {
    /// Create a `GitOid` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// First seven hex characters, for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        let mut s = self.to_string();
        s.truncate(7);
        s
    }
}

impl fmt::Display for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GitOid({self})")
    }
}

impl FromStr for GitOid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 20];
        match hex::decode_to_slice(s, &mut bytes) {
            Ok(()) => Ok(Self(bytes)),
            Err(hex::FromHexError::InvalidStringLength | hex::FromHexError::OddLength) => {
                Err(OidParseError {
                    value: s.to_owned(),
                    reason: format!("expected 40 hex characters, got {}", s.len()),
                })
            }
            Err(e) => Err(OidParseError {
                value: s.to_owned(),
                reason: e.to_string(),
            }),
        }
    }
}

/// A string that is not a 40-character hex object id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OidParseError {
    pub value: String,
    pub reason: String,
}

impl fmt::Display for OidParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not an object id: {}", self.value, self.reason)
    }
}

impl std::error::Error for OidParseError {}

// ---------------------------------------------------------------------------
// Tree types
// ---------------------------------------------------------------------------

/// The file mode of a tree entry (the `git ls-tree` mode column).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// Regular file (`100644`).
    Blob,
    /// Executable file (`100755`).
    BlobExecutable,
    /// Subdirectory (`040000`).
    Tree,
    /// Symbolic link (`120000`). The blob holds the link target.
    Link,
    /// Gitlink / submodule (`160000`). Points at a commit in another repo.
    Commit,
}

impl EntryMode {
    /// `true` for entries whose object is a blob in this repository.
    #[must_use]
    pub const fn is_blob(self) -> bool {
        matches!(self, Self::Blob | Self::BlobExecutable | Self::Link)
    }
}

/// A single entry in a git tree object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    /// Basename of the entry.
    pub name: String,
    /// The entry mode.
    pub mode: EntryMode,
    /// The object this entry points to.
    pub oid: GitOid,
}

// ---------------------------------------------------------------------------
// Commit types
// ---------------------------------------------------------------------------

/// The parts of a commit object porter cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    /// The commit's own id.
    pub oid: GitOid,
    /// Root tree of the commit.
    pub tree_oid: GitOid,
    /// First line of the commit message.
    pub summary: String,
}
