//! Lazy depth-first traversal of a git tree.
//!
//! [`TreeWalk`] yields every entry below a root tree as a flat sequence of
//! [`WalkEntry`] values with slash-separated paths. Subtrees are loaded only
//! when the walk reaches them, and the order is git tree order at every level,
//! so two walks of the same tree always yield the same sequence.
//!
//! A subtree that cannot be read is reported as one `Err` item and skipped;
//! the walk carries on with its siblings. Consumers decide whether a partial
//! walk is acceptable.

use std::vec;

use crate::error::GitError;
use crate::repo::GitRepo;
use crate::types::{EntryMode, GitOid, TreeEntry};

/// One non-tree entry reached by a [`TreeWalk`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkEntry {
    /// Slash-separated path relative to the root tree.
    pub path: String,
    /// Entry mode (never [`EntryMode::Tree`]).
    pub mode: EntryMode,
    /// Object id of the blob or gitlink.
    pub oid: GitOid,
}

/// A subtree that could not be loaded during a walk.
#[derive(Debug, thiserror::Error)]
#[error("cannot read {}: {source}", tree_label(.path))]
pub struct WalkError {
    /// Path of the subtree (empty for the root).
    pub path: String,
    /// Underlying failure.
    pub source: GitError,
}

fn tree_label(path: &str) -> String {
    if path.is_empty() {
        "root tree".to_owned()
    } else {
        format!("tree '{path}'")
    }
}

struct Frame {
    prefix: String,
    entries: vec::IntoIter<TreeEntry>,
}

/// Depth-first iterator over the blobs and gitlinks below a root tree.
pub struct TreeWalk<'r> {
    repo: &'r dyn GitRepo,
    root: GitOid,
    stack: Vec<Frame>,
    pending: Option<(String, GitOid)>,
}

impl<'r> TreeWalk<'r> {
    /// Start a walk at `root`. Nothing is read until the first `next()`.
    #[must_use]
    pub fn new(repo: &'r dyn GitRepo, root: GitOid) -> Self {
        Self {
            repo,
            root,
            stack: Vec::new(),
            pending: Some((String::new(), root)),
        }
    }

    /// Reset the walk to the beginning.
    pub fn restart(&mut self) {
        self.stack.clear();
        self.pending = Some((String::new(), self.root));
    }

    /// Tree id the walk started from.
    #[must_use]
    pub const fn root(&self) -> GitOid {
        self.root
    }
}

impl Iterator for TreeWalk<'_> {
    type Item = Result<WalkEntry, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((prefix, oid)) = self.pending.take() {
                match self.repo.read_tree(oid) {
                    Ok(entries) => self.stack.push(Frame {
                        prefix,
                        entries: entries.into_iter(),
                    }),
                    Err(source) => {
                        return Some(Err(WalkError {
                            path: prefix.trim_end_matches('/').to_owned(),
                            source,
                        }));
                    }
                }
            }

            let frame = self.stack.last_mut()?;
            let Some(entry) = frame.entries.next() else {
                self.stack.pop();
                continue;
            };
            let path = format!("{}{}", frame.prefix, entry.name);
            if entry.mode == EntryMode::Tree {
                self.pending = Some((format!("{path}/"), entry.oid));
                continue;
            }
            return Some(Ok(WalkEntry {
                path,
                mode: entry.mode,
                oid: entry.oid,
            }));
        }
    }
}
