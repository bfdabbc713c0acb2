//! On-disk layout of a porting project and the state derived from it.
//!
//! ```text
//! <root>/
//!   porter.toml         configuration
//!   commit.sha          pinned upstream commit
//!   upstream/           pristine baseline tree
//!   workspace/<b>/      per-branch working copies
//!   patches/<b>/        per-branch patch sets (under version control)
//!   rejects/<b>/        hunks that did not apply
//!   <b>/                split-out trees, edited by hand
//!   tmp/                scratch space, removed by `clean`
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::CONFIG_FILE;

pub const UPSTREAM_DIR: &str = "upstream";
pub const WORKSPACE_DIR: &str = "workspace";
pub const PATCHES_DIR: &str = "patches";
pub const REJECTS_DIR: &str = "rejects";
pub const TMP_DIR: &str = "tmp";
pub const MARKER_FILE: &str = "commit.sha";

/// Paths of a project rooted at one directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    #[must_use]
    pub fn marker_path(&self) -> PathBuf {
        self.root.join(MARKER_FILE)
    }

    #[must_use]
    pub fn upstream_dir(&self) -> PathBuf {
        self.root.join(UPSTREAM_DIR)
    }

    #[must_use]
    pub fn workspace_dir(&self) -> PathBuf {
        self.root.join(WORKSPACE_DIR)
    }

    #[must_use]
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join(TMP_DIR)
    }

    /// Paths belonging to one branch.
    #[must_use]
    pub fn branch(&self, name: &str) -> BranchPaths {
        BranchPaths {
            name: name.to_owned(),
            working_dir: self.workspace_dir().join(name),
            patch_dir: self.root.join(PATCHES_DIR).join(name),
            reject_dir: self.root.join(REJECTS_DIR).join(name),
            split_dir: self.root.join(name),
        }
    }
}

/// The four directories a branch touches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchPaths {
    pub name: String,
    /// `workspace/<b>`: upstream with the patches applied.
    pub working_dir: PathBuf,
    /// `patches/<b>`
    pub patch_dir: PathBuf,
    /// `rejects/<b>`
    pub reject_dir: PathBuf,
    /// `<b>` at the project root.
    pub split_dir: PathBuf,
}

// ---------------------------------------------------------------------------
// WorkspaceState
// ---------------------------------------------------------------------------

/// How far a project has progressed, derived from what exists on disk.
///
/// Ordered: each state implies the ones before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceState {
    /// No baseline tree.
    Empty,
    /// `upstream/` exists but at least one configured branch has no working
    /// copy.
    BaselinePresent,
    /// `upstream/` and every configured `workspace/<b>` exist.
    BranchesMaterialized,
}

impl WorkspaceState {
    /// Inspect the layout once. `BranchesMaterialized` needs a non-empty
    /// branch list.
    #[must_use]
    pub fn detect(layout: &WorkspaceLayout, branches: &[String]) -> Self {
        if !layout.upstream_dir().is_dir() {
            return Self::Empty;
        }
        let all_present = !branches.is_empty()
            && branches
                .iter()
                .all(|b| layout.branch(b).working_dir.is_dir());
        if all_present {
            Self::BranchesMaterialized
        } else {
            Self::BaselinePresent
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::BaselinePresent => "baseline present",
            Self::BranchesMaterialized => "branches materialized",
        }
    }
}

impl fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_paths() {
        let layout = WorkspaceLayout::new("/p");
        let b = layout.branch("fabric");
        assert_eq!(b.working_dir, PathBuf::from("/p/workspace/fabric"));
        assert_eq!(b.patch_dir, PathBuf::from("/p/patches/fabric"));
        assert_eq!(b.reject_dir, PathBuf::from("/p/rejects/fabric"));
        assert_eq!(b.split_dir, PathBuf::from("/p/fabric"));
        assert_eq!(layout.marker_path(), PathBuf::from("/p/commit.sha"));
    }

    #[test]
    fn state_detection() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path());
        let branches = vec!["a".to_owned(), "b".to_owned()];
        assert_eq!(WorkspaceState::detect(&layout, &branches), WorkspaceState::Empty);

        std::fs::create_dir_all(layout.upstream_dir()).unwrap();
        std::fs::create_dir_all(layout.branch("a").working_dir).unwrap();
        assert_eq!(
            WorkspaceState::detect(&layout, &branches),
            WorkspaceState::BaselinePresent
        );

        std::fs::create_dir_all(layout.branch("b").working_dir).unwrap();
        assert_eq!(
            WorkspaceState::detect(&layout, &branches),
            WorkspaceState::BranchesMaterialized
        );
        assert_eq!(
            WorkspaceState::detect(&layout, &[]),
            WorkspaceState::BaselinePresent
        );
    }

    #[test]
    fn states_are_ordered() {
        assert!(WorkspaceState::Empty < WorkspaceState::BaselinePresent);
        assert!(WorkspaceState::BaselinePresent < WorkspaceState::BranchesMaterialized);
    }
}
