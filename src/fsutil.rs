//! Directory helpers shared by the materializer, the patch engine and the
//! orchestrator.
//!
//! Every failure carries the operation and the path it happened on, so the
//! top-level error message says exactly what could not be copied or removed.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// A filesystem operation that failed on a specific path.
#[derive(Debug, Error)]
#[error("{op} {}: {source}", path.display())]
pub struct FsError {
    /// What was being done (`"copy"`, `"remove"`, `"read"`, ...).
    pub op: &'static str,
    /// The path involved.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: io::Error,
}

impl FsError {
    pub(crate) fn new(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            op,
            path: path.into(),
            source,
        }
    }

    fn from_walk(root: &Path, err: walkdir::Error) -> Self {
        let path = err.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
        Self::new("walk", path, err.into())
    }
}

/// Remove a directory tree. Returns `false` when there was nothing to remove.
///
/// # Errors
/// Returns [`FsError`] if the directory exists but cannot be removed.
pub fn remove_dir_if_exists(path: &Path) -> Result<bool, FsError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(FsError::new("remove", path, e)),
    }
}

/// Recursively copy `from` into `to`, creating `to` if needed. Existing files
/// in `to` are overwritten. Returns the number of files copied.
///
/// # Errors
/// Returns [`FsError`] on the first entry that cannot be read or written.
pub fn copy_dir(from: &Path, to: &Path) -> Result<usize, FsError> {
    fs::create_dir_all(to).map_err(|e| FsError::new("create", to, e))?;
    let mut copied = 0;
    for entry in WalkDir::new(from).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| FsError::from_walk(from, e))?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| FsError::new("copy", entry.path(), io::Error::other(e)))?;
        let dest = to.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&dest).map_err(|e| FsError::new("create", &dest, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &dest)?;
            copied += 1;
        } else {
            fs::copy(entry.path(), &dest).map_err(|e| FsError::new("copy", entry.path(), e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> Result<(), FsError> {
    let target = fs::read_link(src).map_err(|e| FsError::new("read link", src, e))?;
    if dest.symlink_metadata().is_ok() {
        fs::remove_file(dest).map_err(|e| FsError::new("remove", dest, e))?;
    }
    std::os::unix::fs::symlink(&target, dest).map_err(|e| FsError::new("link", dest, e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dest: &Path) -> Result<(), FsError> {
    fs::copy(src, dest)
        .map(|_| ())
        .map_err(|e| FsError::new("copy", src, e))
}

/// Replace `to` with a fresh copy of `from`.
///
/// # Errors
/// Returns [`FsError`] if `to` cannot be removed or the copy fails.
pub fn replace_dir(from: &Path, to: &Path) -> Result<usize, FsError> {
    remove_dir_if_exists(to)?;
    copy_dir(from, to)
}

/// `true` if `dir` exists and contains at least one non-directory entry at
/// any depth.
#[must_use]
pub fn has_files(dir: &Path) -> bool {
    dir.is_dir()
        && WalkDir::new(dir)
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .any(|e| !e.file_type().is_dir())
}

/// Count the files below `dir` (zero when it does not exist).
#[must_use]
pub fn count_files(dir: &Path) -> usize {
    if !dir.is_dir() {
        return 0;
    }
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| !e.file_type().is_dir())
        .count()
}

/// Slash-separated form of a relative path.
#[must_use]
pub fn slash_path(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Turn a slash-separated relative path into a path below `root`.
///
/// Returns `None` for anything that could escape `root`: absolute paths,
/// empty paths, and `.`/`..` segments.
#[must_use]
pub fn join_relative(root: &Path, rel: &str) -> Option<PathBuf> {
    if rel.is_empty() || rel.starts_with('/') {
        return None;
    }
    let mut out = root.to_path_buf();
    for segment in rel.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return None;
        }
        out.push(segment);
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Ignore rules
// ---------------------------------------------------------------------------

/// Paths left out of a tree comparison.
///
/// Prefixes are anchored at the root and matched by whole segments: `.idea`
/// matches `.idea` and `.idea/workspace.xml` but not `.idea2`; `build/tmp`
/// matches `build/tmp/x` but not `build/tmpfile`. Names match a single
/// segment at any depth.
#[derive(Clone, Debug, Default)]
pub struct IgnoreSet {
    prefixes: Vec<String>,
    names: Vec<String>,
}

impl IgnoreSet {
    /// Build from configured prefixes. Leading/trailing slashes are ignored;
    /// blank entries are dropped.
    #[must_use]
    pub fn new<S: AsRef<str>>(prefixes: &[S]) -> Self {
        Self {
            prefixes: prefixes
                .iter()
                .map(|p| p.as_ref().trim().trim_matches('/').to_owned())
                .filter(|p| !p.is_empty())
                .collect(),
            names: Vec::new(),
        }
    }

    /// Also exclude any entry called one of `names`, wherever it sits.
    #[must_use]
    pub fn with_names<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.names.extend(
            names
                .iter()
                .map(|n| n.as_ref().trim())
                .filter(|n| !n.is_empty() && !n.contains('/'))
                .map(str::to_owned),
        );
        self
    }

    /// Whether a slash-separated relative path is excluded.
    #[must_use]
    pub fn is_ignored(&self, rel: &str) -> bool {
        let by_prefix = self.prefixes.iter().any(|p| {
            rel == p
                || rel
                    .strip_prefix(p.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        });
        by_prefix || rel.split('/').any(|seg| self.names.iter().any(|n| n == seg))
    }
}

/// Collect every file below `root` that is not ignored, keyed by its
/// slash-separated relative path. Ignored directories are pruned, not walked.
/// A missing `root` yields an empty map.
///
/// # Errors
/// Returns [`FsError`] if part of the tree cannot be read.
pub fn collect_files(root: &Path, ignore: &IgnoreSet) -> Result<BTreeMap<String, PathBuf>, FsError> {
    let mut files = BTreeMap::new();
    if !root.exists() {
        return Ok(files);
    }
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.path()
                .strip_prefix(root)
                .map_or(true, |rel| !ignore.is_ignored(&slash_path(rel)))
        });
    for entry in walker {
        let entry = entry.map_err(|e| FsError::from_walk(root, e))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| FsError::new("walk", entry.path(), io::Error::other(e)))?;
        files.insert(slash_path(rel), entry.into_path());
    }
    Ok(files)
}
