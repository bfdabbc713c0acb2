//! Patch generation: compare a baseline tree with a modified tree and write
//! one patch per differing file.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::format::{self, FilePatch, PatchBody, PatchKind};
use super::hunks::diff_lines;
use super::{ExitStatus, PATCH_EXT, PatchError, sidecar_path};
use crate::config::DiffConfig;
use crate::fsutil::{self, FsError, IgnoreSet};

#[derive(Clone, Debug)]
pub struct GenerateOptions {
    /// Unchanged lines kept around each change.
    pub context_lines: usize,
    /// Paths left out of the comparison on both sides.
    pub ignore: IgnoreSet,
}

impl GenerateOptions {
    #[must_use]
    pub fn from_config(diff: &DiffConfig) -> Self {
        Self {
            context_lines: diff.context_lines,
            ignore: IgnoreSet::new(&diff.ignored_prefixes).with_names(&diff.cleanup_names),
        }
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self::from_config(&DiffConfig::default())
    }
}

/// What a generator run wrote.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerateReport {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl GenerateReport {
    #[must_use]
    pub fn status(&self) -> ExitStatus {
        if self.patch_count() == 0 {
            ExitStatus::Clean
        } else {
            ExitStatus::Dirty
        }
    }

    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }
}

/// The patch turning `old` into `new` (`None` meaning absent), or `None` if
/// they are identical. Content that is not UTF-8 on either side becomes a
/// binary literal.
#[must_use]
pub fn diff_file(path: &str, old: Option<&[u8]>, new: Option<&[u8]>, context: usize) -> Option<FilePatch> {
    let kind = match (old, new) {
        (None, None) => return None,
        (Some(o), Some(n)) if o == n => return None,
        (None, Some(_)) => PatchKind::Add,
        (Some(_), None) => PatchKind::Delete,
        (Some(_), Some(_)) => PatchKind::Modify,
    };

    let old_text = old.map(std::str::from_utf8).transpose();
    let new_text = new.map(std::str::from_utf8).transpose();
    let body = match (old_text, new_text) {
        (Ok(o), Ok(n)) => PatchBody::Text(diff_lines(
            &format::split_lines(o.unwrap_or_default()),
            &format::split_lines(n.unwrap_or_default()),
            context,
        )),
        _ => PatchBody::Binary(new.unwrap_or_default().to_vec()),
    };

    Some(FilePatch {
        path: path.to_owned(),
        kind,
        body,
    })
}

/// Compare `baseline` with `modified` and replace `output` with the
/// resulting patch set.
///
/// Every difference is computed before `output` is touched, so a read
/// failure leaves the previous patch set in place.
///
/// # Errors
/// Returns [`PatchError::Fs`] if a tree cannot be read or the output cannot
/// be written.
pub fn generate_patches(
    baseline: &Path,
    modified: &Path,
    output: &Path,
    options: &GenerateOptions,
) -> Result<GenerateReport, PatchError> {
    let old_files = fsutil::collect_files(baseline, &options.ignore)?;
    let new_files = fsutil::collect_files(modified, &options.ignore)?;

    let mut paths: Vec<&String> = old_files.keys().chain(new_files.keys()).collect();
    paths.sort();
    paths.dedup();

    let mut patches = Vec::new();
    for rel in paths {
        let old = old_files.get(rel).map(|p| read(p)).transpose()?;
        let new = new_files.get(rel).map(|p| read(p)).transpose()?;
        if let Some(patch) = diff_file(rel, old.as_deref(), new.as_deref(), options.context_lines) {
            patches.push(patch);
        }
    }

    fsutil::remove_dir_if_exists(output)?;
    fs::create_dir_all(output).map_err(|e| FsError::new("create", output, e))?;

    let mut report = GenerateReport::default();
    for patch in &patches {
        let dest = sidecar_path(output, &patch.path, PATCH_EXT).ok_or_else(|| {
            FsError::new(
                "write",
                output.join(&patch.path),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "unsafe relative path"),
            )
        })?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| FsError::new("create", parent, e))?;
        }
        fs::write(&dest, format::render(patch)).map_err(|e| FsError::new("write", &dest, e))?;
        debug!(path = %patch.path, kind = ?patch.kind, hunks = patch.hunk_count(), "wrote patch");

        let bucket = match patch.kind {
            PatchKind::Add => &mut report.added,
            PatchKind::Modify => &mut report.modified,
            PatchKind::Delete => &mut report.deleted,
        };
        bucket.push(patch.path.clone());
    }
    Ok(report)
}

fn read(path: &Path) -> Result<Vec<u8>, FsError> {
    fs::read(path).map_err(|e| FsError::new("read", path, e))
}
