//! Patch application: rebuild a modified tree from the baseline plus a patch
//! set.
//!
//! The output directory is always a fresh copy of the baseline with every
//! applicable hunk applied. When the patch set is empty the copy itself is
//! the result ("bootstrap"): a new branch starts as pristine upstream.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::format::{self, FilePatch, PatchBody, PatchKind};
use super::hunks::{Tolerance, apply_hunks};
use super::{ExitStatus, PATCH_EXT, PatchError, REJECT_EXT, sidecar_path};
use crate::config::{PatchMode, PortingConfig};
use crate::fsutil::{self, FsError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub tolerance: Tolerance,
}

impl ApplyOptions {
    /// Tolerance for the configured mode: exact ignores the offset and fuzz
    /// limits.
    #[must_use]
    pub const fn from_config(porting: &PortingConfig) -> Self {
        let tolerance = match porting.mode {
            PatchMode::Exact => Tolerance::EXACT,
            PatchMode::Fuzzy => Tolerance {
                max_offset: porting.max_offset,
                max_fuzz: porting.max_fuzz,
            },
        };
        Self { tolerance }
    }
}

/// A patched path with hunks that did not apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedFile {
    pub path: String,
    pub hunks: usize,
    /// Where the rejected hunks were written.
    pub reject_path: PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// The patch set was empty; the output is a plain copy of the baseline.
    pub bootstrapped: bool,
    /// Files fully patched.
    pub applied: Vec<String>,
    pub rejects: Vec<RejectedFile>,
    /// Hunks placed away from their recorded position or with reduced
    /// context.
    pub adjusted: usize,
}

impl ApplyReport {
    #[must_use]
    pub fn status(&self) -> ExitStatus {
        if self.rejects.is_empty() {
            ExitStatus::Clean
        } else {
            ExitStatus::Dirty
        }
    }

    #[must_use]
    pub fn rejected_hunks(&self) -> usize {
        self.rejects.iter().map(|r| r.hunks).sum()
    }
}

enum FileOutcome {
    Applied { adjusted: usize },
    /// Some or all hunks were rejected; the patch holds just those.
    Rejected(FilePatch),
}

/// Replace `output` with `baseline` plus the patches under `patch_dir`.
/// Rejected hunks are written below `reject_dir`, which is wiped first.
///
/// # Errors
/// Returns [`PatchError::Fs`] if a directory cannot be copied, read or
/// written, and [`PatchError::Malformed`] for an unparseable patch file.
pub fn apply_patches(
    baseline: &Path,
    patch_dir: &Path,
    output: &Path,
    reject_dir: &Path,
    options: ApplyOptions,
) -> Result<ApplyReport, PatchError> {
    fsutil::remove_dir_if_exists(reject_dir)?;
    fsutil::replace_dir(baseline, output)?;

    let mut report = ApplyReport::default();
    if !fsutil::has_files(patch_dir) {
        debug!(patch_dir = %patch_dir.display(), "no patches, bootstrapping from baseline");
        report.bootstrapped = true;
        return Ok(report);
    }

    for patch_file in patch_files(patch_dir)? {
        let patch = load(&patch_file)?;
        match apply_file(output, &patch, options.tolerance)? {
            FileOutcome::Applied { adjusted } => {
                report.adjusted += adjusted;
                report.applied.push(patch.path);
            }
            FileOutcome::Rejected(rejected) => {
                let reject_path = write_reject(reject_dir, &rejected)?;
                warn!(path = %rejected.path, hunks = rejected.hunk_count(), "hunks rejected");
                report.rejects.push(RejectedFile {
                    path: rejected.path.clone(),
                    hunks: rejected.hunk_count(),
                    reject_path,
                });
            }
        }
    }
    Ok(report)
}

fn patch_files(patch_dir: &Path) -> Result<Vec<PathBuf>, FsError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(patch_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| FsError::new("walk", patch_dir, e.into()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        if entry.path().extension().is_some_and(|e| e == PATCH_EXT) {
            files.push(entry.into_path());
        } else {
            debug!(path = %entry.path().display(), "ignoring non-patch file");
        }
    }
    Ok(files)
}

fn load(path: &Path) -> Result<FilePatch, PatchError> {
    let bytes = fs::read(path).map_err(|e| FsError::new("read", path, e))?;
    let text = String::from_utf8(bytes).map_err(|_| PatchError::Malformed {
        path: path.to_path_buf(),
        source: format::ParseError {
            line: 0,
            message: "patch file is not UTF-8".to_owned(),
        },
    })?;
    format::parse(&text).map_err(|source| PatchError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

fn read_existing(path: &Path) -> Result<Option<Vec<u8>>, FsError> {
    if path.is_file() {
        fs::read(path).map(Some).map_err(|e| FsError::new("read", path, e))
    } else {
        Ok(None)
    }
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), FsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| FsError::new("create", parent, e))?;
    }
    fs::write(path, data).map_err(|e| FsError::new("write", path, e))
}

fn apply_file(root: &Path, patch: &FilePatch, tolerance: Tolerance) -> Result<FileOutcome, PatchError> {
    let Some(target) = fsutil::join_relative(root, &patch.path) else {
        return Ok(FileOutcome::Rejected(patch.clone()));
    };
    let current = read_existing(&target)?;
    let whole = || Ok(FileOutcome::Rejected(patch.clone()));

    let hunks = match &patch.body {
        PatchBody::Binary(data) => {
            return match (patch.kind, current) {
                (PatchKind::Delete, None) => whole(),
                (PatchKind::Delete, Some(_)) => {
                    fs::remove_file(&target).map_err(|e| FsError::new("remove", &target, e))?;
                    Ok(FileOutcome::Applied { adjusted: 0 })
                }
                (PatchKind::Add, Some(existing)) if existing != *data => whole(),
                _ => {
                    write_file(&target, data)?;
                    Ok(FileOutcome::Applied { adjusted: 0 })
                }
            };
        }
        PatchBody::Text(hunks) => hunks,
    };

    match (patch.kind, current) {
        (PatchKind::Add, Some(existing)) => {
            let expected = format::join_lines(
                &hunks
                    .iter()
                    .flat_map(|h| h.new_side().cloned())
                    .collect::<Vec<_>>(),
            );
            if existing == expected.as_bytes() {
                Ok(FileOutcome::Applied { adjusted: 0 })
            } else {
                whole()
            }
        }
        (PatchKind::Add, None) => {
            let applied = apply_hunks(&[], hunks, Tolerance::EXACT);
            if !applied.rejected.is_empty() {
                return whole();
            }
            write_file(&target, format::join_lines(&applied.lines).as_bytes())?;
            Ok(FileOutcome::Applied { adjusted: 0 })
        }
        (PatchKind::Delete | PatchKind::Modify, None) => whole(),
        (kind, Some(existing)) => {
            let Ok(text) = String::from_utf8(existing) else {
                return whole();
            };
            let applied = apply_hunks(&format::split_lines(&text), hunks, tolerance);
            if kind == PatchKind::Delete {
                if !applied.rejected.is_empty() || !applied.lines.is_empty() {
                    return whole();
                }
                fs::remove_file(&target).map_err(|e| FsError::new("remove", &target, e))?;
                return Ok(FileOutcome::Applied {
                    adjusted: applied.adjusted,
                });
            }
            write_file(&target, format::join_lines(&applied.lines).as_bytes())?;
            if applied.rejected.is_empty() {
                Ok(FileOutcome::Applied {
                    adjusted: applied.adjusted,
                })
            } else {
                Ok(FileOutcome::Rejected(patch.with_hunks(applied.rejected)))
            }
        }
    }
}

fn write_reject(reject_dir: &Path, patch: &FilePatch) -> Result<PathBuf, FsError> {
    let path = sidecar_path(reject_dir, &patch.path, REJECT_EXT).ok_or_else(|| {
        FsError::new(
            "write",
            reject_dir.join(&patch.path),
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unsafe relative path"),
        )
    })?;
    write_file(&path, format::render(patch).as_bytes())?;
    Ok(path)
}
