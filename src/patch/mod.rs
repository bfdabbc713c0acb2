//! Patch generation and application.
//!
//! A patch set is a directory mirroring the tree it describes: the change
//! to `src/Main.java` lives in `<patch dir>/src/Main.java.patch`. Hunks
//! that cannot be applied go to `<reject dir>/src/Main.java.rej` in the
//! same format.
//!
//! Both tools report a [`ExitStatus`] on success and a [`PatchError`] on a
//! hard failure. The status values mirror the conventional `diff`/`patch`
//! exit codes.

pub mod apply;
pub mod format;
pub mod generate;
pub mod hunks;

use std::path::PathBuf;

use thiserror::Error;

use crate::fsutil::FsError;

pub use apply::{ApplyOptions, ApplyReport, RejectedFile, apply_patches};
pub use format::{FilePatch, PatchKind};
pub use generate::{GenerateOptions, GenerateReport, diff_file, generate_patches};
pub use hunks::Tolerance;

/// Extension of patch files.
pub const PATCH_EXT: &str = "patch";
/// Extension of reject files.
pub const REJECT_EXT: &str = "rej";

/// Non-fatal tool result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    /// Generator: trees are identical. Applier: every hunk applied.
    Clean,
    /// Generator: differences were captured. Applier: some hunks were
    /// rejected.
    Dirty,
}

impl ExitStatus {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::Dirty => 1,
        }
    }
}

/// Hard failure of the generator or applier.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error(transparent)]
    Fs(#[from] FsError),
    /// A patch file could not be parsed.
    #[error("malformed patch {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: format::ParseError,
    },
}

impl PatchError {
    /// Status code reported for hard failures.
    pub const CODE: i32 = 2;
}

/// `<dir>/<rel>.<ext>`
pub(crate) fn sidecar_path(dir: &std::path::Path, rel: &str, ext: &str) -> Option<PathBuf> {
    let mut path = crate::fsutil::join_relative(dir, rel)?;
    let mut name = path.file_name()?.to_os_string();
    name.push(".");
    name.push(ext);
    path.set_file_name(name);
    Some(path)
}
