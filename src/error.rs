//! Error and outcome types for workspace operations.
//!
//! Every orchestrator operation returns `Result<Outcome, WorkspaceError>`:
//! - `Ok(Outcome::Ok)`: everything went through.
//! - `Ok(Outcome::Warning(..))`: the operation finished but something needs a
//!   human look (rejected hunks, skipped tree entries, leftovers `clean`
//!   could not remove).
//! - `Err(WorkspaceError)`: the operation stopped. The message says what
//!   went wrong and how to fix it.

use std::fmt;
use std::path::PathBuf;

use porter_git::GitError;

use crate::fsutil::FsError;
use crate::layout::WorkspaceState;
use crate::patch::PatchError;

// ---------------------------------------------------------------------------
// WorkspaceError
// ---------------------------------------------------------------------------

/// Which patch tool failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchStage {
    Generate,
    Apply,
}

impl fmt::Display for PatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generate => "patch generation",
            Self::Apply => "patch application",
        })
    }
}

/// Fatal error from a workspace operation.
#[derive(Debug)]
pub enum WorkspaceError {
    /// `porter.toml` or a command-line override is missing or invalid.
    Configuration {
        /// Human-readable description of the problem.
        message: String,
    },

    /// The operation needs the project to be further along.
    Precondition {
        /// The operation that was refused (e.g. `"split"`).
        operation: &'static str,
        /// The least state the operation accepts.
        required: WorkspaceState,
        /// The state found on disk.
        actual: WorkspaceState,
    },

    /// The upstream repository could not be opened or read.
    Vcs(GitError),

    /// The patch generator or applier stopped with a hard failure.
    ToolFailure {
        stage: PatchStage,
        /// Branch being processed.
        branch: String,
        /// Status code the tool reports (always >= 2).
        code: i32,
        source: PatchError,
    },

    /// A directory or file could not be created, copied or removed.
    Filesystem(FsError),
}

/// Coarse classification, stable across message wording changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Precondition,
    Vcs,
    ToolFailure,
    Filesystem,
}

impl WorkspaceError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Precondition { .. } => ErrorKind::Precondition,
            Self::Vcs(_) => ErrorKind::Vcs,
            Self::ToolFailure { .. } => ErrorKind::ToolFailure,
            Self::Filesystem(_) => ErrorKind::Filesystem,
        }
    }

    /// Process exit code for the CLI. Always >= 2 so it never collides with
    /// "finished with warnings" (1).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::Precondition => 3,
            ErrorKind::Vcs => 4,
            ErrorKind::ToolFailure => 5,
            ErrorKind::Filesystem => 6,
        }
    }
}

impl fmt::Display for WorkspaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { message } => {
                write!(
                    f,
                    "configuration error: {message}\n  To fix: edit porter.toml or pass the value on the command line."
                )
            }
            Self::Precondition {
                operation,
                required,
                actual,
            } => {
                write!(
                    f,
                    "{operation} requires the workspace to be at least '{required}', but it is '{actual}'.\n  To fix: run `porter setup` first."
                )
            }
            Self::Vcs(err) => {
                write!(
                    f,
                    "upstream repository error: {err}\n  To fix: check [upstream] in porter.toml and that the reference exists (`git rev-parse <ref>`)."
                )
            }
            Self::ToolFailure {
                stage,
                branch,
                code,
                source,
            } => {
                write!(
                    f,
                    "{stage} failed for branch '{branch}' (status {code}): {source}"
                )
            }
            Self::Filesystem(err) => {
                write!(
                    f,
                    "filesystem error: {err}\n  To fix: check file permissions and disk space."
                )
            }
        }
    }
}

impl std::error::Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Vcs(err) => Some(err),
            Self::ToolFailure { source, .. } => Some(source),
            Self::Filesystem(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GitError> for WorkspaceError {
    fn from(err: GitError) -> Self {
        Self::Vcs(err)
    }
}

impl From<FsError> for WorkspaceError {
    fn from(err: FsError) -> Self {
        Self::Filesystem(err)
    }
}

impl From<crate::config::ConfigError> for WorkspaceError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome / Warning
// ---------------------------------------------------------------------------

/// Something a successful operation wants the user to look at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// Hunks for a branch did not apply and were written to its reject dir.
    Rejects {
        branch: String,
        /// Patched paths with at least one rejected hunk.
        files: Vec<String>,
        /// Total rejected hunks (whole-file rejects count as one).
        hunks: usize,
        reject_dir: PathBuf,
    },
    /// Tree entries the materializer could not read or write.
    SkippedEntries { paths: Vec<String> },
    /// `clean` could not remove a directory.
    CleanupFailed { path: PathBuf, message: String },
    /// A branch had no tree to read from.
    MissingSources { branch: String, path: PathBuf },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejects {
                branch,
                files,
                hunks,
                reject_dir,
            } => {
                write!(
                    f,
                    "branch '{branch}': {hunks} hunk(s) in {} file(s) did not apply; see {}",
                    files.len(),
                    reject_dir.display()
                )
            }
            Self::SkippedEntries { paths } => {
                write!(f, "{} upstream entr(ies) skipped:", paths.len())?;
                for p in paths {
                    write!(f, "\n  - {p}")?;
                }
                Ok(())
            }
            Self::CleanupFailed { path, message } => {
                write!(f, "could not remove {}: {message}", path.display())
            }
            Self::MissingSources { branch, path } => {
                write!(
                    f,
                    "branch '{branch}': {} does not exist, skipped",
                    path.display()
                )
            }
        }
    }
}

/// Result of an operation that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum Outcome {
    Ok,
    Warning(Vec<Warning>),
}

impl Outcome {
    /// `Ok` when `warnings` is empty.
    pub fn from_warnings(warnings: Vec<Warning>) -> Self {
        if warnings.is_empty() {
            Self::Ok
        } else {
            Self::Warning(warnings)
        }
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        match self {
            Self::Ok => &[],
            Self::Warning(w) => w,
        }
    }

    #[must_use]
    pub fn into_warnings(self) -> Vec<Warning> {
        match self {
            Self::Ok => Vec::new(),
            Self::Warning(w) => w,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
