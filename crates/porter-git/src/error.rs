//! The one error type every [`GitRepo`](crate::GitRepo) method returns.
//!
//! Porter only needs to tell a missing revision or object apart from a broken
//! repository, so the variants stay coarse and carry rendered messages rather
//! than gix error values.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    /// `path` is not inside a readable repository.
    #[error("cannot open git repository at {}: {message}", path.display())]
    OpenFailed { path: PathBuf, message: String },

    /// Unknown revision, or an object id with nothing behind it.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// The id resolved, but to the wrong kind of object (a tree or blob
    /// where a commit was asked for).
    #[error("{oid} is not a {expected}")]
    WrongKind {
        oid: String,
        expected: &'static str,
    },

    /// Object id of an unsupported hash kind or malformed text.
    #[error("invalid object id `{value}`: {reason}")]
    InvalidOid { value: String, reason: String },

    /// Anything else gix reported.
    #[error("git backend error: {message}")]
    BackendError { message: String },
}
