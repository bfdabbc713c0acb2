//! Read-only git access for porter.
//!
//! This crate defines the [`GitRepo`] trait, the only way the rest of porter
//! talks to a git object store. Nothing outside this crate imports gix; callers
//! depend on `porter-git` and program against the trait.
//!
//! # Crate layout
//!
//! - [`repo`]: the [`GitRepo`] trait definition.
//! - [`types`]: value types used in trait signatures ([`GitOid`],
//!   [`TreeEntry`], [`CommitInfo`], ...).
//! - [`walk`]: [`TreeWalk`], a lazy depth-first iterator over every entry
//!   reachable from a root tree.
//! - [`error`]: the [`GitError`] enum returned by all trait methods.

pub mod error;
pub mod repo;
pub mod types;
pub mod walk;

// gix-backed implementation modules
mod gix_repo;
mod objects_impl;
mod refs_impl;

pub use gix_repo::GixRepo;

pub use error::GitError;
pub use repo::GitRepo;
pub use types::{CommitInfo, EntryMode, GitOid, OidParseError, TreeEntry};
pub use walk::{TreeWalk, WalkEntry, WalkError};
