//! porter library crate.
//!
//! The primary interface is the `porter` binary. The library exposes the
//! orchestrator, the patch engine and the layout types so integration tests
//! can drive them directly without going through the CLI.

pub mod config;
pub mod error;
pub mod fsutil;
pub mod layout;
pub mod marker;
pub mod materialize;
pub mod patch;
pub mod telemetry;
pub mod workspace;

pub use config::{PatchMode, PorterConfig};
pub use error::{ErrorKind, Outcome, Warning, WorkspaceError};
pub use layout::{WorkspaceLayout, WorkspaceState};
pub use workspace::{SetupOptions, StatusReport, Workspace};
