//! Project configuration (`porter.toml`).
//!
//! Defines the typed configuration read from the project root: the upstream
//! reference, the porting branches, patch application mode, and diff
//! settings. CLI flags are layered on top via [`Overrides`].

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the configuration file in the project root.
pub const CONFIG_FILE: &str = "porter.toml";

/// Directory and file names owned by the workspace layout; a branch may not
/// use one of these as its name.
pub const RESERVED_NAMES: &[&str] = &[
    "upstream",
    "workspace",
    "patches",
    "rejects",
    "tmp",
    "commit.sha",
    ".git",
    CONFIG_FILE,
];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level project configuration.
///
/// Missing file → all defaults. The defaults alone do not pass
/// [`PorterConfig::validate`]: an upstream reference and at least one branch
/// must come from the file or from CLI overrides.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PorterConfig {
    /// Where the baseline comes from.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// The porting branches and how their patches are applied.
    #[serde(default)]
    pub porting: PortingConfig,

    /// Patch generation settings.
    #[serde(default)]
    pub diff: DiffConfig,
}

// ---------------------------------------------------------------------------
// UpstreamConfig
// ---------------------------------------------------------------------------

/// Upstream (baseline) source settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Branch, tag or commit to materialize (e.g. `"1.20/dev"`).
    pub reference: Option<String>,

    /// Path of the git repository, relative to the project root. The
    /// repository is discovered upward from here. Defaults to the project
    /// root itself.
    pub repository: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// PortingConfig
// ---------------------------------------------------------------------------

/// Porting branch settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PortingConfig {
    /// Names of the porting branches. Each becomes a directory name.
    #[serde(default)]
    pub branches: Vec<String>,

    /// How strictly hunks must match when patches are applied.
    #[serde(default)]
    pub mode: PatchMode,

    /// Largest line offset searched in [`PatchMode::Fuzzy`].
    #[serde(default = "default_max_offset")]
    pub max_offset: usize,

    /// Most context lines that may be dropped from each end of a hunk in
    /// [`PatchMode::Fuzzy`].
    #[serde(default = "default_max_fuzz")]
    pub max_fuzz: usize,
}

impl Default for PortingConfig {
    fn default() -> Self {
        Self {
            branches: Vec::new(),
            mode: PatchMode::default(),
            max_offset: default_max_offset(),
            max_fuzz: default_max_fuzz(),
        }
    }
}

const fn default_max_offset() -> usize {
    1000
}

const fn default_max_fuzz() -> usize {
    2
}

/// Patch application mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchMode {
    /// Hunks must match exactly at their recorded position.
    #[default]
    Exact,
    /// Hunks may move and lose some context to tolerate upstream drift.
    Fuzzy,
}

impl fmt::Display for PatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

impl std::str::FromStr for PatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "fuzzy" => Ok(Self::Fuzzy),
            other => Err(format!("unknown patch mode '{other}' (expected exact or fuzzy)")),
        }
    }
}

// ---------------------------------------------------------------------------
// DiffConfig
// ---------------------------------------------------------------------------

/// Patch generation settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiffConfig {
    /// Lines of unchanged context around each hunk.
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,

    /// Path prefixes excluded from diffing, matched by whole path segments.
    #[serde(default = "default_ignored_prefixes")]
    pub ignored_prefixes: Vec<String>,

    /// File and directory names excluded from diffing wherever they
    /// appear in the tree.
    #[serde(default = "default_cleanup_names")]
    pub cleanup_names: Vec<String>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            context_lines: default_context_lines(),
            ignored_prefixes: default_ignored_prefixes(),
            cleanup_names: default_cleanup_names(),
        }
    }
}

const fn default_context_lines() -> usize {
    3
}

fn default_ignored_prefixes() -> Vec<String> {
    [".idea", ".gradle", ".git"].map(str::to_owned).to_vec()
}

fn default_cleanup_names() -> Vec<String> {
    [".idea", ".gradle"].map(str::to_owned).to_vec()
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Values supplied by the driver (CLI flags) that win over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    /// Replaces `upstream.reference`.
    pub upstream: Option<String>,
    /// Replaces `porting.branches` when non-empty.
    pub branches: Vec<String>,
    /// Replaces `porting.mode`.
    pub mode: Option<PatchMode>,
}

impl PorterConfig {
    /// Apply driver-supplied overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(upstream) = overrides.upstream {
            self.upstream.reference = Some(upstream);
        }
        if !overrides.branches.is_empty() {
            self.porting.branches = overrides.branches;
        }
        if let Some(mode) = overrides.mode {
            self.porting.mode = mode;
        }
        self
    }

    /// The upstream reference, if one is configured and non-blank.
    #[must_use]
    pub fn upstream_reference(&self) -> Option<&str> {
        self.upstream
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    /// Check that the upstream reference is set.
    ///
    /// # Errors
    /// Returns a message describing the missing setting.
    pub fn require_upstream(&self) -> Result<&str, String> {
        self.upstream_reference().ok_or_else(|| {
            format!("no upstream reference configured; set [upstream] reference in {CONFIG_FILE} or pass --upstream")
        })
    }

    /// Check that at least one branch is configured and every name is usable
    /// as a top-level directory.
    ///
    /// # Errors
    /// Returns a message naming the first problem found.
    pub fn require_branches(&self) -> Result<&[String], String> {
        if self.porting.branches.is_empty() {
            return Err(format!(
                "no porting branches configured; set [porting] branches in {CONFIG_FILE} or pass --branch"
            ));
        }
        let repo_dir = self.repository_dir_name();
        for (i, name) in self.porting.branches.iter().enumerate() {
            validate_branch_name(name)?;
            if repo_dir.is_some_and(|dir| dir == name.as_str()) {
                return Err(format!(
                    "porting branch '{name}' clashes with the upstream repository directory"
                ));
            }
            if self.porting.branches[..i].contains(name) {
                return Err(format!("porting branch '{name}' is listed twice"));
            }
        }
        Ok(&self.porting.branches)
    }

    /// Top-level project directory holding the upstream repository, when
    /// `upstream.repository` points below the project root.
    fn repository_dir_name(&self) -> Option<&str> {
        let mut parts = self.upstream.repository.as_deref()?.components();
        match parts.find(|c| !matches!(c, Component::CurDir))? {
            Component::Normal(name) => name.to_str(),
            _ => None,
        }
    }

    /// Full validation: upstream reference and branches.
    ///
    /// # Errors
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.require_upstream()?;
        self.require_branches()?;
        Ok(())
    }
}

/// A branch name must be a single, ordinary path segment that does not clash
/// with the workspace layout.
///
/// # Errors
/// Returns why the name is unusable.
pub fn validate_branch_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("porting branch name must not be empty".to_owned());
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(format!(
            "porting branch '{name}' must be a single directory name"
        ));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(format!(
            "porting branch '{name}' clashes with a workspace directory"
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// A `porter.toml` that could not be read or understood.
#[derive(Debug, Error)]
#[error("{}{}{message}", origin(.path.as_deref()), at_line(.line.as_ref()))]
pub struct ConfigError {
    /// File being loaded; `None` when parsing a string.
    pub path: Option<PathBuf>,
    /// 1-based line of a TOML error.
    pub line: Option<usize>,
    pub message: String,
}

fn origin(path: Option<&Path>) -> String {
    path.map_or_else(|| "config error: ".to_owned(), |p| format!("{}: ", p.display()))
}

fn at_line(line: Option<&usize>) -> String {
    line.map(|n| format!("line {n}: ")).unwrap_or_default()
}

impl PorterConfig {
    /// Read `path`. A missing file is not an error: it yields the defaults,
    /// which the operations then reject with a configuration error of their
    /// own if something required is absent.
    ///
    /// # Errors
    /// Unreadable file, invalid TOML, or unknown keys.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).map_err(|e| ConfigError {
                path: Some(path.to_owned()),
                ..e
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file absent, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError {
                path: Some(path.to_owned()),
                line: None,
                message: format!("cannot read: {e}"),
            }),
        }
    }

    /// Parse the contents of a `porter.toml`.
    ///
    /// # Errors
    /// Invalid TOML or unknown keys, with the line when toml reports a span.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e: toml::de::Error| ConfigError {
            path: None,
            line: e
                .span()
                .map(|span| text[..span.start].matches('\n').count() + 1),
            message: e.message().to_owned(),
        })
    }
}
