//! The workspace orchestrator.
//!
//! [`Workspace`] sequences materialization and the patch tools over the
//! project layout. Each operation reads the [`WorkspaceState`] once, checks
//! its precondition against it, and reports `Ok(Outcome)` or a fatal
//! [`WorkspaceError`].
//!
//! Operations are not safe to run concurrently on the same project root:
//! they wipe and rebuild shared directories. Callers serialize access.

use std::path::PathBuf;

use porter_git::{GitRepo as _, GixRepo};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::{PatchMode, PorterConfig};
use crate::error::{Outcome, PatchStage, Warning, WorkspaceError};
use crate::fsutil;
use crate::layout::{BranchPaths, WorkspaceLayout, WorkspaceState};
use crate::marker::{CommitId, CommitMarker};
use crate::materialize::{MaterializeReport, materialize};
use crate::patch::{self, ApplyOptions, ExitStatus, GenerateOptions, PatchError};

/// Options for [`Workspace::setup`].
#[derive(Clone, Debug, Default)]
pub struct SetupOptions {
    /// Materialize this revision instead of the marker or the configured
    /// reference. The marker is left untouched.
    pub commit: Option<String>,
}

/// A porting project on disk plus its configuration.
#[derive(Clone, Debug)]
pub struct Workspace {
    layout: WorkspaceLayout,
    config: PorterConfig,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, config: PorterConfig) -> Self {
        Self {
            layout: WorkspaceLayout::new(root),
            config,
        }
    }

    #[must_use]
    pub const fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    #[must_use]
    pub const fn config(&self) -> &PorterConfig {
        &self.config
    }

    /// Current state, derived from the layout.
    #[must_use]
    pub fn state(&self) -> WorkspaceState {
        WorkspaceState::detect(&self.layout, &self.config.porting.branches)
    }

    fn marker(&self) -> CommitMarker {
        CommitMarker::new(self.layout.marker_path())
    }

    fn branches(&self) -> Result<&[String], WorkspaceError> {
        self.config
            .require_branches()
            .map_err(WorkspaceError::configuration)
    }

    fn upstream_reference(&self) -> Result<&str, WorkspaceError> {
        self.config
            .require_upstream()
            .map_err(WorkspaceError::configuration)
    }

    /// Open the upstream repository. The handle lives only as long as the
    /// caller's scope.
    fn open_repo(&self) -> Result<GixRepo, WorkspaceError> {
        let path = self
            .config
            .upstream
            .repository
            .as_ref()
            .map_or_else(|| self.layout.root().to_path_buf(), |p| self.layout.root().join(p));
        Ok(GixRepo::open(&path)?)
    }

    /// Wipe `upstream/` and extract `reference` into it. The reference is
    /// resolved before anything is removed.
    fn pull(&self, reference: &str) -> Result<MaterializeReport, WorkspaceError> {
        let upstream = self.layout.upstream_dir();
        let repo = self.open_repo()?;
        repo.rev_parse(reference)?;
        fsutil::remove_dir_if_exists(&upstream)?;
        let report = materialize(&repo, reference, &upstream)?;
        drop(repo);
        Ok(report)
    }

    fn require(operation: &'static str, actual: WorkspaceState, required: WorkspaceState) -> Result<(), WorkspaceError> {
        if actual >= required {
            Ok(())
        } else {
            Err(WorkspaceError::Precondition {
                operation,
                required,
                actual,
            })
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Build `upstream/` and every `workspace/<b>` from scratch.
    ///
    /// The commit comes from `options.commit`, else the marker, else a fresh
    /// resolution of the upstream reference. Only the fresh resolution writes
    /// the marker.
    ///
    /// # Errors
    /// Fails on missing configuration, an unresolvable commit, filesystem
    /// errors, or a hard patch-application failure.
    #[instrument(skip_all, fields(root = %self.layout.root().display()))]
    pub fn setup(&self, options: &SetupOptions) -> Result<Outcome, WorkspaceError> {
        let state = self.state();
        let reference = self.upstream_reference()?;
        let branches = self.branches()?;
        info!(%state, "setting up workspace");

        fsutil::remove_dir_if_exists(&self.layout.workspace_dir())?;
        let marker = self.marker();
        let pinned = marker.read()?;

        let (target, fresh) = match (&options.commit, &pinned) {
            (Some(commit), _) => (commit.as_str(), false),
            (None, Some(id)) => (id.as_str(), false),
            (None, None) => (reference, true),
        };
        let pulled = self.pull(target)?;
        if fresh {
            marker.write(&pulled.commit)?;
        }

        let mut warnings = skipped_warning(&pulled);
        let apply = ApplyOptions::from_config(&self.config.porting);
        for name in branches {
            let paths = self.layout.branch(name);
            if let Some(w) = self.apply_branch(&paths, apply)? {
                warnings.push(w);
            }
        }

        info!(commit = %pulled.commit, branches = branches.len(), "workspace ready");
        Ok(Outcome::from_warnings(warnings))
    }

    fn apply_branch(&self, paths: &BranchPaths, options: ApplyOptions) -> Result<Option<Warning>, WorkspaceError> {
        let report = patch::apply_patches(
            &self.layout.upstream_dir(),
            &paths.patch_dir,
            &paths.working_dir,
            &paths.reject_dir,
            options,
        )
        .map_err(|source| tool_failure(PatchStage::Apply, &paths.name, source))?;

        info!(
            branch = %paths.name,
            applied = report.applied.len(),
            adjusted = report.adjusted,
            bootstrapped = report.bootstrapped,
            "applied patches"
        );
        if report.status() == ExitStatus::Clean {
            return Ok(None);
        }
        warn!(branch = %paths.name, hunks = report.rejected_hunks(), "patches left rejects");
        Ok(Some(Warning::Rejects {
            branch: paths.name.clone(),
            hunks: report.rejected_hunks(),
            files: report.rejects.into_iter().map(|r| r.path).collect(),
            reject_dir: paths.reject_dir.clone(),
        }))
    }

    /// Remove `upstream/`, `workspace/` and `tmp/`. Never fails: anything
    /// that cannot be removed becomes a warning.
    #[instrument(skip_all, fields(root = %self.layout.root().display()))]
    pub fn clean(&self) -> Result<Outcome, WorkspaceError> {
        let mut warnings = Vec::new();
        for dir in [
            self.layout.upstream_dir(),
            self.layout.workspace_dir(),
            self.layout.tmp_dir(),
        ] {
            match fsutil::remove_dir_if_exists(&dir) {
                Ok(true) => info!(path = %dir.display(), "removed"),
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %dir.display(), error = %e.source, "could not remove");
                    warnings.push(Warning::CleanupFailed {
                        path: dir,
                        message: e.source.to_string(),
                    });
                }
            }
        }
        Ok(Outcome::from_warnings(warnings))
    }

    /// Resolve the upstream reference afresh, rebuild `upstream/` from it and
    /// pin the result in the marker.
    ///
    /// # Errors
    /// Fails if the reference is unset or unresolvable, or the baseline or
    /// marker cannot be written.
    #[instrument(skip_all, fields(root = %self.layout.root().display()))]
    pub fn update_commit_ref(&self) -> Result<Outcome, WorkspaceError> {
        let reference = self.upstream_reference()?;
        let previous = self.marker().read()?;
        let pulled = self.pull(reference)?;
        self.marker().write(&pulled.commit)?;

        match previous {
            Some(old) if old == pulled.commit => info!(commit = %pulled.commit, "commit marker unchanged"),
            Some(old) => info!(from = %old, to = %pulled.commit, summary = %pulled.summary, "commit marker advanced"),
            None => info!(commit = %pulled.commit, summary = %pulled.summary, "commit marker set"),
        }
        Ok(Outcome::from_warnings(skipped_warning(&pulled)))
    }

    /// Copy each `workspace/<b>` to `<b>/` at the project root, replacing it.
    ///
    /// # Errors
    /// Fails unless every branch is materialized.
    #[instrument(skip_all, fields(root = %self.layout.root().display()))]
    pub fn split_sources(&self) -> Result<Outcome, WorkspaceError> {
        let state = self.state();
        let branches = self.branches()?;
        Self::require("split", state, WorkspaceState::BranchesMaterialized)?;

        for name in branches {
            let paths = self.layout.branch(name);
            let files = fsutil::replace_dir(&paths.working_dir, &paths.split_dir)?;
            info!(branch = %name, files, "split out branch sources");
        }
        Ok(Outcome::Ok)
    }

    /// Regenerate `patches/<b>` for every branch from `<b>/` (or
    /// `workspace/<b>` when the branch has not been split out) against
    /// `upstream/`.
    ///
    /// # Errors
    /// Fails without a baseline, or on a hard generator failure.
    #[instrument(skip_all, fields(root = %self.layout.root().display()))]
    pub fn generate_patches(&self) -> Result<Outcome, WorkspaceError> {
        let state = self.state();
        let branches = self.branches()?;
        Self::require("generate", state, WorkspaceState::BaselinePresent)?;

        let options = GenerateOptions::from_config(&self.config.diff);
        let upstream = self.layout.upstream_dir();
        let mut warnings = Vec::new();
        for name in branches {
            let paths = self.layout.branch(name);
            let source = if paths.split_dir.is_dir() {
                &paths.split_dir
            } else if paths.working_dir.is_dir() {
                &paths.working_dir
            } else {
                warn!(branch = %name, "no sources to generate patches from");
                warnings.push(Warning::MissingSources {
                    branch: name.clone(),
                    path: paths.split_dir.clone(),
                });
                continue;
            };

            let report = patch::generate_patches(&upstream, source, &paths.patch_dir, &options)
                .map_err(|e| tool_failure(PatchStage::Generate, name, e))?;
            info!(
                branch = %name,
                source = %source.display(),
                added = report.added.len(),
                modified = report.modified.len(),
                deleted = report.deleted.len(),
                "generated patches"
            );
        }
        Ok(Outcome::from_warnings(warnings))
    }

    /// Carry the split-out trees onto the latest upstream:
    /// clean, update the marker, set up, overlay each `<b>/` onto its
    /// working copy, regenerate patches, clean again.
    ///
    /// # Errors
    /// Stops at the first fatal step.
    #[instrument(skip_all, fields(root = %self.layout.root().display()))]
    pub fn rebuild_patches(&self) -> Result<Outcome, WorkspaceError> {
        // Refuse before anything is wiped.
        self.config.validate().map_err(WorkspaceError::configuration)?;
        let branches = self.branches()?;

        let mut warnings = self.clean()?.into_warnings();
        warnings.extend(self.update_commit_ref()?.into_warnings());
        warnings.extend(self.setup(&SetupOptions::default())?.into_warnings());

        for name in branches {
            let paths = self.layout.branch(name);
            if paths.split_dir.is_dir() {
                fsutil::replace_dir(&paths.split_dir, &paths.working_dir)?;
            } else {
                warn!(branch = %name, "no split-out tree, keeping patched upstream");
                warnings.push(Warning::MissingSources {
                    branch: name.clone(),
                    path: paths.split_dir.clone(),
                });
            }
        }

        warnings.extend(self.generate_patches()?.into_warnings());
        warnings.extend(self.clean()?.into_warnings());
        Ok(Outcome::from_warnings(warnings))
    }

    /// Snapshot of the project for `porter status`.
    ///
    /// # Errors
    /// Fails only if the marker exists but cannot be read.
    pub fn status(&self) -> Result<StatusReport, WorkspaceError> {
        let branches = self
            .config
            .porting
            .branches
            .iter()
            .map(|name| {
                let paths = self.layout.branch(name);
                BranchStatus {
                    name: name.clone(),
                    materialized: paths.working_dir.is_dir(),
                    split: paths.split_dir.is_dir(),
                    patches: fsutil::count_files(&paths.patch_dir),
                    rejects: fsutil::count_files(&paths.reject_dir),
                }
            })
            .collect();
        Ok(StatusReport {
            root: self.layout.root().to_path_buf(),
            state: self.state(),
            commit: self.marker().read()?,
            upstream: self.config.upstream_reference().map(str::to_owned),
            mode: self.config.porting.mode,
            branches,
        })
    }
}

fn tool_failure(stage: PatchStage, branch: &str, source: PatchError) -> WorkspaceError {
    WorkspaceError::ToolFailure {
        stage,
        branch: branch.to_owned(),
        code: PatchError::CODE,
        source,
    }
}

fn skipped_warning(report: &MaterializeReport) -> Vec<Warning> {
    if report.skipped.is_empty() {
        return Vec::new();
    }
    vec![Warning::SkippedEntries {
        paths: report.skipped.iter().map(|s| s.path.clone()).collect(),
    }]
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    pub root: PathBuf,
    pub state: WorkspaceState,
    /// Pinned upstream commit.
    pub commit: Option<CommitId>,
    /// Configured upstream reference.
    pub upstream: Option<String>,
    pub mode: PatchMode,
    pub branches: Vec<BranchStatus>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BranchStatus {
    pub name: String,
    /// `workspace/<b>` exists.
    pub materialized: bool,
    /// `<b>/` exists.
    pub split: bool,
    pub patches: usize,
    pub rejects: usize,
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "root:     {}", self.root.display())?;
        writeln!(f, "state:    {}", self.state)?;
        writeln!(
            f,
            "upstream: {}",
            self.upstream.as_deref().unwrap_or("(not configured)")
        )?;
        match &self.commit {
            Some(c) => writeln!(f, "commit:   {c}")?,
            None => writeln!(f, "commit:   (not pinned)")?,
        }
        writeln!(f, "mode:     {}", self.mode)?;
        if self.branches.is_empty() {
            return writeln!(f, "branches: (none)");
        }
        writeln!(f, "branches:")?;
        for b in &self.branches {
            let mut flags = Vec::new();
            if b.materialized {
                flags.push("materialized");
            }
            if b.split {
                flags.push("split");
            }
            let flags = if flags.is_empty() {
                "-".to_owned()
            } else {
                flags.join(", ")
            };
            write!(f, "  {:<16} {} patch(es)  [{flags}]", b.name, b.patches)?;
            if b.rejects > 0 {
                write!(f, "  {} reject(s)", b.rejects)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
