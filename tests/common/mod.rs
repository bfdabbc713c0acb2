//! Shared test helpers for porter integration tests.
//!
//! Every test gets its own project in a temp directory. The upstream git
//! repository lives in `<project>/repo` so the project's own directories
//! (upstream/, workspace/, patches/, ...) never end up in a commit.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

use porter::{PorterConfig, Workspace};

pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    /// Fresh project tracking `main` of an empty repo, with the given
    /// branches and mode.
    pub fn new(branches: &[&str], mode: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        git(&repo, &["init", "-q", "-b", "main"]);
        git(&repo, &["config", "user.email", "test@test.com"]);
        git(&repo, &["config", "user.name", "Test User"]);
        git(&repo, &["config", "commit.gpgsign", "false"]);

        let list = branches
            .iter()
            .map(|b| format!("\"{b}\""))
            .collect::<Vec<_>>()
            .join(", ");
        std::fs::write(
            dir.path().join("porter.toml"),
            format!(
                "[upstream]\nreference = \"main\"\nrepository = \"repo\"\n\n[porting]\nbranches = [{list}]\nmode = \"{mode}\"\n"
            ),
        )
        .unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write files into the upstream repo and commit them. Returns the new
    /// HEAD id.
    pub fn commit_upstream(&self, files: &[(&str, &str)], message: &str) -> String {
        let repo = self.path("repo");
        for (path, content) in files {
            let full = repo.join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        git(&repo, &["add", "-A"]);
        git(&repo, &["commit", "-q", "-m", message]);
        git(&repo, &["rev-parse", "HEAD"])
    }

    /// Orchestrator over the current porter.toml.
    pub fn workspace(&self) -> Workspace {
        let config = PorterConfig::load(&self.path("porter.toml")).unwrap();
        Workspace::new(self.root(), config)
    }

    pub fn read(&self, rel: &str) -> Option<String> {
        std::fs::read_to_string(self.path(rel)).ok()
    }

    pub fn write(&self, rel: &str, content: &str) {
        let p = self.path(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, content).unwrap();
    }

    pub fn marker(&self) -> Option<String> {
        self.read("commit.sha").map(|s| s.trim().to_owned())
    }

    /// Run the porter binary in the project root.
    pub fn porter(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_porter"))
            .args(args)
            .current_dir(self.root())
            .env_remove("PORTER_LOG")
            .env_remove("PORTER_ROOT")
            .env_remove("PORTER_CONFIG")
            .output()
            .expect("failed to execute porter")
    }
}

/// Run git in `dir`. Panics on failure; returns trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {}: {e}", args.join(" ")));
    assert!(
        out.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_owned()
}

/// `line 1\n` .. `line n\n`
pub fn numbered(n: usize) -> String {
    (1..=n).map(|i| format!("line {i}\n")).collect()
}
