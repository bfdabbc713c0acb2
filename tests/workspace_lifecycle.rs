//! End-to-end lifecycle tests: setup, split, generate, update-ref, rebuild,
//! clean, driven through the library and the binary.

mod common;

use common::{TestProject, numbered};
use porter::{SetupOptions, Warning, WorkspaceError, WorkspaceState};

// ---------------------------------------------------------------------------
// setup
// ---------------------------------------------------------------------------

#[test]
fn setup_on_fresh_project_pins_head_and_bootstraps_branches() {
    let p = TestProject::new(&["fabric", "forge"], "exact");
    let head = p.commit_upstream(&[("a.txt", "alpha\n"), ("src/b.txt", "beta\n")], "init");
    let ws = p.workspace();
    assert_eq!(ws.state(), WorkspaceState::Empty);

    let outcome = ws.setup(&SetupOptions::default()).unwrap();
    assert!(outcome.is_ok(), "{outcome:?}");
    assert_eq!(p.marker().as_deref(), Some(head.as_str()));
    assert_eq!(p.read("upstream/src/b.txt").as_deref(), Some("beta\n"));
    assert_eq!(p.read("workspace/fabric/a.txt").as_deref(), Some("alpha\n"));
    assert_eq!(p.read("workspace/forge/src/b.txt").as_deref(), Some("beta\n"));
    assert_eq!(ws.state(), WorkspaceState::BranchesMaterialized);
}

#[test]
fn setup_replays_pinned_commit_after_upstream_moves() {
    let p = TestProject::new(&["fabric"], "exact");
    let first = p.commit_upstream(&[("a.txt", "v1\n")], "v1");
    p.workspace().setup(&SetupOptions::default()).unwrap();

    p.commit_upstream(&[("a.txt", "v2\n")], "v2");
    p.workspace().setup(&SetupOptions::default()).unwrap();

    assert_eq!(p.marker().as_deref(), Some(first.as_str()));
    assert_eq!(p.read("upstream/a.txt").as_deref(), Some("v1\n"));
}

#[test]
fn setup_commit_override_leaves_marker_alone() {
    let p = TestProject::new(&["fabric"], "exact");
    let first = p.commit_upstream(&[("a.txt", "v1\n")], "v1");
    p.workspace().setup(&SetupOptions::default()).unwrap();
    let second = p.commit_upstream(&[("a.txt", "v2\n")], "v2");

    p.workspace()
        .setup(&SetupOptions {
            commit: Some(second),
        })
        .unwrap();
    assert_eq!(p.read("workspace/fabric/a.txt").as_deref(), Some("v2\n"));
    assert_eq!(p.marker().as_deref(), Some(first.as_str()));
}

#[test]
fn setup_with_unknown_reference_is_a_vcs_error() {
    let p = TestProject::new(&["fabric"], "exact");
    p.commit_upstream(&[("a.txt", "v1\n")], "v1");
    let err = p
        .workspace()
        .setup(&SetupOptions {
            commit: Some("no-such-ref".to_owned()),
        })
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::Vcs(_)), "{err}");
    assert!(p.marker().is_none());
}

// ---------------------------------------------------------------------------
// split / generate
// ---------------------------------------------------------------------------

#[test]
fn split_edit_generate_then_setup_reapplies_edits() {
    let p = TestProject::new(&["fabric"], "exact");
    p.commit_upstream(&[("a.txt", &numbered(10)), ("old.txt", "bye\n")], "init");
    let ws = p.workspace();
    ws.setup(&SetupOptions::default()).unwrap();
    ws.split_sources().unwrap();
    assert_eq!(p.read("fabric/a.txt"), Some(numbered(10)));

    let edited = numbered(10).replace("line 5\n", "five\n");
    p.write("fabric/a.txt", &edited);
    p.write("fabric/new/added.txt", "fresh\n");
    std::fs::remove_file(p.path("fabric/old.txt")).unwrap();
    p.write("fabric/.idea/workspace.xml", "<ide/>\n");

    assert!(ws.generate_patches().unwrap().is_ok());
    assert!(p.path("patches/fabric/a.txt.patch").is_file());
    assert!(p.path("patches/fabric/new/added.txt.patch").is_file());
    assert!(p.path("patches/fabric/old.txt.patch").is_file());
    assert!(!p.path("patches/fabric/.idea").exists());

    ws.setup(&SetupOptions::default()).unwrap();
    assert_eq!(p.read("workspace/fabric/a.txt"), Some(edited));
    assert_eq!(p.read("workspace/fabric/new/added.txt").as_deref(), Some("fresh\n"));
    assert!(!p.path("workspace/fabric/old.txt").exists());
}

#[test]
fn split_before_setup_is_refused() {
    let p = TestProject::new(&["fabric"], "exact");
    let err = p.workspace().split_sources().unwrap_err();
    assert!(matches!(
        err,
        WorkspaceError::Precondition {
            actual: WorkspaceState::Empty,
            required: WorkspaceState::BranchesMaterialized,
            ..
        }
    ));
}

#[test]
fn generate_falls_back_to_working_copy() {
    let p = TestProject::new(&["fabric"], "exact");
    p.commit_upstream(&[("a.txt", "a\n")], "init");
    let ws = p.workspace();
    ws.setup(&SetupOptions::default()).unwrap();
    p.write("workspace/fabric/a.txt", "changed\n");

    ws.generate_patches().unwrap();
    let patch = p.read("patches/fabric/a.txt.patch").unwrap();
    assert!(patch.contains("+changed\n"));
}

// ---------------------------------------------------------------------------
// update-ref / rejects
// ---------------------------------------------------------------------------

#[test]
fn update_ref_advances_marker_and_baseline() {
    let p = TestProject::new(&["fabric"], "exact");
    let first = p.commit_upstream(&[("a.txt", "v1\n")], "v1");
    p.workspace().setup(&SetupOptions::default()).unwrap();
    let second = p.commit_upstream(&[("a.txt", "v2\n")], "v2");
    assert_ne!(first, second);

    p.workspace().update_commit_ref().unwrap();
    assert_eq!(p.marker().as_deref(), Some(second.as_str()));
    assert_eq!(p.read("upstream/a.txt").as_deref(), Some("v2\n"));
}

#[test]
fn drifted_upstream_rejects_in_exact_mode_and_applies_in_fuzzy_mode() {
    let p = TestProject::new(&["fabric"], "exact");
    p.commit_upstream(&[("f.txt", &numbered(20))], "init");
    let ws = p.workspace();
    ws.setup(&SetupOptions::default()).unwrap();
    p.write("workspace/fabric/f.txt", &numbered(20).replace("line 10\n", "ten\n"));
    ws.generate_patches().unwrap();

    p.commit_upstream(&[("f.txt", &format!("header\n\n{}", numbered(20)))], "drift");
    ws.update_commit_ref().unwrap();

    let outcome = ws.setup(&SetupOptions::default()).unwrap();
    match outcome.warnings() {
        [Warning::Rejects { branch, hunks, files, .. }] => {
            assert_eq!(branch, "fabric");
            assert_eq!(*hunks, 1);
            assert_eq!(files, &["f.txt".to_owned()]);
        }
        other => panic!("expected one reject warning, got {other:?}"),
    }
    assert!(p.path("rejects/fabric/f.txt.rej").is_file());

    let fuzzy = porter::Workspace::new(
        p.root(),
        ws.config().clone().with_overrides(porter::config::Overrides {
            mode: Some(porter::PatchMode::Fuzzy),
            ..Default::default()
        }),
    );
    assert!(fuzzy.setup(&SetupOptions::default()).unwrap().is_ok());
    assert_eq!(
        p.read("workspace/fabric/f.txt"),
        Some(format!("header\n\n{}", numbered(20).replace("line 10\n", "ten\n")))
    );
    assert!(!p.path("rejects/fabric").exists());
}

// ---------------------------------------------------------------------------
// rebuild / clean
// ---------------------------------------------------------------------------

#[test]
fn rebuild_carries_split_edits_onto_new_upstream() {
    let p = TestProject::new(&["fabric"], "exact");
    p.commit_upstream(&[("a.txt", "a1\n"), ("b.txt", "b1\n")], "init");
    let ws = p.workspace();
    ws.setup(&SetupOptions::default()).unwrap();
    ws.split_sources().unwrap();
    p.write("fabric/a.txt", "ours\n");

    let head = p.commit_upstream(&[("b.txt", "b2\n")], "upstream moves");
    let outcome = ws.rebuild_patches().unwrap();
    assert!(outcome.is_ok(), "{outcome:?}");

    assert_eq!(p.marker().as_deref(), Some(head.as_str()));
    let patch = p.read("patches/fabric/a.txt.patch").unwrap();
    assert!(patch.contains("-a1\n+ours\n"));
    // The split tree still carried b1, so the branch now pins it.
    assert!(p.path("patches/fabric/b.txt.patch").is_file());
    assert!(!p.path("upstream").exists());
    assert!(!p.path("workspace").exists());
    assert!(p.path("fabric/a.txt").is_file());
}

#[test]
fn rebuild_reports_overlapping_upstream_change_in_exact_mode() {
    let p = TestProject::new(&["fabric"], "exact");
    p.commit_upstream(&[("a.txt", "1\n")], "init");
    let ws = p.workspace();
    ws.setup(&SetupOptions::default()).unwrap();
    ws.split_sources().unwrap();
    p.write("fabric/a.txt", "2\n");
    ws.generate_patches().unwrap();

    p.commit_upstream(&[("a.txt", "3\n")], "upstream rewrites a");
    let outcome = ws.rebuild_patches().unwrap();
    match outcome.warnings() {
        [Warning::Rejects { branch, files, hunks, .. }] => {
            assert_eq!(branch, "fabric");
            assert_eq!(files, &["a.txt".to_owned()]);
            assert_eq!(*hunks, 1);
        }
        other => panic!("expected one reject warning, got {other:?}"),
    }
    assert!(p.path("rejects/fabric/a.txt.rej").is_file());
    // The split tree wins, so the regenerated patch is against the new base.
    let patch = p.read("patches/fabric/a.txt.patch").unwrap();
    assert!(patch.contains("-3\n+2\n"), "{patch}");
}

#[test]
fn rebuild_merges_disjoint_drift_in_fuzzy_mode() {
    let p = TestProject::new(&["fabric"], "fuzzy");
    p.commit_upstream(&[("f.txt", &numbered(20))], "init");
    let ws = p.workspace();
    ws.setup(&SetupOptions::default()).unwrap();
    ws.split_sources().unwrap();
    p.write("fabric/f.txt", &numbered(20).replace("line 10\n", "ten\n"));
    ws.generate_patches().unwrap();

    let head = p.commit_upstream(&[("f.txt", &format!("header\n\n{}", numbered(20)))], "drift");
    let outcome = ws.rebuild_patches().unwrap();
    assert!(outcome.is_ok(), "{outcome:?}");
    assert_eq!(p.marker().as_deref(), Some(head.as_str()));
    assert!(!p.path("rejects/fabric").exists());
    let patch = p.read("patches/fabric/f.txt.patch").unwrap();
    assert!(patch.contains("-line 10\n+ten\n"), "{patch}");
}

#[test]
fn rebuild_without_split_tree_warns() {
    let p = TestProject::new(&["fabric"], "exact");
    p.commit_upstream(&[("a.txt", "a\n")], "init");
    let outcome = p.workspace().rebuild_patches().unwrap();
    assert!(
        outcome
            .warnings()
            .iter()
            .any(|w| matches!(w, Warning::MissingSources { branch, .. } if branch == "fabric")),
        "{outcome:?}"
    );
}

#[test]
fn clean_keeps_patches_and_marker() {
    let p = TestProject::new(&["fabric"], "exact");
    p.commit_upstream(&[("a.txt", "a\n")], "init");
    let ws = p.workspace();
    ws.setup(&SetupOptions::default()).unwrap();
    p.write("workspace/fabric/a.txt", "b\n");
    ws.generate_patches().unwrap();
    p.write("tmp/scratch", "x");

    assert!(ws.clean().unwrap().is_ok());
    assert!(!p.path("upstream").exists());
    assert!(!p.path("workspace").exists());
    assert!(!p.path("tmp").exists());
    assert!(p.path("patches/fabric/a.txt.patch").is_file());
    assert!(p.marker().is_some());
    assert!(ws.clean().unwrap().is_ok());
}

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[test]
fn cli_status_json_reports_state() {
    let p = TestProject::new(&["fabric"], "fuzzy");
    p.commit_upstream(&[("a.txt", "a\n")], "init");
    let out = p.porter(&["setup"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = p.porter(&["status", "--format", "json"]);
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["state"], "branches_materialized");
    assert_eq!(json["mode"], "fuzzy");
    assert_eq!(json["branches"][0]["name"], "fabric");
    assert_eq!(json["commit"], p.marker().unwrap().as_str());
}

#[test]
fn cli_split_on_empty_project_fails_with_precondition_code() {
    let p = TestProject::new(&["fabric"], "exact");
    let out = p.porter(&["split"]);
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("porter setup"), "{stderr}");
}

#[test]
fn cli_rejects_exit_one() {
    let p = TestProject::new(&["fabric"], "exact");
    p.commit_upstream(&[("f.txt", &numbered(20))], "init");
    assert!(p.porter(&["setup"]).status.success());
    p.write("workspace/fabric/f.txt", &numbered(20).replace("line 10\n", "ten\n"));
    assert!(p.porter(&["generate"]).status.success());

    p.commit_upstream(&[("f.txt", &numbered(20).replace("line 10\n", "line X\n"))], "conflict");
    assert!(p.porter(&["update-ref"]).status.success());
    let out = p.porter(&["setup"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("did not apply"));
}

#[test]
fn cli_branch_override_is_validated() {
    let p = TestProject::new(&["fabric"], "exact");
    p.commit_upstream(&[("a.txt", "a\n")], "init");
    let out = p.porter(&["setup", "--branch", "upstream"]);
    assert_eq!(out.status.code(), Some(2));
}
