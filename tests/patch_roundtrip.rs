//! Property tests for the patch engine: applying a generated patch set to
//! its baseline must reproduce the modified tree, and regenerating from the
//! result must give byte-identical patches.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use proptest::prelude::*;

use porter::fsutil::{IgnoreSet, collect_files};
use porter::patch::{ApplyOptions, ApplyReport, ExitStatus, GenerateOptions, apply_patches, generate_patches};

const PATHS: &[&str] = &["a.txt", "b.txt", "src/c.txt", "src/deep/d.txt", "e.bin"];

fn arb_content() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        4 => (prop::collection::vec("[ab\r]{0,3}", 0..24), any::<bool>()).prop_map(|(lines, eol)| {
            let mut text = lines.join("\n");
            if eol && !text.is_empty() {
                text.push('\n');
            }
            text.into_bytes()
        }),
        1 => prop::collection::vec(any::<u8>(), 0..16),
    ]
}

fn arb_tree() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(
        prop::sample::select(PATHS).prop_map(str::to_owned),
        arb_content(),
        0..PATHS.len(),
    )
}

fn write_tree(root: &Path, tree: &BTreeMap<String, Vec<u8>>) {
    fs::create_dir_all(root).unwrap();
    for (rel, content) in tree {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, content).unwrap();
    }
}

fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    collect_files(root, &IgnoreSet::default())
        .unwrap()
        .into_iter()
        .map(|(rel, path)| (rel, fs::read(path).unwrap()))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn apply_reproduces_modified_tree(base in arb_tree(), ours in arb_tree()) {
        let dir = tempfile::tempdir().unwrap();
        let (b, o) = (dir.path().join("base"), dir.path().join("ours"));
        write_tree(&b, &base);
        write_tree(&o, &ours);

        let patches = dir.path().join("patches");
        let generated = generate_patches(&b, &o, &patches, &GenerateOptions::default()).unwrap();
        prop_assert_eq!(generated.status() == ExitStatus::Clean, base == ours);

        let out = dir.path().join("out");
        let applied = apply_patches(&b, &patches, &out, &dir.path().join("rej"), ApplyOptions::default()).unwrap();
        prop_assert_eq!(applied.status(), ExitStatus::Clean);
        prop_assert_eq!(read_tree(&out), ours);
    }

    #[test]
    fn regenerating_from_applied_tree_is_stable(base in arb_tree(), ours in arb_tree()) {
        let dir = tempfile::tempdir().unwrap();
        let (b, o) = (dir.path().join("base"), dir.path().join("ours"));
        write_tree(&b, &base);
        write_tree(&o, &ours);

        let first = dir.path().join("first");
        generate_patches(&b, &o, &first, &GenerateOptions::default()).unwrap();
        let out = dir.path().join("out");
        apply_patches(&b, &first, &out, &dir.path().join("rej"), ApplyOptions::default()).unwrap();

        let second = dir.path().join("second");
        generate_patches(&b, &out, &second, &GenerateOptions::default()).unwrap();
        prop_assert_eq!(read_tree(&first), read_tree(&second));
    }
}

#[test]
fn ignored_paths_never_reach_the_patch_set() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base");
    let ours = dir.path().join("ours");
    write_tree(&base, &BTreeMap::from([(".gradle/cache".to_owned(), b"1".to_vec())]));
    write_tree(
        &ours,
        &BTreeMap::from([
            (".gradle/cache".to_owned(), b"2".to_vec()),
            (".git/HEAD".to_owned(), b"ref".to_vec()),
            (".gradle-wrapper/keep".to_owned(), b"k\n".to_vec()),
        ]),
    );
    let patches = dir.path().join("patches");
    let report = generate_patches(&base, &ours, &patches, &GenerateOptions::default()).unwrap();
    assert_eq!(report.added, vec![".gradle-wrapper/keep"]);
    assert!(report.modified.is_empty());
    assert_eq!(read_tree(&patches).len(), 1);
}

type Tree = BTreeMap<String, Vec<u8>>;

/// Generate from `base` to `ours`, apply onto `base`, return the result.
fn round_trip(base: &Tree, ours: &Tree) -> (ApplyReport, Tree) {
    let dir = tempfile::tempdir().unwrap();
    let (b, o) = (dir.path().join("base"), dir.path().join("ours"));
    write_tree(&b, base);
    write_tree(&o, ours);
    let patches = dir.path().join("patches");
    generate_patches(&b, &o, &patches, &GenerateOptions::default()).unwrap();
    let out = dir.path().join("out");
    let report = apply_patches(&b, &patches, &out, &dir.path().join("rej"), ApplyOptions::default()).unwrap();
    (report, read_tree(&out))
}

#[test]
fn edits_inside_a_build_package_survive() {
    let rel = "src/com/example/build/Builder.java".to_owned();
    let base = BTreeMap::from([(rel.clone(), b"class Builder {}\n".to_vec())]);
    let ours = BTreeMap::from([(rel.clone(), b"class Builder { int x; }\n".to_vec())]);
    let (report, out) = round_trip(&base, &ours);
    assert_eq!(report.status(), ExitStatus::Clean);
    assert_eq!(report.applied, vec![rel]);
    assert_eq!(out, ours);
}

#[test]
fn file_names_with_tabs_and_quotes_round_trip() {
    let base = BTreeMap::from([
        ("a\tb.txt".to_owned(), b"x\n".to_vec()),
        ("a".to_owned(), b"plain\n".to_vec()),
    ]);
    let ours = BTreeMap::from([
        ("a\tb.txt".to_owned(), b"y\n".to_vec()),
        ("a".to_owned(), b"plain\n".to_vec()),
        ("say \"hi\".txt".to_owned(), b"hi\n".to_vec()),
    ]);
    let (report, out) = round_trip(&base, &ours);
    assert_eq!(report.status(), ExitStatus::Clean);
    assert!(report.rejects.is_empty());
    assert_eq!(out, ours);
}
