use hoard_scan::{
    Catalog, CancellationToken, FileKey, FileKind, FileRecord, IndexConfig, OpenFlags, Severity,
    StatusCode, TraverseOutcome, Traverser, traverse, traverse_into,
};
use std::fs;
use std::ops::ControlFlow;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

fn index(root: &Path, flags: OpenFlags) -> (Catalog, TraverseOutcome) {
    let mut catalog = Catalog::new(101).unwrap();
    let outcome = traverse(root, &mut catalog, flags, &CancellationToken::new()).unwrap();
    (catalog, outcome)
}

fn relative_paths(catalog: &Catalog, root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<_> = catalog
        .records()
        .map(|(_, r)| r.path.strip_prefix(root).unwrap().to_path_buf())
        .collect();
    paths.sort();
    paths
}

fn set_mode(path: &Path, mode: u32) {
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

#[test]
fn test_hardlinks_are_cataloged_once() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("original"), "payload").unwrap();
    fs::hard_link(temp.path().join("original"), temp.path().join("alias")).unwrap();
    fs::create_dir(temp.path().join("sub")).unwrap();
    fs::hard_link(temp.path().join("original"), temp.path().join("sub/deep-alias")).unwrap();

    let (catalog, outcome) = index(temp.path(), OpenFlags::NO_FOLLOW);

    // sub plus one of the three names
    assert_eq!(catalog.len(), 2);
    assert_eq!(outcome.aliases_skipped, 2);

    let files: Vec<_> = catalog.records().filter(|(_, r)| r.is_file()).collect();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].1.size, 7);

    let mut keys: Vec<FileKey> = catalog.records().map(|(k, _)| *k).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), catalog.len());
}

#[test]
fn test_nested_tree_is_fully_cataloged() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("a/b")).unwrap();
    fs::create_dir(temp.path().join("c")).unwrap();
    fs::write(temp.path().join("a/one"), "1").unwrap();
    fs::write(temp.path().join("a/b/two"), "22").unwrap();
    fs::write(temp.path().join("c/three"), "333").unwrap();

    let (catalog, outcome) = index(temp.path(), OpenFlags::NO_FOLLOW);

    assert_eq!(
        relative_paths(&catalog, temp.path()),
        ["a", "a/b", "a/b/two", "a/one", "c", "c/three"]
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<_>>()
    );
    assert_eq!(outcome.directories, 4);
    assert_eq!(outcome.entries_seen, 6);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn test_permission_denied_directory_is_one_warning() {
    if running_as_root() {
        return;
    }

    let temp = TempDir::new().unwrap();
    let locked = temp.path().join("mid/locked");
    fs::create_dir_all(&locked).unwrap();
    fs::write(locked.join("hidden"), "x").unwrap();
    fs::write(temp.path().join("mid/sibling"), "x").unwrap();
    fs::write(temp.path().join("top"), "x").unwrap();
    set_mode(&locked, 0o000);

    let mut catalog = Catalog::new(101).unwrap();
    let result = traverse(temp.path(), &mut catalog, OpenFlags::NO_FOLLOW, &CancellationToken::new());
    set_mode(&locked, 0o755);
    let outcome = result.unwrap();

    assert_eq!(outcome.warnings.len(), 1);
    let warning = &outcome.warnings[0];
    assert_eq!(warning.severity(), Severity::Warning);
    assert_eq!(warning.code(), StatusCode::OpenDirectory);
    assert!(warning.is_permission_denied());
    assert_eq!(warning.path(), Some(locked.as_path()));

    assert_eq!(
        relative_paths(&catalog, temp.path()),
        ["mid", "mid/locked", "mid/sibling", "top"]
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<_>>()
    );
}

#[test]
fn test_unsearchable_directory_warns_per_entry() {
    if running_as_root() {
        return;
    }

    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("listable");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("a"), "x").unwrap();
    fs::write(dir.join("b"), "x").unwrap();
    set_mode(&dir, 0o644);

    let mut catalog = Catalog::new(101).unwrap();
    let result = traverse(temp.path(), &mut catalog, OpenFlags::NO_FOLLOW, &CancellationToken::new());
    set_mode(&dir, 0o755);
    let outcome = result.unwrap();

    assert_eq!(outcome.warnings.len(), 2);
    assert!(outcome.warnings.iter().all(|w| w.code() == StatusCode::ReadMetadata));
    assert_eq!(catalog.len(), 1);
}

#[test]
fn test_symlink_cycle_terminates_without_following() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("d")).unwrap();
    symlink("..", temp.path().join("d/loop")).unwrap();

    let (catalog, outcome) = index(temp.path(), OpenFlags::NO_FOLLOW);

    assert_eq!(catalog.len(), 2);
    assert_eq!(outcome.directories, 2);
    let link = catalog
        .records()
        .find(|(_, r)| r.path.ends_with("loop"))
        .map(|(_, r)| r.kind());
    assert_eq!(link, Some(FileKind::Symlink));
}

#[test]
fn test_symlink_cycle_terminates_when_following() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("d")).unwrap();
    symlink("..", temp.path().join("d/loop")).unwrap();

    let (catalog, _) = index(temp.path(), OpenFlags::empty());

    // d/loop resolves to the root, whose own entries are then already known
    assert_eq!(catalog.len(), 2);
    assert!(catalog.records().all(|(_, r)| r.is_dir()));
}

#[test]
fn test_ten_thousand_files() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("bulk");
    fs::create_dir(&dir).unwrap();
    for i in 0..10_000 {
        fs::write(dir.join(format!("file-{i:05}")), "").unwrap();
    }

    let mut catalog = Catalog::new(2).unwrap();
    traverse(&dir, &mut catalog, OpenFlags::NO_FOLLOW, &CancellationToken::new()).unwrap();

    let visited = catalog.for_each(|_, record| {
        assert!(record.is_file());
        ControlFlow::Continue(())
    });
    assert_eq!(visited, 10_000);
    assert!(hoard_core::prime::is_prime(catalog.capacity()));
    assert!(catalog.table().load() <= catalog.table().load_factor() * 2.0);
}

#[test]
fn test_deep_tree_does_not_recurse() {
    let temp = TempDir::new().unwrap();
    let mut deepest = temp.path().to_path_buf();
    for _ in 0..300 {
        deepest.push("d");
    }
    fs::create_dir_all(&deepest).unwrap();
    fs::write(deepest.join("leaf"), "x").unwrap();

    let (catalog, outcome) = index(temp.path(), OpenFlags::NO_FOLLOW);

    assert_eq!(catalog.len(), 301);
    assert_eq!(outcome.directories, 301);
    let leaf = catalog.records().find(|(_, r)| r.is_file()).unwrap().1;
    assert_eq!(leaf.path, deepest.join("leaf"));
}

#[test]
fn test_cancelled_token_keeps_catalog() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("file"), "x").unwrap();

    let mut catalog = Catalog::new(11).unwrap();
    let earlier = FileKey::new(u64::MAX, 1);
    catalog
        .insert(earlier, FileRecord::new("earlier", libc::S_IFREG as u32 | 0o644, 1))
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let status = traverse(temp.path(), &mut catalog, OpenFlags::NO_FOLLOW, &cancel).unwrap_err();

    assert_eq!(status.severity(), Severity::Cancelled);
    assert_eq!(status.code(), StatusCode::Cancelled);
    assert_eq!(catalog.len(), 1);
    assert!(catalog.contains(&earlier));
}

#[test]
fn test_missing_root_is_an_error() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("missing");

    let mut catalog = Catalog::new(11).unwrap();
    let status = traverse(&root, &mut catalog, OpenFlags::NO_FOLLOW, &CancellationToken::new()).unwrap_err();

    assert_eq!(status.severity(), Severity::Error);
    assert_eq!(status.code(), StatusCode::OpenDirectory);
    assert_eq!(status.errno(), Some(libc::ENOENT));
    assert_eq!(status.path(), Some(root.as_path()));
}

#[test]
fn test_stat_failure_aborts_and_keeps_catalog() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("first")).unwrap();
    fs::write(temp.path().join("first/kept"), "x").unwrap();
    fs::create_dir_all(temp.path().join("second/a")).unwrap();
    symlink("missing-target", temp.path().join("second/a/dangling")).unwrap();

    let mut catalog = Catalog::new(101).unwrap();
    traverse(temp.path().join("first"), &mut catalog, OpenFlags::empty(), &CancellationToken::new()).unwrap();

    // Following the dangling link makes its stat fail with ENOENT.
    let mut outcome = TraverseOutcome::default();
    let status = traverse_into(
        temp.path().join("second"),
        &mut catalog,
        OpenFlags::empty(),
        &CancellationToken::new(),
        &mut outcome,
    )
    .unwrap_err();

    assert_eq!(status.code(), StatusCode::ReadMetadata);
    assert_eq!(status.severity(), Severity::Error);
    assert_eq!(status.errno(), Some(libc::ENOENT));
    assert_eq!(status.path(), Some(Path::new("dangling")));

    assert_eq!(
        relative_paths(&catalog, temp.path()),
        [PathBuf::from("first/kept"), PathBuf::from("second/a")]
    );
    assert_eq!(outcome.cataloged, 1);
    assert_eq!(outcome.directories, 2);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn test_repeated_index_accumulates() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("first"), "x").unwrap();

    let traverser = Traverser::new(IndexConfig::new(temp.path()));
    let (mut catalog, outcome) = traverser.index().unwrap();
    assert_eq!(outcome.cataloged, 1);

    fs::write(temp.path().join("second"), "x").unwrap();
    let outcome = traverser.index_into(&mut catalog).unwrap();

    assert_eq!(outcome.cataloged, 1);
    assert_eq!(outcome.aliases_skipped, 1);
    assert_eq!(catalog.len(), 2);
}

#[test]
fn test_traverser_cancel_token() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("sub")).unwrap();

    let traverser = Traverser::new(IndexConfig::new(temp.path()));
    traverser.cancel_token().cancel();

    let status = traverser.index().unwrap_err();
    assert!(status.is_cancelled());
}
