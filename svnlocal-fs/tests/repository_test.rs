//! Repository persistence tests

use svnlocal_fs::{ChangeAction, Error, NodeKind, ReposConfig, Repository, revprops};
use tempfile::TempDir;

fn commit_file(repos: &Repository, path: &str, data: &[u8], log: &str) -> u64 {
    let fs = repos.fs();
    let youngest = fs.youngest().unwrap();
    let mut txn = fs.begin_txn(youngest, Some("alice"), log).unwrap();
    if txn.check_path(path).unwrap() == NodeKind::None {
        txn.make_file(path).unwrap();
    }
    txn.set_contents(path, data.to_vec()).unwrap();
    txn.commit().unwrap().revision
}

#[test]
fn test_commits_persist_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("repos");
    let repos = Repository::create(&path).unwrap();
    assert_eq!(commit_file(&repos, "/a.txt", b"one\n", "r1"), 1);
    assert_eq!(commit_file(&repos, "/a.txt", b"two\n", "r2"), 2);
    drop(repos);

    let repos = Repository::open(&path).unwrap();
    let fs = repos.fs();
    assert_eq!(fs.youngest().unwrap(), 2);
    assert_eq!(fs.revision_root(1).unwrap().file_contents("/a.txt").unwrap(), b"one\n");
    assert_eq!(fs.revision_root(2).unwrap().file_contents("/a.txt").unwrap(), b"two\n");
    assert_eq!(fs.revision_prop(2, revprops::LOG).unwrap().as_deref(), Some("r2"));
    assert_eq!(
        fs.revision_record(2).unwrap().changes["/a.txt"].action,
        ChangeAction::Modified
    );
}

#[test]
fn test_uncompressed_repository() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("repos");
    Repository::create(&path).unwrap();
    ReposConfig {
        compression_level: 0,
        ..ReposConfig::default()
    }
    .save(&path)
    .unwrap();

    let repos = Repository::open(&path).unwrap();
    assert_eq!(repos.config().compression_level, 0);
    commit_file(&repos, "/big.bin", &vec![7u8; 300_000], "big");
    let root = repos.fs().revision_root(1).unwrap();
    assert_eq!(root.file_size("/big.bin").unwrap(), 300_000);
}

#[test]
fn test_two_handles_commit_in_turn() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("repos");
    let first = Repository::create(&path).unwrap();
    let second = Repository::open(&path).unwrap();

    let mut a = first.fs().begin_txn(0, Some("alice"), "a").unwrap();
    let mut b = second.fs().begin_txn(0, Some("bob"), "b").unwrap();
    a.make_dir("/a").unwrap();
    b.make_dir("/b").unwrap();

    assert_eq!(a.commit().unwrap().revision, 1);
    assert_eq!(b.commit().unwrap().revision, 2);

    let root = first.fs().revision_root(2).unwrap();
    assert_eq!(root.check_path("/a").unwrap(), NodeKind::Dir);
    assert_eq!(root.check_path("/b").unwrap(), NodeKind::Dir);
}

#[cfg(unix)]
fn install_hook(repos: &Repository, name: &str, script: &str) {
    use std::os::unix::fs::PermissionsExt;
    let hook = repos.path().join("hooks").join(name);
    std::fs::write(&hook, script).unwrap();
    std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[test]
fn test_rejected_commit_publishes_nothing() {
    let tmp = TempDir::new().unwrap();
    let repos = Repository::create(&tmp.path().join("repos")).unwrap();
    install_hook(&repos, "pre-commit", "#!/bin/sh\necho 'no thanks' >&2\nexit 1\n");

    let mut txn = repos.fs().begin_txn(0, Some("alice"), "x").unwrap();
    txn.make_dir("/x").unwrap();
    match txn.commit() {
        Err(Error::HookFailed { message, .. }) => assert_eq!(message, "no thanks"),
        other => panic!("expected hook failure, got {:?}", other),
    }
    assert_eq!(repos.fs().youngest().unwrap(), 0);
}

#[cfg(unix)]
#[test]
fn test_failing_post_commit_keeps_revision() {
    let tmp = TempDir::new().unwrap();
    let repos = Repository::create(&tmp.path().join("repos")).unwrap();
    install_hook(&repos, "post-commit", "#!/bin/sh\nexit 3\n");

    assert_eq!(commit_file(&repos, "/a.txt", b"x", "x"), 1);
    assert_eq!(repos.fs().youngest().unwrap(), 1);
}
