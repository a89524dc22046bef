//! Report and checkout drive tests

use svnlocal_fs::{Error, Filesystem, NodeKind, Repository, Revnum};
use svnlocal_repos::{checkout, EditOp, RecordingEditor, Report, ReportParams};
use tempfile::TempDir;

/// r1: /a.txt = "one\n", /dir/b.txt = "bee\n"; r2: /a.txt = "two\n"
fn seeded() -> Filesystem {
    let fs = Filesystem::in_memory().unwrap();
    let mut txn = fs.begin_txn(0, Some("alice"), "r1").unwrap();
    txn.make_file("/a.txt").unwrap();
    txn.set_contents("/a.txt", b"one\n".to_vec()).unwrap();
    txn.make_dir("/dir").unwrap();
    txn.make_file("/dir/b.txt").unwrap();
    txn.set_contents("/dir/b.txt", b"bee\n".to_vec()).unwrap();
    txn.commit().unwrap();

    let mut txn = fs.begin_txn(1, Some("bob"), "r2").unwrap();
    txn.set_contents("/a.txt", b"two\n".to_vec()).unwrap();
    txn.commit().unwrap();
    fs
}

fn params(revision: Option<Revnum>) -> ReportParams {
    ReportParams {
        fs_base: "/".to_string(),
        target: None,
        tgt_path: "/".to_string(),
        revision,
        text_deltas: true,
        recurse: true,
    }
}

fn finish(fs: &Filesystem, report: Report) -> (Revnum, Vec<EditOp>) {
    let mut editor = RecordingEditor::new();
    let revision = report.finish(fs, &mut editor).unwrap();
    (revision, editor.ops)
}

#[test]
fn test_checkout_sends_whole_tree_in_order() {
    let fs = seeded();
    let mut editor = RecordingEditor::new();
    checkout(&fs, "/", 1, true, &mut editor).unwrap();

    let shape: Vec<(&str, Option<&str>)> = editor
        .ops
        .iter()
        .map(|op| {
            let name = match op {
                EditOp::SetTargetRevision(_) => "set_target_revision",
                EditOp::OpenRoot { .. } => "open_root",
                EditOp::AddFile { .. } => "add_file",
                EditOp::AddDirectory { .. } => "add_directory",
                EditOp::ApplyTextDelta { .. } => "apply_text_delta",
                EditOp::CloseFile { .. } => "close_file",
                EditOp::CloseDirectory { .. } => "close_directory",
                EditOp::CloseEdit => "close_edit",
                other => panic!("unexpected call {other:?}"),
            };
            (name, op.path())
        })
        .collect();
    assert_eq!(
        shape,
        vec![
            ("set_target_revision", None),
            ("open_root", Some("")),
            ("add_file", Some("a.txt")),
            ("apply_text_delta", Some("a.txt")),
            ("close_file", Some("a.txt")),
            ("add_directory", Some("dir")),
            ("add_file", Some("dir/b.txt")),
            ("apply_text_delta", Some("dir/b.txt")),
            ("close_file", Some("dir/b.txt")),
            ("close_directory", Some("dir")),
            ("close_directory", Some("")),
            ("close_edit", None),
        ]
    );

    let text = editor.ops.iter().find_map(|op| match op {
        EditOp::ApplyTextDelta { path, delta, .. } if path == "a.txt" => Some(delta.apply(b"").unwrap()),
        _ => None,
    });
    assert_eq!(text.as_deref(), Some(&b"one\n"[..]));
}

#[test]
fn test_update_sends_one_text_delta() {
    let fs = seeded();
    let mut report = Report::new(params(None));
    report.set_path("", 1);
    let (revision, ops) = finish(&fs, report);
    assert_eq!(revision, 2);

    let md5 = fs.revision_root(2).unwrap().file_md5("/a.txt").unwrap();
    let one_md5 = fs.revision_root(1).unwrap().file_md5("/a.txt").unwrap();
    assert_eq!(ops.len(), 7);
    assert_eq!(ops[0], EditOp::SetTargetRevision(2));
    assert_eq!(ops[1], EditOp::OpenRoot { base_revision: Some(1) });
    assert_eq!(
        ops[2],
        EditOp::OpenFile {
            path: "a.txt".into(),
            base_revision: Some(1)
        }
    );
    match &ops[3] {
        EditOp::ApplyTextDelta {
            path,
            base_checksum,
            delta,
        } => {
            assert_eq!(path, "a.txt");
            assert_eq!(base_checksum.as_deref(), Some(one_md5.as_str()));
            assert_eq!(delta.apply(b"one\n").unwrap(), b"two\n");
        }
        other => panic!("expected a text delta, got {other:?}"),
    }
    assert_eq!(
        ops[4],
        EditOp::CloseFile {
            path: "a.txt".into(),
            text_checksum: Some(md5)
        }
    );
    assert_eq!(ops[5], EditOp::CloseDirectory { path: String::new() });
    assert_eq!(ops[6], EditOp::CloseEdit);

    let deltas = ops
        .iter()
        .filter(|op| matches!(op, EditOp::ApplyTextDelta { .. }))
        .count();
    assert_eq!(deltas, 1);
}

#[test]
fn test_update_at_same_revision_is_empty() {
    let fs = seeded();
    for rev in 0..=2 {
        let mut report = Report::new(params(Some(rev)));
        report.set_path("", rev);
        let (revision, ops) = finish(&fs, report);
        assert_eq!(revision, rev);
        assert_eq!(
            ops,
            vec![
                EditOp::SetTargetRevision(rev),
                EditOp::OpenRoot { base_revision: Some(rev) },
                EditOp::CloseDirectory { path: String::new() },
                EditOp::CloseEdit,
            ]
        );
    }
}

#[test]
fn test_deleted_path_is_recreated() {
    let fs = seeded();
    let mut report = Report::new(params(None));
    report.set_path("", 2);
    report.delete_path("dir");
    let (_, ops) = finish(&fs, report);

    let modifications: Vec<&EditOp> = ops.iter().filter(|op| op.is_modification()).collect();
    assert!(matches!(modifications[0], EditOp::AddDirectory { path, .. } if path == "dir"));
    assert!(matches!(modifications[1], EditOp::AddFile { path, .. } if path == "dir/b.txt"));
    assert_eq!(modifications.len(), 3);
    assert!(!ops.iter().any(|op| op.path() == Some("a.txt")));
}

#[test]
fn test_mixed_revision_claims() {
    let fs = seeded();
    let mut report = Report::new(params(None));
    report.set_path("", 2);
    report.set_path("a.txt", 1);
    let (_, ops) = finish(&fs, report);

    assert!(ops.contains(&EditOp::OpenFile {
        path: "a.txt".into(),
        base_revision: Some(1)
    }));
    assert_eq!(ops.iter().filter(|op| op.is_modification()).count(), 1);
}

#[test]
fn test_later_claim_replaces_earlier() {
    let fs = seeded();
    let mut report = Report::new(params(None));
    report.set_path("", 1);
    report.set_path("", 2);
    let (_, ops) = finish(&fs, report);
    assert_eq!(ops.iter().filter(|op| op.is_modification()).count(), 0);
}

#[test]
fn test_report_narrowed_to_one_entry() {
    let fs = seeded();
    let mut report = Report::new(ReportParams {
        target: Some("a.txt".to_string()),
        tgt_path: "/a.txt".to_string(),
        ..params(None)
    });
    report.set_path("", 1);
    let (_, ops) = finish(&fs, report);

    assert!(ops.iter().all(|op| match op.path() {
        Some(p) => p.is_empty() || p == "a.txt",
        None => true,
    }));
    assert_eq!(ops.iter().filter(|op| op.is_modification()).count(), 1);
}

#[test]
fn test_target_below_an_entry_sends_nothing() {
    let fs = seeded();
    let mut report = Report::new(ReportParams {
        target: Some("dir/b.txt".to_string()),
        tgt_path: "/dir/b.txt".to_string(),
        ..params(None)
    });
    report.set_path("", 1);
    let mut editor = RecordingEditor::new();
    let result = report.finish(&fs, &mut editor);
    assert!(matches!(result, Err(Error::InvalidTarget(t)) if t == "dir/b.txt"));
    assert!(editor.ops.is_empty());
}

#[test]
fn test_non_recursive_checkout_skips_directories() {
    let fs = seeded();
    let report = Report::new(ReportParams {
        recurse: false,
        ..params(None)
    });
    let (_, ops) = finish(&fs, report);
    assert!(ops.iter().any(|op| matches!(op, EditOp::AddFile { path, .. } if path == "a.txt")));
    assert!(!ops.iter().any(|op| matches!(op, EditOp::AddDirectory { .. })));
    assert!(!ops.iter().any(|op| op.path() == Some("dir/b.txt")));
}

#[test]
fn test_non_recursive_update_retires_kind_changes() {
    let fs = seeded();
    let mut txn = fs.begin_txn(2, Some("carol"), "r3").unwrap();
    txn.delete("/a.txt").unwrap();
    txn.make_dir("/a.txt").unwrap();
    txn.delete("/dir").unwrap();
    txn.make_file("/dir").unwrap();
    txn.set_contents("/dir", b"flat\n".to_vec()).unwrap();
    txn.commit().unwrap();

    let mut report = Report::new(ReportParams {
        recurse: false,
        ..params(None)
    });
    report.set_path("", 2);
    let (revision, ops) = finish(&fs, report);
    assert_eq!(revision, 3);

    let modifications: Vec<_> = ops
        .iter()
        .filter(|op| op.is_modification())
        .map(|op| match op {
            EditOp::DeleteEntry { path, .. } => format!("D {path}"),
            EditOp::AddFile { path, .. } => format!("A {path}"),
            EditOp::AddDirectory { path, .. } => format!("A {path}/"),
            EditOp::ApplyTextDelta { path, .. } => format!("T {path}"),
            other => format!("{other:?}"),
        })
        .collect();
    assert_eq!(modifications, vec!["D a.txt", "D dir", "A dir", "T dir"]);
}

#[test]
fn test_future_claim_is_rejected() {
    let fs = seeded();
    let mut report = Report::new(params(None));
    report.set_path("", 99);
    let mut editor = RecordingEditor::new();
    let result = report.finish(&fs, &mut editor);
    assert!(matches!(result, Err(Error::NoSuchRevision(99))));
    assert!(editor.ops.is_empty());
}

#[test]
fn test_out_of_range_target_resolves_to_youngest() {
    let fs = seeded();
    let mut report = Report::new(params(Some(50)));
    report.set_path("", 2);
    let (revision, _) = finish(&fs, report);
    assert_eq!(revision, 2);
}

#[test]
fn test_status_sends_empty_deltas() {
    let fs = seeded();
    let mut report = Report::new(ReportParams {
        text_deltas: false,
        ..params(None)
    });
    report.set_path("", 1);
    let (_, ops) = finish(&fs, report);
    let deltas: Vec<_> = ops
        .iter()
        .filter_map(|op| match op {
            EditOp::ApplyTextDelta { path, delta, .. } => Some((path.as_str(), delta.is_empty())),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, vec![("a.txt", true)]);
}

#[test]
fn test_kind_change_is_delete_then_add() {
    let fs = seeded();
    let mut txn = fs.begin_txn(2, Some("carol"), "r3").unwrap();
    txn.delete("/a.txt").unwrap();
    txn.make_dir("/a.txt").unwrap();
    txn.commit().unwrap();

    let mut report = Report::new(params(None));
    report.set_path("", 2);
    let (_, ops) = finish(&fs, report);
    let modifications: Vec<&EditOp> = ops.iter().filter(|op| op.is_modification()).collect();
    assert_eq!(
        modifications,
        vec![
            &EditOp::DeleteEntry {
                path: "a.txt".into(),
                revision: Some(2)
            },
            &EditOp::AddDirectory {
                path: "a.txt".into(),
                copyfrom: None
            },
        ]
    );
}

#[test]
fn test_switch_between_subtrees() {
    let tmp = TempDir::new().unwrap();
    let repos = Repository::create(&tmp.path().join("repos")).unwrap();
    let fs = repos.fs();

    let mut txn = fs.begin_txn(0, Some("alice"), "layout").unwrap();
    txn.make_dir("/trunk").unwrap();
    txn.make_file("/trunk/f").unwrap();
    txn.set_contents("/trunk/f", b"trunk\n".to_vec()).unwrap();
    txn.commit().unwrap();

    let mut txn = fs.begin_txn(1, Some("alice"), "branch").unwrap();
    txn.make_dir("/branches").unwrap();
    txn.copy(1, "/trunk", "/branches/b1").unwrap();
    txn.set_contents("/branches/b1/f", b"branch\n".to_vec()).unwrap();
    txn.make_file("/branches/b1/extra").unwrap();
    txn.commit().unwrap();
    assert_eq!(fs.revision_root(2).unwrap().check_path("/branches/b1/extra").unwrap(), NodeKind::File);

    let mut report = Report::new(ReportParams {
        fs_base: "/trunk".to_string(),
        target: None,
        tgt_path: "/branches/b1".to_string(),
        revision: None,
        text_deltas: true,
        recurse: true,
    });
    report.set_path("", 1);
    let (_, ops) = finish(fs, report);

    let touched: Vec<(&str, bool)> = ops
        .iter()
        .filter(|op| op.is_modification())
        .filter_map(|op| op.path().map(|p| (p, matches!(op, EditOp::AddFile { .. }))))
        .collect();
    assert_eq!(touched, vec![("extra", true), ("extra", false), ("f", false)]);
}
