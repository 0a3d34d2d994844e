//! End-to-end changeset lifecycle: staging writes, atomic commits,
//! pointers, history, and pairwise diff.

mod strata_common;

use strata::error::{ChangesetError, CommitError, Error};
use strata::model::diff::DiffOp;
use strata::model::types::{ChangesetStatus, FileStatus};
use strata_common::{TestStack, p};

#[test]
fn single_file_round_trip() {
    let stack = TestStack::versions_only();

    let cs = stack.vcs.new_staging_changeset(None).unwrap();
    stack.write(&cs, "/a", "hello");

    // Not visible before commit.
    assert!(!stack.exists("/a"));
    assert!(stack.get("/a").is_none());

    stack.commit_manifest(cs, &["/a"]);

    assert!(stack.exists("/a"));
    assert_eq!(stack.content("/a"), "hello");

    let versions = stack.vcs.file_versions(&p("/a"), None);
    assert_eq!(versions.len(), 1);
    assert_eq!(
        versions[0].status(stack.vcs.datastore()).unwrap(),
        FileStatus::Created
    );
}

#[test]
fn multi_file_commit_is_atomic() {
    let stack = TestStack::versions_only();

    let cs = stack.vcs.new_staging_changeset(None).unwrap();
    let staging_num = cs.num();
    stack.write(&cs, "/a", "1");
    stack.write(&cs, "/b", "2");

    assert!(stack.vcs.datastore().pointer(&p("/a")).is_none());
    assert!(stack.vcs.datastore().pointer(&p("/b")).is_none());

    stack.commit_manifest(cs, &["/a", "/b"]);

    // Both pointers reference the staging number: staged blobs are the
    // permanent archive.
    let pointer_a = stack.vcs.datastore().pointer(&p("/a")).unwrap();
    let pointer_b = stack.vcs.datastore().pointer(&p("/b")).unwrap();
    assert_eq!(pointer_a.changeset_num, staging_num);
    assert_eq!(pointer_b.changeset_num, staging_num);
    assert_eq!(stack.content("/a"), "1");
    assert_eq!(stack.content("/b"), "2");
}

#[test]
fn commit_links_staging_and_final_symmetrically() {
    let stack = TestStack::versions_only();
    let ds = stack.vcs.datastore();

    let cs = stack.vcs.new_staging_changeset(Some("author".into())).unwrap();
    let staging_num = cs.num();
    stack.write(&cs, "/a", "x");
    let final_cs = stack.commit_manifest(cs, &["/a"]);

    // Reload the staging side from storage.
    let staging = stack.vcs.changesets().load(staging_num).unwrap();
    assert_eq!(staging.status(ds).unwrap(), ChangesetStatus::DeletedBySubmit);
    assert_eq!(final_cs.status(ds).unwrap(), ChangesetStatus::Submitted);
    assert_eq!(final_cs.created_by(ds).unwrap().as_deref(), Some("author"));

    let linked = staging.linked_changeset(ds).unwrap().unwrap();
    assert_eq!(linked.num(), final_cs.num());
    let back = final_cs.linked_changeset(ds).unwrap().unwrap();
    assert_eq!(back.num(), staging_num);

    assert_eq!(
        stack.vcs.last_submitted_changeset().unwrap().num(),
        final_cs.num()
    );
}

#[test]
fn staged_delete_removes_pointer_and_keeps_tombstone() {
    let stack = TestStack::versions_only();
    stack.commit_one("/a", "original");
    assert!(stack.exists("/a"));

    let cs = stack.vcs.new_staging_changeset(None).unwrap();
    stack.stage_delete(&cs, "/a");
    let final_cs = stack.commit_manifest(cs, &["/a"]);

    assert!(!stack.exists("/a"));
    assert!(stack.get("/a").is_none());
    assert!(stack.vcs.datastore().pointer(&p("/a")).is_none());

    let versions = stack.vcs.file_versions(&p("/a"), None);
    assert_eq!(
        versions[0].status(stack.vcs.datastore()).unwrap(),
        FileStatus::Deleted
    );

    // The tombstone is still readable through the final changeset.
    let tombstone = stack.get_in("/a", &final_cs).unwrap();
    assert_eq!(tombstone.content(), "");
    assert_eq!(tombstone.status(), Some(FileStatus::Deleted));
    assert!(stack.files.exists(&p("/a"), Some(&final_cs)).unwrap());
}

#[test]
fn branch_from_root_gives_metadata_edits_full_state() {
    let stack = TestStack::versions_only();
    stack.commit_one("/a", "old");

    let cs = stack.vcs.new_staging_changeset(None).unwrap();
    stack.write_meta(&cs, "/a", "color", "blue");
    stack.commit_manifest(cs, &["/a"]);

    let file = stack.get("/a").unwrap();
    assert_eq!(file.content(), "old", "content must branch from the root revision");
    assert_eq!(
        file.meta().get("color"),
        Some(&serde_json::Value::String("blue".into()))
    );

    let versions = stack.vcs.file_versions(&p("/a"), None);
    assert_eq!(versions.len(), 2);
    assert_eq!(
        versions[0].status(stack.vcs.datastore()).unwrap(),
        FileStatus::Edited
    );
}

#[test]
fn delete_in_changeset_is_a_revert() {
    let stack = TestStack::versions_only();
    stack.commit_one("/a", "keep me");

    let cs = stack.vcs.new_staging_changeset(None).unwrap();
    stack.write(&cs, "/a", "scratch");
    assert!(stack.get_in("/a", &cs).is_some());

    // Delete inside the changeset: only the staged copy goes away.
    stack.files.delete(vec![p("/a")], Some(&cs)).unwrap();
    assert!(stack.get_in("/a", &cs).is_none());
    assert_eq!(stack.content("/a"), "keep me");
}

#[test]
fn writes_to_committed_changesets_are_rejected() {
    let stack = TestStack::versions_only();
    let cs = stack.vcs.new_staging_changeset(None).unwrap();
    stack.write(&cs, "/a", "x");
    stack.commit_manifest(cs.clone(), &["/a"]);

    // The staging changeset is now deleted-by-submit; reload for a live view.
    let stale = stack.vcs.changesets().load(cs.num()).unwrap();
    let mut op = strata::hooks::WriteOp::new(p("/b"));
    op.content = Some("y".into());
    let err = stack.files.write(op, Some(&stale)).unwrap_err();
    assert!(
        matches!(err, Error::Changeset(ChangesetError::Status { .. })),
        "expected status error, got {err:?}"
    );
}

#[test]
fn commit_requires_files_and_new_status() {
    let stack = TestStack::versions_only();

    // Empty changeset.
    let mut empty = stack.vcs.new_staging_changeset(None).unwrap();
    empty.finalize_associated_files();
    let err = stack.vcs.commit(&empty, false).unwrap_err();
    assert!(
        matches!(err, Error::Commit(CommitError::EmptyChangeset { .. })),
        "expected empty-changeset error, got {err:?}"
    );

    // Double commit: the second attempt must fail on status.
    let cs = stack.vcs.new_staging_changeset(None).unwrap();
    stack.write(&cs, "/a", "x");
    let mut manifest_cs = cs.clone();
    manifest_cs.associate_file(p("/a"));
    manifest_cs.finalize_associated_files();
    stack.vcs.commit(&manifest_cs, false).unwrap();
    let err = stack.vcs.commit(&manifest_cs, false).unwrap_err();
    assert!(
        matches!(err, Error::Commit(CommitError::BadStatus { .. })),
        "expected bad-status error, got {err:?}"
    );
}

#[test]
fn unforced_commit_requires_a_sealed_manifest() {
    let stack = TestStack::versions_only();
    let cs = stack.vcs.new_staging_changeset(None).unwrap();
    stack.write(&cs, "/a", "x");
    let err = stack.vcs.commit(&cs, false).unwrap_err();
    assert!(
        matches!(err, Error::Commit(CommitError::ManifestNotFinalized { .. })),
        "expected manifest error, got {err:?}"
    );
}

#[test]
fn last_commit_wins_per_path() {
    let stack = TestStack::versions_only();
    stack.commit_one("/a", "first");
    let second_staging = {
        let cs = stack.vcs.new_staging_changeset(None).unwrap();
        stack.write(&cs, "/a", "second");
        let num = cs.num();
        stack.commit_manifest(cs, &["/a"]);
        num
    };

    assert_eq!(stack.content("/a"), "second");
    assert_eq!(
        stack.vcs.datastore().pointer(&p("/a")).unwrap().changeset_num,
        second_staging
    );

    let versions = stack.vcs.file_versions(&p("/a"), None);
    assert_eq!(versions.len(), 2);
    let ds = stack.vcs.datastore();
    assert!(versions[0].changeset().num() > versions[1].changeset().num());
    assert_eq!(versions[1].status(ds).unwrap(), FileStatus::Created);
    assert_eq!(versions[0].status(ds).unwrap(), FileStatus::Edited);
}

#[test]
fn list_files_requires_a_changeset() {
    let stack = TestStack::versions_only();
    let err = stack
        .files
        .list_files(&strata::model::types::FilePath::root(), true, None)
        .unwrap_err();
    assert!(
        matches!(err, Error::Changeset(ChangesetError::ListWithoutChangeset)),
        "expected list-without-changeset error, got {err:?}"
    );
}

#[test]
fn list_files_in_changeset_reports_plain_paths() {
    let stack = TestStack::versions_only();
    let cs = stack.vcs.new_staging_changeset(None).unwrap();
    stack.write(&cs, "/dir/a", "1");
    stack.write(&cs, "/dir/b", "2");
    stack.write(&cs, "/top", "3");

    let listed = stack
        .files
        .list_files(&strata::model::types::FilePath::root(), true, Some(&cs))
        .unwrap();
    let mut paths: Vec<String> = listed.iter().map(|f| f.path().to_string()).collect();
    paths.sort();
    assert_eq!(paths, ["/dir/a", "/dir/b", "/top"]);
    for file in &listed {
        assert!(file.versioned_path().is_some());
    }
}

#[test]
fn generate_diff_between_revisions() {
    let stack = TestStack::versions_only();
    stack.commit_one("/a", "line one\nline two\n");
    let cs = stack.vcs.new_staging_changeset(None).unwrap();
    stack.write(&cs, "/a", "line one\nline 2\n");
    stack.commit_manifest(cs, &["/a"]);

    let versions = stack.vcs.file_versions(&p("/a"), None);
    assert_eq!(versions.len(), 2);
    let runs = stack.vcs.generate_diff(&versions[1], &versions[0]).unwrap();

    let mut rebuilt_left = String::new();
    let mut rebuilt_right = String::new();
    for (op, text) in &runs {
        match op {
            DiffOp::Equal => {
                rebuilt_left.push_str(text);
                rebuilt_right.push_str(text);
            }
            DiffOp::Delete => rebuilt_left.push_str(text),
            DiffOp::Insert => rebuilt_right.push_str(text),
        }
    }
    assert_eq!(rebuilt_left, "line one\nline two\n");
    assert_eq!(rebuilt_right, "line one\nline 2\n");
}

#[test]
fn history_limit_caps_results() {
    let stack = TestStack::versions_only();
    for i in 0..5 {
        stack.commit_one("/a", &format!("v{i}"));
    }
    let versions = stack.vcs.file_versions(&p("/a"), Some(2));
    assert_eq!(versions.len(), 2);
    let all = stack.vcs.file_versions(&p("/a"), None);
    assert_eq!(all.len(), 5);
}
