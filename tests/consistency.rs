//! Commit consistency: manifest commits survive a store whose directory
//! queries never catch up; forced commits do not.

mod strata_common;

use strata::error::{CommitError, Error};
use strata::store::memory::ConsistencyPolicy;
use strata_common::{StackOptions, TestStack, p};

fn eventual_stack() -> TestStack {
    TestStack::build(StackOptions {
        microversions: false,
        policy: ConsistencyPolicy::Eventual,
        ..StackOptions::default()
    })
}

#[test]
fn manifest_commit_succeeds_with_zero_query_consistency() {
    let stack = eventual_stack();

    let cs = stack.vcs.new_staging_changeset(None).unwrap();
    stack.write(&cs, "/a", "1");

    // Directory queries see nothing, but the manifest multi-get does.
    let final_cs = stack.commit_manifest(cs, &["/a"]);
    assert_eq!(stack.content("/a"), "1");
    assert!(stack.vcs.last_submitted_changeset().unwrap().num() == final_cs.num());
}

#[test]
fn forced_commit_misses_unindexed_writes() {
    let stack = eventual_stack();

    let cs = stack.vcs.new_staging_changeset(None).unwrap();
    stack.write(&cs, "/a", "1");

    // The enumeration is empty: the write has not been indexed yet.
    let err = stack.vcs.commit(&cs, true).unwrap_err();
    assert!(
        matches!(err, Error::Commit(CommitError::EmptyChangeset { .. })),
        "expected empty-changeset error, got {err:?}"
    );

    // Once the store's queries catch up, the forced commit goes through.
    stack.store.sync_queries();
    let final_cs = stack.commit_force(&cs);
    assert_eq!(stack.content("/a"), "1");
    assert!(final_cs.num() > cs.num());
}

#[test]
fn microversion_commits_are_strongly_consistent() {
    let stack = TestStack::build(StackOptions {
        microversions: true,
        policy: ConsistencyPolicy::Eventual,
        ..StackOptions::default()
    });

    stack
        .files
        .write(
            {
                let mut op = strata::hooks::WriteOp::new(p("/foo"));
                op.content = Some("foo".into());
                op
            },
            None,
        )
        .unwrap();

    // The deferred commit uses a sealed manifest, so it must succeed even
    // though directory queries never catch up.
    assert_eq!(stack.engine().drain_pending().unwrap(), 1);
    let versions = stack.vcs.file_versions(&p("/foo"), None);
    assert_eq!(versions.len(), 1);
    let file = stack.get_in("/foo", versions[0].changeset()).unwrap();
    assert_eq!(file.content(), "foo");
}
