//! End-to-end tests for the hosting service layer

use std::sync::Arc;

use arbor_core::TreeEdit;
use arbor_history::DEFAULT_BRANCH;
use arbor_service::{
    ActivityLog, CodeHost, FixedUser, MemoryLog, NodeView, ServiceError,
};
use ulid::Ulid;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn open_host(dir: &tempfile::TempDir, username: &str) -> (CodeHost, Arc<MemoryLog>) {
    init_tracing();
    let log = Arc::new(MemoryLog::new());
    let host = CodeHost::open(
        dir.path(),
        Arc::new(FixedUser::new(username)),
        log.clone(),
    )
    .unwrap();
    host.register_profile(username).unwrap();
    (host, log)
}

#[test]
fn two_commit_scenario_with_historical_read() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _log) = open_host(&dir, "alice");
    host.create_project("demo").unwrap().unwrap();

    // First commit: a single file at the root
    let c1 = host
        .commit(
            "demo",
            DEFAULT_BRANCH,
            "add a.txt",
            &[TreeEdit::put("a.txt", "hello")],
        )
        .unwrap();
    assert_eq!(c1.parent, None);
    assert_eq!(c1.author, "alice");

    let view = host.tree("demo", DEFAULT_BRANCH).unwrap();
    assert_eq!(view.len(), 1);
    assert_eq!(view.file("a.txt"), Some(&b"hello"[..]));

    // Second commit: a nested file; the first file is untouched
    let c2 = host
        .commit(
            "demo",
            DEFAULT_BRANCH,
            "add dir/b.txt",
            &[TreeEdit::put("dir/b.txt", "world")],
        )
        .unwrap();
    assert_eq!(c2.parent, Some(c1.id));

    let view = host.tree("demo", DEFAULT_BRANCH).unwrap();
    assert_eq!(view.len(), 2);
    assert_eq!(view.file("a.txt"), Some(&b"hello"[..]));
    assert_eq!(view.file("dir/b.txt"), Some(&b"world"[..]));
    assert!(matches!(view.get("dir"), Some(NodeView::Dir(_))));

    // Historical read at C1 still shows the one-entry tree
    let old = host.tree_at(c1.id).unwrap();
    assert_eq!(old.len(), 1);
    assert_eq!(old.file("a.txt"), Some(&b"hello"[..]));
    assert_eq!(old.file("dir/b.txt"), None);
}

#[test]
fn noop_commit_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _log) = open_host(&dir, "alice");
    host.create_project("demo").unwrap().unwrap();

    let c1 = host
        .commit(
            "demo",
            DEFAULT_BRANCH,
            "add",
            &[TreeEdit::put("a.txt", "hello")],
        )
        .unwrap();

    // Re-state the exact current content: no new commit, head unchanged
    let again = host
        .commit(
            "demo",
            DEFAULT_BRANCH,
            "would be empty",
            &[TreeEdit::put("a.txt", "hello")],
        )
        .unwrap();
    assert_eq!(again.id, c1.id);

    // Deleting a path that never existed is also a no-op
    let again = host
        .commit(
            "demo",
            DEFAULT_BRANCH,
            "delete ghost",
            &[TreeEdit::delete("ghost.txt")],
        )
        .unwrap();
    assert_eq!(again.id, c1.id);

    let log = host.log("demo", DEFAULT_BRANCH).unwrap();
    assert_eq!(log.len(), 1);
}

#[test]
fn empty_branch_resolves_to_empty_view() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _log) = open_host(&dir, "alice");
    host.create_project("demo").unwrap().unwrap();

    let view = host.tree("demo", DEFAULT_BRANCH).unwrap();
    assert!(view.is_empty());
    assert!(host.log("demo", DEFAULT_BRANCH).unwrap().is_empty());
}

#[test]
fn missing_project_branch_and_commit_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _log) = open_host(&dir, "alice");
    host.create_project("demo").unwrap().unwrap();

    assert!(matches!(
        host.tree("ghost", DEFAULT_BRANCH),
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        host.tree("demo", "no-such-branch"),
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        host.tree_of("nobody", "demo", DEFAULT_BRANCH),
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        host.tree_at(Ulid::new()),
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        host.commit("ghost", DEFAULT_BRANCH, "m", &[TreeEdit::put("a", "b")]),
        Err(ServiceError::NotFound(_))
    ));
}

#[test]
fn concurrent_disjoint_commits_all_land() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _log) = open_host(&dir, "alice");
    host.create_project("demo").unwrap().unwrap();

    let host = Arc::new(host);
    std::thread::scope(|scope| {
        for i in 0..4 {
            let host = Arc::clone(&host);
            scope.spawn(move || {
                host.commit(
                    "demo",
                    DEFAULT_BRANCH,
                    &format!("add file {i}"),
                    &[TreeEdit::put(format!("file-{i}.txt"), format!("content {i}"))],
                )
                .unwrap();
            });
        }
    });

    // The final tree reflects the union of every edit; no commit was lost
    let view = host.tree("demo", DEFAULT_BRANCH).unwrap();
    assert_eq!(view.len(), 4);
    for i in 0..4 {
        let expected = format!("content {i}");
        assert_eq!(
            view.file(&format!("file-{i}.txt")),
            Some(expected.as_bytes())
        );
    }

    // The chain is a clean line: four commits, one root, no cycles
    let log = host.log("demo", DEFAULT_BRANCH).unwrap();
    assert_eq!(log.len(), 4);
    assert_eq!(log.last().unwrap().parent, None);
    for pair in log.windows(2) {
        assert_eq!(pair[0].parent, Some(pair[1].id));
    }
}

#[test]
fn delete_and_prune_through_the_service() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _log) = open_host(&dir, "alice");
    host.create_project("demo").unwrap().unwrap();

    host.commit(
        "demo",
        DEFAULT_BRANCH,
        "seed",
        &[
            TreeEdit::put("keep.txt", "keep"),
            TreeEdit::put("dir/only.txt", "x"),
        ],
    )
    .unwrap();

    host.commit(
        "demo",
        DEFAULT_BRANCH,
        "remove nested file",
        &[TreeEdit::delete("dir/only.txt")],
    )
    .unwrap();

    let view = host.tree("demo", DEFAULT_BRANCH).unwrap();
    assert_eq!(view.len(), 1);
    assert!(view.get("dir").is_none());
    assert_eq!(view.file("keep.txt"), Some(&b"keep"[..]));
}

#[test]
fn collaborator_commits_into_owners_project() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(MemoryLog::new());

    // Two hosts over the same state, differing only in who is logged in
    let alice_host = CodeHost::open(
        dir.path(),
        Arc::new(FixedUser::new("alice")),
        log.clone(),
    )
    .unwrap();
    alice_host.register_profile("alice").unwrap();
    let bob = alice_host.register_profile("bob").unwrap();
    let project = alice_host.create_project("demo").unwrap().unwrap();
    alice_host.add_collaborator("demo", "bob").unwrap().unwrap();

    // Bob's session shares alice's directory but resolves bob as current.
    // Commit through the code service the way the bob-facing facade would.
    let commit = alice_host
        .code()
        .commit(
            &project.id,
            DEFAULT_BRANCH,
            &bob.username,
            "bob's change",
            &[TreeEdit::put("from-bob.txt", "hi")],
        )
        .unwrap();
    assert_eq!(commit.author, "bob");

    let view = alice_host.tree("demo", DEFAULT_BRANCH).unwrap();
    assert_eq!(view.file("from-bob.txt"), Some(&b"hi"[..]));

    assert_eq!(
        alice_host.directory().projects_by_collaborator(&bob.id).len(),
        1
    );
}

#[test]
fn activity_log_observes_mutations_and_never_blocks_them() {
    let dir = tempfile::tempdir().unwrap();
    let (host, log) = open_host(&dir, "alice");

    host.create_project("demo").unwrap().unwrap();
    host.commit(
        "demo",
        DEFAULT_BRANCH,
        "first",
        &[TreeEdit::put("a.txt", "hello")],
    )
    .unwrap();

    let descriptions: Vec<_> = log
        .entries()
        .into_iter()
        .map(|entry| entry.description)
        .collect();
    assert!(descriptions.contains(&"Has created project".to_string()));
    assert!(descriptions.contains(&"Has committed to branch master".to_string()));

    // A sink that panics internally must not reach the caller: the
    // contract is that sinks swallow their own failures, so a sink that
    // drops entries on the floor still leaves commits intact
    struct DroppingLog;
    impl ActivityLog for DroppingLog {
        fn record(&self, _description: &str, _actor: &str, _subject: &str) {
            // Simulates a sink whose downstream is unavailable
        }
    }

    let dir2 = tempfile::tempdir().unwrap();
    let silent = CodeHost::open(
        dir2.path(),
        Arc::new(FixedUser::new("alice")),
        Arc::new(DroppingLog),
    )
    .unwrap();
    silent.register_profile("alice").unwrap();
    silent.create_project("demo").unwrap().unwrap();
    let commit = silent
        .commit(
            "demo",
            DEFAULT_BRANCH,
            "still lands",
            &[TreeEdit::put("a.txt", "hello")],
        )
        .unwrap();
    assert_eq!(commit.message, "still lands");
}

#[test]
fn branch_creation_and_per_branch_heads() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _log) = open_host(&dir, "alice");
    host.create_project("demo").unwrap().unwrap();

    host.commit(
        "demo",
        DEFAULT_BRANCH,
        "on master",
        &[TreeEdit::put("a.txt", "master")],
    )
    .unwrap();

    assert!(host.create_branch("demo", "feature").unwrap());
    assert!(!host.create_branch("demo", "feature").unwrap());

    // The new branch starts empty; branches do not share heads
    assert!(host.tree("demo", "feature").unwrap().is_empty());

    host.commit(
        "demo",
        "feature",
        "on feature",
        &[TreeEdit::put("b.txt", "feature")],
    )
    .unwrap();

    let master = host.tree("demo", DEFAULT_BRANCH).unwrap();
    assert!(master.file("b.txt").is_none());
    let feature = host.tree("demo", "feature").unwrap();
    assert!(feature.file("a.txt").is_none());
    assert_eq!(feature.file("b.txt"), Some(&b"feature"[..]));
}

#[test]
fn project_lifecycle_cleans_up_branches() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _log) = open_host(&dir, "alice");
    host.create_project("demo").unwrap().unwrap();
    // Duplicate project name is rejected, not an error
    assert!(host.create_project("demo").unwrap().is_none());

    host.commit(
        "demo",
        DEFAULT_BRANCH,
        "seed",
        &[TreeEdit::put("a.txt", "x")],
    )
    .unwrap();

    host.delete_project("demo").unwrap().unwrap();
    assert!(matches!(
        host.tree("demo", DEFAULT_BRANCH),
        Err(ServiceError::NotFound(_))
    ));

    // Recreating the project starts from a fresh default branch
    host.create_project("demo").unwrap().unwrap();
    assert!(host.tree("demo", DEFAULT_BRANCH).unwrap().is_empty());
}
