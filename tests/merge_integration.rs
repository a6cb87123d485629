//! Integration tests for the cross-repository merge engine.

mod common;

use common::{git_stdout, MetaRepo};

use git_weld::core::errors::WeldError;
use git_weld::core::identity::Identity;
use git_weld::core::types::{Oid, SubmodulePath};
use git_weld::merge::{merge, MergeMode, MergeOptions, SubmoduleOpenPolicy};
use git_weld::sequencer::{abort_op, OpKind, SequencerStore};
use git_weld::core::paths::WeldPaths;

const SUB: &str = "libs/parser";

fn identity() -> Identity {
    Identity::new("Test User", "test@example.com")
}

fn options() -> MergeOptions {
    MergeOptions {
        mode: MergeMode::Normal,
        open_policy: SubmoduleOpenPolicy::OpenOnDemand,
        message: None,
        identity: identity(),
    }
}

fn sub_path() -> SubmodulePath {
    SubmodulePath::new(SUB).unwrap()
}

/// Record the open submodule's current HEAD as a gitlink commit on the
/// current meta branch.
fn record_sub(repo: &MetaRepo, message: &str) -> Oid {
    repo.commit_gitlink(SUB, message)
}

fn store(repo: &MetaRepo) -> SequencerStore {
    let info = repo.git().info().unwrap();
    SequencerStore::new(WeldPaths::new(info.common_dir))
}

// =============================================================================
// Trivial outcomes
// =============================================================================

#[test]
fn merging_an_ancestor_is_a_no_op() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    let old = repo.meta_head();
    repo.commit_meta_file("notes.md", "x\n", "more");

    let outcome = merge(&repo.git(), &old, &options()).unwrap();
    assert!(outcome.up_to_date);
    assert!(outcome.commit.is_none());
}

#[test]
fn descendant_target_fast_forwards() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    let git = repo.git();
    let base_branch = git.current_branch().unwrap();

    repo.git_meta(&["checkout", "-b", "feature"]);
    let tip = repo.commit_meta_file("notes.md", "x\n", "feature work");
    repo.git_meta(&["checkout", &base_branch]);

    let outcome = merge(&repo.git(), &tip, &options()).unwrap();
    assert!(outcome.fast_forward);
    assert_eq!(outcome.commit, Some(tip.clone()));
    assert_eq!(repo.meta_head(), tip);
}

#[test]
fn force_commit_merges_even_a_fast_forward() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    let git = repo.git();
    let base_branch = git.current_branch().unwrap();
    let base = repo.meta_head();

    repo.git_meta(&["checkout", "-b", "feature"]);
    let tip = repo.commit_meta_file("notes.md", "x\n", "feature work");
    repo.git_meta(&["checkout", &base_branch]);

    let mut opts = options();
    opts.mode = MergeMode::ForceCommit;
    let outcome = merge(&repo.git(), &tip, &opts).unwrap();

    let commit = outcome.commit.unwrap();
    assert!(!outcome.fast_forward);
    assert_ne!(commit, tip);
    // Both parents present.
    let git = repo.git();
    assert!(git.is_descendant_of(&commit, &base).unwrap());
    assert!(git.is_descendant_of(&commit, &tip).unwrap());
}

#[test]
fn ff_only_refuses_diverged_histories() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    let git = repo.git();
    let base_branch = git.current_branch().unwrap();

    repo.git_meta(&["checkout", "-b", "feature"]);
    let tip = repo.commit_meta_file("feature.md", "f\n", "feature work");
    repo.git_meta(&["checkout", &base_branch]);
    repo.commit_meta_file("main.md", "m\n", "main work");

    let mut opts = options();
    opts.mode = MergeMode::FfOnly;
    let err = merge(&repo.git(), &tip, &opts).unwrap_err();
    assert!(matches!(err, WeldError::User(_)));
}

#[test]
fn fast_forward_refuses_to_overwrite_uncommitted_edits() {
    let repo = MetaRepo::with_submodules(&[]);
    let git = repo.git();
    let base_branch = git.current_branch().unwrap();
    let before = repo.meta_head();

    repo.git_meta(&["checkout", "-b", "feature"]);
    let tip = repo.commit_meta_file("README.md", "# updated\n", "update readme");
    repo.git_meta(&["checkout", &base_branch]);

    // A local edit to a tracked file must survive the refused merge.
    std::fs::write(repo.meta_path().join("README.md"), "local edit\n").unwrap();

    let err = merge(&repo.git(), &tip, &options()).unwrap_err();
    assert!(matches!(err, WeldError::User(_)));
    assert!(err.to_string().contains("README.md"));

    assert_eq!(repo.meta_head(), before);
    let content = std::fs::read_to_string(repo.meta_path().join("README.md")).unwrap();
    assert_eq!(content, "local edit\n");
}

#[test]
fn dirty_open_submodule_blocks_the_merge() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    let git = repo.git();
    let base_branch = git.current_branch().unwrap();

    repo.git_meta(&["checkout", "-b", "feature"]);
    let tip = repo.commit_meta_file("notes.md", "x\n", "feature work");
    repo.git_meta(&["checkout", &base_branch]);

    std::fs::write(repo.meta_path().join(SUB).join("lib.rs"), "// edited\n").unwrap();

    let err = merge(&repo.git(), &tip, &options()).unwrap_err();
    assert!(matches!(err, WeldError::User(_)));
    assert!(err.to_string().contains("libs/parser/lib.rs"));
}

// =============================================================================
// Submodule pointer resolution
// =============================================================================

#[test]
fn descendant_submodule_pointer_wins_without_conflict() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    let git = repo.git();
    let base_branch = git.current_branch().unwrap();

    // Linear submodule history c1 -> c2 -> c3.
    let c2 = repo.commit_sub_file(SUB, "a.rs", "// a\n", "c2");
    let c3 = repo.commit_sub_file(SUB, "b.rs", "// b\n", "c3");

    // Feature records c3; base branch records c2.
    repo.git_meta(&["checkout", "-b", "feature"]);
    let tip = record_sub(&repo, "sub at c3");
    repo.git_meta(&["checkout", &base_branch]);
    repo.git_sub(SUB, &["checkout", c2.as_str()]);
    record_sub(&repo, "sub at c2");

    // Merging feature (c3) into base (c2): c3 descends from c2, so the
    // pointer resolves to c3 and the merge commits cleanly.
    let outcome = merge(&repo.git(), &tip, &options()).unwrap();
    let commit = outcome.commit.expect("merge should commit");
    assert!(outcome.error_message.is_none());

    let gitlink = repo.git().gitlink_at(&commit, &sub_path()).unwrap();
    assert_eq!(gitlink, Some(c3));
}

#[test]
fn diverged_submodules_merge_recursively_when_files_disjoint() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    let git = repo.git();
    let base_branch = git.current_branch().unwrap();
    let c1 = repo.sub_head(SUB);

    // Two submodule commits branching from c1, touching different files.
    let ours_sub = repo.commit_sub_file(SUB, "ours.rs", "// ours\n", "ours side");
    repo.git_sub(SUB, &["checkout", "-b", "alt", c1.as_str()]);
    let theirs_sub = repo.commit_sub_file(SUB, "theirs.rs", "// theirs\n", "theirs side");

    // Record theirs on a feature branch, ours on the base branch.
    repo.git_meta(&["checkout", "-b", "feature"]);
    let tip = record_sub(&repo, "sub theirs");
    repo.git_meta(&["checkout", &base_branch]);
    repo.git_sub(SUB, &["checkout", ours_sub.as_str()]);
    record_sub(&repo, "sub ours");

    let outcome = merge(&repo.git(), &tip, &options()).unwrap();
    let commit = outcome.commit.expect("merge should commit");

    // The resulting gitlink is a fresh submodule merge commit with both
    // sides as parents.
    let gitlink = repo
        .git()
        .gitlink_at(&commit, &sub_path())
        .unwrap()
        .expect("gitlink present");
    assert_ne!(gitlink, ours_sub);
    assert_ne!(gitlink, theirs_sub);

    let sub = repo.git().open_submodule(&sub_path()).unwrap();
    assert!(sub.is_descendant_of(&gitlink, &ours_sub).unwrap());
    assert!(sub.is_descendant_of(&gitlink, &theirs_sub).unwrap());
}

#[test]
fn conflicting_submodule_edits_propagate_to_the_meta_merge() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    let git = repo.git();
    let base_branch = git.current_branch().unwrap();
    let c1 = repo.sub_head(SUB);

    // Both sides edit the same submodule file differently.
    let ours_sub = repo.commit_sub_file(SUB, "lib.rs", "// ours\n", "ours side");
    repo.git_sub(SUB, &["checkout", "-b", "alt", c1.as_str()]);
    repo.commit_sub_file(SUB, "lib.rs", "// theirs\n", "theirs side");

    repo.git_meta(&["checkout", "-b", "feature"]);
    let tip = record_sub(&repo, "sub theirs");
    repo.git_meta(&["checkout", &base_branch]);
    repo.git_sub(SUB, &["checkout", ours_sub.as_str()]);
    record_sub(&repo, "sub ours");
    let before = repo.meta_head();

    let outcome = merge(&repo.git(), &tip, &options()).unwrap();

    // No commit; the gitlink stays conflicted, the submodule's own index
    // holds the file conflict, and a merge record is persisted.
    assert!(outcome.commit.is_none());
    let message = outcome.error_message.expect("conflict message");
    assert!(message.contains(SUB));
    assert_eq!(repo.meta_head(), before);

    let git = repo.git();
    assert!(git.has_conflicts().unwrap());
    let sub = git.open_submodule(&sub_path()).unwrap();
    assert!(sub.has_conflicts().unwrap());

    let state = store(&repo).load().unwrap().expect("sequencer record");
    assert_eq!(state.kind, OpKind::Merge);
    assert_eq!(state.target.oid, tip);
}

#[test]
fn unrelated_submodule_histories_conflict_with_a_three_way_gitlink_entry() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    let git = repo.git();
    let base_branch = git.current_branch().unwrap();

    // Their side records a rootless submodule history that shares no
    // ancestor with the seeded one.
    repo.git_meta(&["checkout", "-b", "feature"]);
    repo.git_sub(SUB, &["checkout", "--orphan", "rootless"]);
    repo.commit_sub_file(SUB, "alt.rs", "// alt\n", "rootless start");
    let tip = record_sub(&repo, "sub rootless");

    // Our side records an ordinary descendant commit.
    repo.git_meta(&["checkout", &base_branch]);
    repo.git_sub(SUB, &["checkout", "main"]);
    repo.commit_sub_file(SUB, "ours.rs", "// ours\n", "ours side");
    record_sub(&repo, "sub ours");
    let before = repo.meta_head();

    let outcome = merge(&repo.git(), &tip, &options()).unwrap();
    assert!(outcome.commit.is_none());
    assert!(outcome.error_message.expect("conflict message").contains(SUB));
    assert_eq!(repo.meta_head(), before);

    // The meta index holds all three gitlink stages for the submodule.
    let unmerged = git_stdout(&repo.meta_path(), &["ls-files", "-u", "--", SUB]);
    let entries: Vec<&str> = unmerged.lines().collect();
    assert_eq!(entries.len(), 3, "expected three stages, got: {unmerged}");
    assert!(entries.iter().all(|line| line.starts_with("160000")));
}

#[test]
fn abort_after_conflicted_merge_restores_head_and_clears_record() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    let git = repo.git();
    let base_branch = git.current_branch().unwrap();
    let c1 = repo.sub_head(SUB);

    let ours_sub = repo.commit_sub_file(SUB, "lib.rs", "// ours\n", "ours side");
    repo.git_sub(SUB, &["checkout", "-b", "alt", c1.as_str()]);
    repo.commit_sub_file(SUB, "lib.rs", "// theirs\n", "theirs side");

    repo.git_meta(&["checkout", "-b", "feature"]);
    let tip = record_sub(&repo, "sub theirs");
    repo.git_meta(&["checkout", &base_branch]);
    repo.git_sub(SUB, &["checkout", ours_sub.as_str()]);
    record_sub(&repo, "sub ours");
    let before = repo.meta_head();

    let outcome = merge(&repo.git(), &tip, &options()).unwrap();
    assert!(outcome.error_message.is_some());

    abort_op(&repo.git()).unwrap();
    assert_eq!(repo.meta_head(), before);
    assert!(!repo.git().has_conflicts().unwrap());
    assert!(store(&repo).load().unwrap().is_none());
}

#[test]
fn merge_refuses_to_start_over_an_in_progress_operation() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    let git = repo.git();
    let base_branch = git.current_branch().unwrap();
    let c1 = repo.sub_head(SUB);

    let ours_sub = repo.commit_sub_file(SUB, "lib.rs", "// ours\n", "ours side");
    repo.git_sub(SUB, &["checkout", "-b", "alt", c1.as_str()]);
    repo.commit_sub_file(SUB, "lib.rs", "// theirs\n", "theirs side");

    repo.git_meta(&["checkout", "-b", "feature"]);
    let tip = record_sub(&repo, "sub theirs");
    repo.git_meta(&["checkout", &base_branch]);
    repo.git_sub(SUB, &["checkout", ours_sub.as_str()]);
    record_sub(&repo, "sub ours");

    let outcome = merge(&repo.git(), &tip, &options()).unwrap();
    assert!(outcome.error_message.is_some());

    let err = merge(&repo.git(), &tip, &options()).unwrap_err();
    assert!(matches!(err, WeldError::Sequencer(_)));
}
