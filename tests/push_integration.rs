//! Integration tests for submodule-first push synchronization.

mod common;

use std::path::Path;
use std::process::Command;

use common::{git_stdout, MetaRepo};

use git_weld::core::errors::WeldError;
use git_weld::git::GitError;
use git_weld::push::{push, PushOptions};

const SUB: &str = "libs/parser";

fn options() -> PushOptions {
    PushOptions {
        remote: "origin".into(),
        source: None,
        target: None,
        force: false,
    }
}

/// rev-parse in a bare remote; `None` when the ref does not exist.
fn remote_ref(bare: &Path, refname: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--verify", refname])
        .current_dir(bare)
        .output()
        .expect("git rev-parse failed to spawn");
    if output.status.success() {
        Some(String::from_utf8(output.stdout).unwrap().trim().to_string())
    } else {
        None
    }
}

#[test]
fn push_publishes_submodule_commits_and_then_the_meta_ref() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    let c2 = repo.commit_sub_file(SUB, "new.rs", "// new\n", "sub change");
    let tip = repo.commit_gitlink(SUB, "bump sub");

    let outcome = push(&repo.git(), &options()).unwrap();
    assert_eq!(outcome.pushed.len(), 1);
    assert_eq!(outcome.pushed[0].as_str(), SUB);

    // The submodule remote has the commit the meta tree points at.
    assert_eq!(
        remote_ref(&repo.sub_remote(SUB), "refs/heads/main").as_deref(),
        Some(c2.as_str())
    );
    // And the meta remote has the meta tip.
    assert_eq!(
        remote_ref(&repo.meta_remote(), "refs/heads/main").as_deref(),
        Some(tip.as_str())
    );
}

#[test]
fn second_push_reports_submodules_up_to_date() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    repo.commit_sub_file(SUB, "new.rs", "// new\n", "sub change");
    repo.commit_gitlink(SUB, "bump sub");

    push(&repo.git(), &options()).unwrap();

    repo.commit_meta_file("notes.md", "x\n", "meta only");
    let outcome = push(&repo.git(), &options()).unwrap();
    assert!(outcome.pushed.is_empty());
}

#[test]
fn failed_submodule_push_blocks_the_meta_push() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    repo.commit_sub_file(SUB, "new.rs", "// new\n", "sub change");
    repo.commit_gitlink(SUB, "bump sub");

    // Break the submodule's remote.
    repo.git_sub(SUB, &["remote", "set-url", "origin", "/nonexistent/repo.git"]);

    let err = push(&repo.git(), &options()).unwrap_err();
    assert!(matches!(err, WeldError::Fatal(_)));
    assert!(err.to_string().contains(SUB));

    // The meta ref never moved.
    assert_eq!(remote_ref(&repo.meta_remote(), "refs/heads/main"), None);
}

#[test]
fn closed_submodule_with_outgoing_commits_is_a_user_error() {
    let repo = MetaRepo::with_submodules(&[SUB]);

    // Close the submodule: empty its working tree.
    let dir = repo.meta_path().join(SUB);
    std::fs::remove_dir_all(&dir).unwrap();
    std::fs::create_dir(&dir).unwrap();

    let err = push(&repo.git(), &options()).unwrap_err();
    assert!(matches!(err, WeldError::User(_)));
    assert_eq!(remote_ref(&repo.meta_remote(), "refs/heads/main"), None);
}

#[test]
fn detached_head_requires_an_explicit_source() {
    let repo = MetaRepo::with_submodules(&[]);
    let head = repo.meta_head();
    repo.git_meta(&["checkout", "--detach", head.as_str()]);

    let err = push(&repo.git(), &options()).unwrap_err();
    assert!(matches!(err, WeldError::User(_)));
}

#[test]
fn candidates_are_diffed_against_the_target_ref() {
    let repo = MetaRepo::with_submodules(&[SUB]);
    repo.commit_sub_file(SUB, "new.rs", "// new\n", "sub change");
    repo.commit_gitlink(SUB, "bump sub");

    let opts = PushOptions {
        remote: "origin".into(),
        source: None,
        target: Some("review/incoming".into()),
        force: false,
    };
    let outcome = push(&repo.git(), &opts).unwrap();
    assert_eq!(outcome.pushed.len(), 1);

    // The remote's recorded target tip now reaches everything, so the
    // second push finds no submodule candidates at all.
    let outcome = push(&repo.git(), &opts).unwrap();
    assert!(outcome.pushed.is_empty());
    assert!(outcome.up_to_date.is_empty());
}

#[test]
fn non_fast_forward_meta_push_is_rejected_without_force() {
    let repo = MetaRepo::with_submodules(&[]);
    repo.commit_meta_file("notes.md", "a\n", "first");
    push(&repo.git(), &options()).unwrap();

    // Rewind and diverge; a plain push is now a non-fast-forward.
    repo.git_meta(&["reset", "--hard", "HEAD~1"]);
    let tip = repo.commit_meta_file("other.md", "b\n", "diverged");

    let err = push(&repo.git(), &options()).unwrap_err();
    assert!(matches!(
        err,
        WeldError::Git(GitError::PushRejected { .. })
    ));

    let mut opts = options();
    opts.force = true;
    push(&repo.git(), &opts).unwrap();
    assert_eq!(
        remote_ref(&repo.meta_remote(), "refs/heads/main").as_deref(),
        Some(tip.as_str())
    );
}

#[test]
fn explicit_source_and_target_branches_are_honored() {
    let repo = MetaRepo::with_submodules(&[]);
    let branch = git_stdout(&repo.meta_path(), &["symbolic-ref", "--short", "HEAD"])
        .trim()
        .to_string();
    let tip = repo.commit_meta_file("notes.md", "x\n", "work");

    let opts = PushOptions {
        remote: "origin".into(),
        source: Some(branch),
        target: Some("review/incoming".into()),
        force: false,
    };
    let outcome = push(&repo.git(), &opts).unwrap();
    assert_eq!(outcome.meta_ref, "refs/heads/review/incoming");
    assert_eq!(
        remote_ref(&repo.meta_remote(), "refs/heads/review/incoming").as_deref(),
        Some(tip.as_str())
    );
}
