//! End-to-end tests of the `weld` binary.

mod common;

use assert_cmd::Command;
use common::MetaRepo;
use predicates::prelude::*;
use tempfile::TempDir;

fn weld() -> Command {
    Command::cargo_bin("weld").expect("binary builds")
}

#[test]
fn help_lists_the_commands() {
    weld()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("push"));
}

#[test]
fn version_prints() {
    weld().arg("--version").assert().success();
}

#[test]
fn status_outside_a_repository_exits_one() {
    let dir = TempDir::new().unwrap();
    weld()
        .args(["--cwd", dir.path().to_str().unwrap(), "status"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not a git repository"));
}

#[test]
fn status_reports_a_clean_fixture() {
    let repo = MetaRepo::with_submodules(&["libs/parser"]);
    weld()
        .args(["--cwd", repo.meta_path().to_str().unwrap(), "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("libs/parser"));
}

#[test]
fn status_json_is_machine_readable() {
    let repo = MetaRepo::with_submodules(&["libs/parser"]);
    let output = weld()
        .args(["--cwd", repo.meta_path().to_str().unwrap(), "status", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert!(parsed["submodules"]["libs/parser"].is_object());
}

#[test]
fn commit_spans_meta_and_submodule() {
    let repo = MetaRepo::with_submodules(&["libs/parser"]);
    std::fs::write(
        repo.meta_path().join("libs/parser/new.rs"),
        "// new\n",
    )
    .unwrap();

    weld()
        .args(["--cwd", repo.meta_path().to_str().unwrap()])
        .args(["commit", "--all", "--message", "cross-repo change"])
        .assert()
        .success()
        .stdout(predicate::str::contains("committed submodule 'libs/parser'"));

    // The submodule commit landed and the meta commit points at it.
    let sub_head = repo.sub_head("libs/parser");
    let git = repo.git();
    let path = git_weld::core::types::SubmodulePath::new("libs/parser").unwrap();
    let gitlink = git.gitlink_at(&repo.meta_head(), &path).unwrap();
    assert_eq!(gitlink, Some(sub_head));
}

#[test]
fn commit_with_nothing_staged_exits_one() {
    let repo = MetaRepo::with_submodules(&[]);
    weld()
        .args(["--cwd", repo.meta_path().to_str().unwrap()])
        .args(["commit", "--message", "empty"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nothing to commit"));
}

#[test]
fn merge_of_unknown_commitish_exits_one() {
    let repo = MetaRepo::with_submodules(&[]);
    weld()
        .args(["--cwd", repo.meta_path().to_str().unwrap()])
        .args(["merge", "does-not-exist"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot resolve"));
}

#[test]
fn abort_without_an_operation_exits_one() {
    let repo = MetaRepo::with_submodules(&[]);
    weld()
        .args(["--cwd", repo.meta_path().to_str().unwrap(), "abort"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no operation in progress"));
}

#[test]
fn close_and_open_round_trip() {
    let repo = MetaRepo::with_submodules(&["libs/parser"]);
    let cwd = repo.meta_path();

    weld()
        .args(["--cwd", cwd.to_str().unwrap(), "close", "libs/parser"])
        .assert()
        .success();
    assert!(!cwd.join("libs/parser/.git").exists());

    weld()
        .args(["--cwd", cwd.to_str().unwrap(), "open", "libs/parser"])
        .assert()
        .success();
    assert!(cwd.join("libs/parser/.git").exists());
}
