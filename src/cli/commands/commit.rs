//! cli::commands::commit
//!
//! Cross-repository commit: open submodules with staged changes are
//! committed first, their new commits staged as gitlinks, and then the
//! meta-repo commit is created. The submodule and meta commits share one
//! message and one identity.

use crate::cli::commands::open_repo;
use crate::cli::Context;
use crate::core::errors::WeldError;
use crate::core::identity::Identity;
use crate::core::types::SubmodulePath;
use crate::git::Git;
use crate::status::{get_status, StatusOptions};

/// Run the commit command.
pub fn commit(ctx: &Context, message: &str, all: bool, paths: &[String]) -> Result<(), WeldError> {
    if message.trim().is_empty() {
        return Err(WeldError::user("commit message must not be empty"));
    }

    let git = open_repo(ctx)?;
    if git.has_conflicts()? {
        return Err(WeldError::user(
            "the index has unresolved conflicts; resolve them before committing",
        ));
    }
    let identity = git.default_identity()?;

    let opts = StatusOptions {
        paths: paths.to_vec(),
        // With --all, untracked files are staged too, so they must be seen.
        include_untracked: all,
        show_meta_changes: true,
    };
    let snapshot = get_status(&git, &opts)?;

    // Submodules first, so the meta commit can point at their results.
    let mut committed_subs = Vec::new();
    for (path, sm) in &snapshot.submodules {
        let Some(wd) = &sm.workdir else { continue };

        let sub = git.open_submodule(path)?;
        if all && !wd.status.workdir.is_empty() {
            sub.stage_paths(&[]).map_err(|e| e.in_submodule(path))?;
        }

        if let Some(new_head) = commit_if_staged(&sub, path, message, &identity)? {
            git.stage_gitlink(path, &new_head)?;
            committed_subs.push(path.clone());
        }
    }

    if all {
        git.stage_paths(paths)?;
    }
    // Re-stage gitlinks that a bulk stage may have reverted to workdir state.
    for path in &committed_subs {
        let sub = git.open_submodule(path)?;
        if let Some(head) = sub.head_oid().map_err(|e| e.in_submodule(path))? {
            git.stage_gitlink(path, &head)?;
        }
    }

    let tree = git.write_index_tree()?;
    let head = git.head_oid()?;
    if let Some(head) = &head {
        if tree == git.commit_tree_oid(head)? && committed_subs.is_empty() {
            return Err(WeldError::user("nothing to commit"));
        }
    }

    let parents: Vec<&_> = head.iter().collect();
    let commit = git.create_commit(&identity, message, &tree, &parents, Some("HEAD"))?;

    if !ctx.quiet {
        for path in &committed_subs {
            println!("committed submodule '{path}'");
        }
        println!("committed {}", commit.short(12));
    }
    Ok(())
}

/// Commit a submodule's staged changes, if any. Returns the new HEAD.
fn commit_if_staged(
    sub: &Git,
    path: &SubmodulePath,
    message: &str,
    identity: &Identity,
) -> Result<Option<crate::core::types::Oid>, WeldError> {
    let in_sub = |e: crate::git::GitError| WeldError::Git(e.in_submodule(path));

    let tree = sub.write_index_tree().map_err(in_sub)?;
    let head = sub.head_oid().map_err(in_sub)?;
    if let Some(head) = &head {
        if tree == sub.commit_tree_oid(head).map_err(in_sub)? {
            return Ok(None);
        }
    }

    let parents: Vec<&_> = head.iter().collect();
    let commit = sub
        .create_commit(identity, message, &tree, &parents, Some("HEAD"))
        .map_err(in_sub)?;
    Ok(Some(commit))
}
