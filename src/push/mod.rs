//! push
//!
//! Submodule-first push synchronization.
//!
//! # Architecture
//!
//! Pushing a meta commit whose gitlinks point at unpublished submodule
//! commits produces a remote no one can clone. The push engine therefore
//! inverts the order: every submodule commit the outgoing meta commits
//! reference is pushed (or verified already present) first, and the meta
//! ref moves only after all of them succeed.
//!
//! Candidate submodules come from the tree diff between the remote's
//! known value of the target ref and the commit being pushed; with no
//! known target tip every gitlink in the outgoing tree is a candidate. Submodule pushes fan out
//! through the worker pool and failures are collected, so one broken
//! submodule does not hide the others. Any failure still blocks the
//! meta push.

use std::path::PathBuf;

use crate::core::errors::WeldError;
use crate::core::types::{Oid, SubmodulePath};
use crate::git::{Git, GitError, TreeChange};
use crate::status::relation::{classify, CommitRelation};
use crate::work;

/// Options for [`push`].
#[derive(Debug, Clone)]
pub struct PushOptions {
    /// Remote to push the meta-repo to.
    pub remote: String,
    /// Branch to push; defaults to the current branch.
    pub source: Option<String>,
    /// Remote branch to update; defaults to the source branch.
    pub target: Option<String>,
    /// Allow non-fast-forward updates (refspecs get a `+` prefix).
    pub force: bool,
}

/// What a push did.
#[derive(Debug, Clone)]
pub struct PushOutcome {
    /// Submodules whose commits were pushed.
    pub pushed: Vec<SubmodulePath>,
    /// Submodules whose commits were already on their remote.
    pub up_to_date: Vec<SubmodulePath>,
    /// The meta ref that was updated on the remote.
    pub meta_ref: String,
}

/// Everything one submodule push task needs; tasks open their own
/// repository handles.
struct PushPlan {
    path: SubmodulePath,
    gitlink: Oid,
    workdir: PathBuf,
    /// Recorded URL, the fallback when the submodule has no `origin`.
    url: Option<String>,
    branch: String,
    force: bool,
}

enum PushAction {
    Pushed,
    UpToDate,
}

/// Push a branch and every submodule commit it references.
///
/// # Errors
///
/// - [`WeldError::User`] for a missing remote, a detached HEAD with no
///   explicit source, or a candidate submodule that is not open
/// - any submodule push failure (collected across submodules, first one
///   propagated) blocks the meta push entirely
pub fn push(git: &Git, opts: &PushOptions) -> Result<PushOutcome, WeldError> {
    if !git.has_remote(&opts.remote) {
        return Err(WeldError::Git(GitError::RemoteNotFound {
            name: opts.remote.clone(),
        }));
    }

    let source = match &opts.source {
        Some(branch) => branch.clone(),
        None => git.current_branch().ok_or_else(|| {
            WeldError::user("HEAD is detached; name the branch to push")
        })?,
    };
    let target = opts.target.clone().unwrap_or_else(|| source.clone());

    let tip = git.resolve_ref(&format!("refs/heads/{source}")).map_err(|_| {
        WeldError::user(format!("no local branch named '{source}'"))
    })?;

    let plans = submodule_plans(git, opts, &tip, &source, &target)?;
    let results = work::map_per_submodule(plans, |plan| (plan.path.clone(), push_one(plan)));
    let (ok, failed) = work::collect_failures(results);

    for (path, err) in &failed {
        log::error!("submodule '{path}' push failed: {err}");
    }
    let names: Vec<String> = failed.iter().map(|(p, _)| p.to_string()).collect();
    if let Some((_, first)) = failed.into_iter().next() {
        return Err(WeldError::fatal(format!(
            "submodule pushes failed ({}), meta push aborted: {first}",
            names.join(", ")
        )));
    }

    let mut pushed = Vec::new();
    let mut up_to_date = Vec::new();
    for (path, action) in ok {
        match action {
            PushAction::Pushed => pushed.push(path),
            PushAction::UpToDate => up_to_date.push(path),
        }
    }

    let dst = format!("refs/heads/{target}");
    git.push(
        &opts.remote,
        &format!("refs/heads/{source}"),
        &dst,
        opts.force,
    )?;

    Ok(PushOutcome {
        pushed,
        up_to_date,
        meta_ref: dst,
    })
}

/// Build the per-submodule push plans for the outgoing commits.
///
/// A submodule is a candidate when its gitlink differs between the
/// remote's known value of the target ref and the commit being pushed;
/// with no known target tip, every gitlink in the outgoing tree is a
/// candidate.
fn submodule_plans(
    git: &Git,
    opts: &PushOptions,
    tip: &Oid,
    source: &str,
    target: &str,
) -> Result<Vec<PushPlan>, WeldError> {
    let remote_tip = git.remote_tracking_oid(&opts.remote, target)?;

    let mut candidates: Vec<(SubmodulePath, Oid)> = Vec::new();
    match &remote_tip {
        Some(remote_tip) if remote_tip != tip => {
            for change in git.tree_changes(remote_tip, tip)? {
                if let TreeChange::Submodule {
                    path,
                    new: Some(new),
                    ..
                } = change
                {
                    candidates.push((path, new));
                }
            }
        }
        Some(_) => {}
        None => {
            for (path, oid) in git.tree_gitlinks(tip)? {
                candidates.push((path, oid));
            }
        }
    }

    let workdir = git.work_dir()?.to_path_buf();
    let mut plans = Vec::new();
    for (path, gitlink) in candidates {
        if !git.submodule_is_open(&path) {
            return Err(WeldError::user(format!(
                "submodule '{path}' has outgoing commits but is not open; \
                 run 'weld open {path}' first"
            )));
        }
        plans.push(PushPlan {
            workdir: workdir.join(path.as_path()),
            url: git.submodule_url(&path),
            branch: source.to_string(),
            force: opts.force,
            path,
            gitlink,
        });
    }
    Ok(plans)
}

/// Push one submodule's gitlink commit. Runs on a worker thread.
fn push_one(plan: &PushPlan) -> Result<PushAction, WeldError> {
    let sub = Git::open(&plan.workdir).map_err(|e| WeldError::Git(e.in_submodule(&plan.path)))?;

    if !sub.commit_exists(&plan.gitlink) {
        return Err(WeldError::fatal(format!(
            "submodule '{}': recorded commit {} is not present locally",
            plan.path,
            plan.gitlink.short(12)
        )));
    }

    // Prefer the submodule's own branch name for the remote ref, falling
    // back to the meta branch being pushed.
    let branch = sub.current_branch().unwrap_or_else(|| plan.branch.clone());

    // A raw URL fallback has no remote-tracking refs, so the up-to-date
    // check only applies to a configured remote.
    let (remote, known_tip) = if sub.has_remote("origin") {
        let known = sub
            .remote_tracking_oid("origin", &branch)
            .map_err(|e| WeldError::Git(e.in_submodule(&plan.path)))?;
        ("origin".to_string(), known)
    } else {
        let url = plan.url.clone().ok_or_else(|| {
            WeldError::Git(
                GitError::RemoteNotFound {
                    name: "origin".into(),
                }
                .in_submodule(&plan.path),
            )
        })?;
        (url, None)
    };

    // Already on the remote as far as we know locally.
    if let Some(remote_tip) = known_tip {
        if matches!(
            classify(&sub, &plan.gitlink, &remote_tip),
            CommitRelation::Same | CommitRelation::Behind
        ) {
            return Ok(PushAction::UpToDate);
        }
    }

    sub.push(
        &remote,
        plan.gitlink.as_str(),
        &format!("refs/heads/{branch}"),
        plan.force,
    )
    .map_err(|e| WeldError::Git(e.in_submodule(&plan.path)))?;
    Ok(PushAction::Pushed)
}
