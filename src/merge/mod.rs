//! merge
//!
//! Cross-repository merge engine.
//!
//! # Architecture
//!
//! A meta-repo merge is an ordinary three-way merge of the meta history
//! with one extra move: gitlink conflicts are not opaque. Where both
//! sides moved a submodule pointer, the engine opens the submodule's own
//! repository and resolves the conflict by ancestry:
//!
//! - theirs a strict descendant of ours (or vice versa) resolves to the
//!   descendant
//! - otherwise the submodule's histories are merged three-way from their
//!   common merge-base, producing a fresh submodule merge commit that the
//!   meta merge then points at
//! - both sides adding the submodule at different commits, or one side
//!   deleting it, is always a conflict for the user
//!
//! Submodule resolution fans out through the worker pool, one task per
//! submodule. The meta repository handle never crosses a thread
//! boundary: each task carries a plan of plain data and opens the
//! repositories it needs itself.
//!
//! When conflicts remain, the conflicted index is installed in the real
//! repository, a sequencer record is persisted so `continue`/`abort`
//! work after the user intervenes, and no commit is created.

use std::path::PathBuf;

use crate::core::errors::WeldError;
use crate::core::identity::Identity;
use crate::core::paths::WeldPaths;
use crate::core::types::{Oid, SubmodulePath};
use crate::git::{Git, MergeIndex};
use crate::sequencer::{CommitAndRef, OpKind, SequencerError, SequencerStore};
use crate::status::relation::{classify, CommitRelation};
use crate::status::{get_status, RepoStatus, StatusOptions};
use crate::work;

/// How the merge is allowed to conclude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Fast-forward when possible, otherwise create a merge commit.
    Normal,
    /// Fast-forward or fail; never create a merge commit.
    FfOnly,
    /// Always create a merge commit, even where a fast-forward would do.
    ForceCommit,
}

/// What to do when a conflicted submodule is not checked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmoduleOpenPolicy {
    /// Clone and check out the submodule, then resolve.
    OpenOnDemand,
    /// Refuse to proceed; the user opens the submodule first.
    RequireOpen,
}

/// Options for [`merge`].
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Fast-forward behaviour.
    pub mode: MergeMode,
    /// Handling of closed conflicted submodules.
    pub open_policy: SubmoduleOpenPolicy,
    /// Override for the merge commit message.
    pub message: Option<String>,
    /// Author/committer identity.
    pub identity: Identity,
}

/// What a merge produced.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The resulting commit: the merge commit, or the fast-forward
    /// target. `None` when already up to date or when conflicts remain.
    pub commit: Option<Oid>,
    /// The merge was a fast-forward (no new commit).
    pub fast_forward: bool,
    /// HEAD already contained the target.
    pub up_to_date: bool,
    /// Paths still conflicted after submodule resolution.
    pub conflict_paths: Vec<String>,
    /// Human-readable conflict report, when conflicts remain.
    pub error_message: Option<String>,
}

impl MergeOutcome {
    fn up_to_date() -> Self {
        Self {
            commit: None,
            fast_forward: false,
            up_to_date: true,
            conflict_paths: Vec::new(),
            error_message: None,
        }
    }

    fn fast_forward(to: Oid) -> Self {
        Self {
            commit: Some(to),
            fast_forward: true,
            up_to_date: false,
            conflict_paths: Vec::new(),
            error_message: None,
        }
    }

    fn committed(commit: Oid) -> Self {
        Self {
            commit: Some(commit),
            fast_forward: false,
            up_to_date: false,
            conflict_paths: Vec::new(),
            error_message: None,
        }
    }

    fn conflicted(paths: Vec<String>) -> Self {
        let message = conflict_message(&paths);
        Self {
            commit: None,
            fast_forward: false,
            up_to_date: false,
            conflict_paths: paths,
            error_message: Some(message),
        }
    }
}

/// Merge `theirs` into HEAD.
///
/// Submodule pointer conflicts are resolved by ancestry or by recursive
/// submodule merge; remaining conflicts leave the index conflicted, the
/// submodule indexes conflicted where applicable, and a persisted
/// sequencer record. The outcome then carries `error_message` instead of
/// a commit.
///
/// # Errors
///
/// - [`WeldError::User`] for an unresolvable target, uncommitted file
///   changes that head movement would overwrite, a non-fast-forward
///   under [`MergeMode::FfOnly`], or a closed submodule under
///   [`SubmoduleOpenPolicy::RequireOpen`]
/// - [`WeldError::Sequencer`] when an operation is already in progress
/// - fetch failures for submodule merge parents are fatal
pub fn merge(git: &Git, theirs: &Oid, opts: &MergeOptions) -> Result<MergeOutcome, WeldError> {
    let store = SequencerStore::new(WeldPaths::new(git.info()?.common_dir));
    if let Some(existing) = store.load()? {
        return Err(SequencerError::AlreadyInProgress {
            kind: existing.kind,
        }
        .into());
    }
    if git.has_conflicts()? {
        return Err(WeldError::user(
            "the index has unresolved conflicts; resolve them before merging",
        ));
    }

    let ours = git
        .head_oid()?
        .ok_or_else(|| WeldError::user("cannot merge in a repository with no commits"))?;

    match classify(git, theirs, &ours) {
        CommitRelation::Same | CommitRelation::Behind => return Ok(MergeOutcome::up_to_date()),
        CommitRelation::Unknown => {
            return Err(WeldError::user(format!(
                "cannot resolve commit {}",
                theirs.short(12)
            )));
        }
        CommitRelation::Ahead if opts.mode != MergeMode::ForceCommit => {
            require_clean_worktree(git)?;
            git.reset_head(theirs, "merge: fast-forward")?;
            return Ok(MergeOutcome::fast_forward(theirs.clone()));
        }
        CommitRelation::Ahead | CommitRelation::Unrelated => {}
    }
    if opts.mode == MergeMode::FfOnly {
        return Err(WeldError::user(format!(
            "cannot fast-forward to {}; histories have diverged",
            theirs.short(12)
        )));
    }
    require_clean_worktree(git)?;

    let mut merged = git.merge_commits(&ours, theirs)?;
    let unresolved =
        resolve_submodule_conflicts(git, &mut merged, opts.open_policy, &opts.identity)?;

    if merged.has_conflicts() {
        git.install_index(&merged)?;
        store.start(
            OpKind::Merge,
            CommitAndRef {
                oid: ours,
                refname: git.head_ref(),
            },
            CommitAndRef::detached(theirs.clone()),
            vec![theirs.clone()],
        )?;

        let mut paths: Vec<String> = unresolved.iter().map(|p| p.to_string()).collect();
        for conflict in merged.conflicts()? {
            if !conflict.is_submodule() {
                paths.push(conflict.path);
            }
        }
        paths.sort();
        paths.dedup();
        return Ok(MergeOutcome::conflicted(paths));
    }

    let tree = merged.write_tree(git)?;
    let message = match &opts.message {
        Some(message) => message.clone(),
        None => default_message(git, theirs),
    };
    let commit = git.create_commit(&opts.identity, &message, &tree, &[&ours, theirs], None)?;
    git.reset_head(&commit, "merge")?;
    Ok(MergeOutcome::committed(commit))
}

/// Refuse to run a head-moving operation over uncommitted file changes.
///
/// Head movement checks out the new commit's tree by force, so staged or
/// modified tracked files in the meta-repo or any open submodule would
/// be overwritten. Submodule pointer drift is not blocked: it is an
/// input the engines resolve, the same way git treats dirty submodule
/// pointers during merge.
pub(crate) fn require_clean_worktree(git: &Git) -> Result<(), WeldError> {
    let status = get_status(
        git,
        &StatusOptions {
            paths: Vec::new(),
            include_untracked: false,
            show_meta_changes: true,
        },
    )?;
    let dirty = dirty_file_paths(&status);
    if !dirty.is_empty() {
        return Err(WeldError::user(format!(
            "uncommitted changes would be overwritten: {}; commit or stash them first",
            dirty.join(", ")
        )));
    }
    Ok(())
}

fn dirty_file_paths(status: &RepoStatus) -> Vec<String> {
    let mut dirty: Vec<String> = status
        .staged
        .keys()
        .chain(status.workdir.keys())
        .cloned()
        .collect();
    for (path, sub) in &status.submodules {
        if let Some(wd) = &sub.workdir {
            for file in wd.status.staged.keys().chain(wd.status.workdir.keys()) {
                dirty.push(format!("{path}/{file}"));
            }
        }
    }
    dirty.sort();
    dirty.dedup();
    dirty
}

/// Everything a per-submodule resolution task needs, gathered on the
/// control thread. Tasks open their own repository handles.
struct SubPlan {
    path: SubmodulePath,
    ancestor: Option<Oid>,
    ours: Option<Oid>,
    theirs: Option<Oid>,
    meta_workdir: PathBuf,
    /// Recorded URL for fetch fallback when `origin` lacks a commit.
    url: Option<String>,
}

/// How one submodule conflict was settled.
enum Resolution {
    /// Resolve the gitlink to this commit.
    Take(Oid),
    /// Leave the conflict for the user.
    Conflict,
}

/// Resolve the submodule gitlink conflicts in a merged index.
///
/// Applies every ancestry- or merge-resolvable conflict directly to
/// `merged` and returns the paths that remain for the user. Per-submodule
/// fetch or repository failures do not abort sibling resolutions, but the
/// first such failure is propagated once all tasks finish.
pub(crate) fn resolve_submodule_conflicts(
    git: &Git,
    merged: &mut MergeIndex,
    open_policy: SubmoduleOpenPolicy,
    identity: &Identity,
) -> Result<Vec<SubmodulePath>, WeldError> {
    let mut plans = Vec::new();
    for conflict in merged.conflicts()? {
        if !conflict.is_submodule() {
            continue;
        }
        let path = SubmodulePath::new(&conflict.path).map_err(|e| {
            WeldError::fatal(format!("conflicted gitlink at invalid path: {e}"))
        })?;
        plans.push(SubPlan {
            ancestor: conflict.ancestor.map(|s| s.oid),
            ours: conflict.ours.map(|s| s.oid),
            theirs: conflict.theirs.map(|s| s.oid),
            meta_workdir: git.work_dir()?.to_path_buf(),
            url: git.submodule_url(&path),
            path,
        });
    }
    if plans.is_empty() {
        return Ok(Vec::new());
    }

    let results = work::map_per_submodule(plans, |plan| {
        (
            plan.path.clone(),
            resolve_one(plan, open_policy, identity),
        )
    });

    let mut unresolved = Vec::new();
    let mut first_failure = None;
    for (path, result) in results {
        match result {
            Ok(Resolution::Take(oid)) => merged.resolve_gitlink(&path, &oid)?,
            Ok(Resolution::Conflict) => unresolved.push(path),
            Err(err) => {
                log::error!("submodule '{path}' resolution failed: {err}");
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
        }
    }
    if let Some(err) = first_failure {
        return Err(err);
    }
    Ok(unresolved)
}

/// Resolve one submodule conflict. Runs on a worker thread.
fn resolve_one(
    plan: &SubPlan,
    open_policy: SubmoduleOpenPolicy,
    identity: &Identity,
) -> Result<Resolution, WeldError> {
    let (Some(ours), Some(theirs)) = (&plan.ours, &plan.theirs) else {
        // One side deleted the submodule while the other moved it.
        return Ok(Resolution::Conflict);
    };
    if plan.ancestor.is_none() {
        // Both sides added the submodule at different commits.
        return Ok(Resolution::Conflict);
    }

    let meta = Git::open(&plan.meta_workdir)?;
    if !meta.submodule_is_open(&plan.path) {
        match open_policy {
            SubmoduleOpenPolicy::RequireOpen => {
                return Err(WeldError::user(format!(
                    "submodule '{}' is conflicted but not open; run 'weld open {}' first",
                    plan.path, plan.path
                )));
            }
            SubmoduleOpenPolicy::OpenOnDemand => meta.clone_submodule(&plan.path)?,
        }
    }
    let sub = meta.open_submodule(&plan.path)?;

    ensure_local(&sub, plan, ours)?;
    ensure_local(&sub, plan, theirs)?;

    match classify(&sub, theirs, ours) {
        CommitRelation::Same | CommitRelation::Behind => Ok(Resolution::Take(ours.clone())),
        CommitRelation::Ahead => {
            sub.reset_head(theirs, "merge: take descendant")
                .map_err(|e| e.in_submodule(&plan.path))?;
            Ok(Resolution::Take(theirs.clone()))
        }
        CommitRelation::Unrelated => merge_within(&sub, plan, ours, theirs, identity),
        CommitRelation::Unknown => Err(WeldError::fatal(format!(
            "submodule '{}': cannot relate {} and {} even after fetching",
            plan.path,
            ours.short(12),
            theirs.short(12)
        ))),
    }
}

/// Make sure a submodule commit is present locally, fetching from
/// `origin` and falling back to the recorded URL.
fn ensure_local(sub: &Git, plan: &SubPlan, oid: &Oid) -> Result<(), WeldError> {
    if sub.commit_exists(oid) {
        return Ok(());
    }
    let from_origin = sub.fetch_commit("origin", oid);
    if from_origin.is_ok() {
        return Ok(());
    }
    match &plan.url {
        Some(url) => sub
            .fetch_commit(url, oid)
            .map_err(|e| WeldError::Git(e.in_submodule(&plan.path))),
        None => from_origin.map_err(|e| WeldError::Git(e.in_submodule(&plan.path))),
    }
}

/// Merge two diverged submodule commits from their common base.
///
/// A clean merge produces a submodule merge commit and checks it out; a
/// conflicted one installs the conflicted index inside the submodule and
/// leaves the meta gitlink conflicted.
fn merge_within(
    sub: &Git,
    plan: &SubPlan,
    ours: &Oid,
    theirs: &Oid,
    identity: &Identity,
) -> Result<Resolution, WeldError> {
    let in_sub = |e: crate::git::GitError| WeldError::Git(e.in_submodule(&plan.path));

    if sub.merge_base(ours, theirs).map_err(in_sub)?.is_none() {
        // No shared history to merge from.
        return Ok(Resolution::Conflict);
    }

    let mut merged = sub.merge_commits(ours, theirs).map_err(in_sub)?;
    if merged.has_conflicts() {
        sub.install_index(&merged).map_err(in_sub)?;
        return Ok(Resolution::Conflict);
    }

    let tree = merged.write_tree(sub).map_err(in_sub)?;
    let message = format!(
        "Merge submodule histories {} and {}",
        ours.short(12),
        theirs.short(12)
    );
    let commit = sub
        .create_commit(identity, &message, &tree, &[ours, theirs], None)
        .map_err(in_sub)?;
    sub.reset_head(&commit, "merge").map_err(in_sub)?;
    Ok(Resolution::Take(commit))
}

fn default_message(git: &Git, theirs: &Oid) -> String {
    match git.current_branch() {
        Some(branch) => format!("Merge {} into {branch}", theirs.short(12)),
        None => format!("Merge {}", theirs.short(12)),
    }
}

fn conflict_message(paths: &[String]) -> String {
    format!(
        "automatic merge failed; fix conflicts in: {} then run 'weld continue' \
         (or 'weld abort')",
        paths.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_lists_paths_and_next_steps() {
        let msg = conflict_message(&["libs/parser".into(), "src/main.rs".into()]);
        assert!(msg.contains("libs/parser, src/main.rs"));
        assert!(msg.contains("weld continue"));
        assert!(msg.contains("weld abort"));
    }

    #[test]
    fn outcome_constructors_are_mutually_exclusive() {
        let up = MergeOutcome::up_to_date();
        assert!(up.up_to_date && up.commit.is_none() && up.error_message.is_none());

        let conflicted = MergeOutcome::conflicted(vec!["libs/parser".into()]);
        assert!(conflicted.commit.is_none());
        assert!(conflicted.error_message.is_some());
    }
}
