//! sequencer::flows
//!
//! The rebase, cherry-pick, continue, and abort operations driven by the
//! persisted sequencer record.
//!
//! Every step follows the same shape: the record is already durable for
//! the step (written by `start` or the previous `advance`), the step's
//! commit is replayed onto HEAD through the merge machinery's submodule
//! conflict resolution, and only then does the record advance. A replay
//! whose tree equals HEAD's tree is skipped, which both drops
//! already-contained commits and makes crash re-runs of a completed step
//! harmless.

use crate::core::errors::WeldError;
use crate::core::identity::Identity;
use crate::core::paths::WeldPaths;
use crate::core::types::Oid;
use crate::git::Git;
use crate::merge::{self, SubmoduleOpenPolicy};
use crate::sequencer::state::{
    CommitAndRef, OpKind, SequencerError, SequencerState, SequencerStore,
};
use crate::status::relation::{classify, CommitRelation};

/// What a sequencer-driven operation produced.
#[derive(Debug, Clone)]
pub struct SequenceOutcome {
    /// Commits created, in application order.
    pub applied: Vec<Oid>,
    /// Every step ran; the record is gone.
    pub completed: bool,
    /// Paths left conflicted when the operation paused.
    pub conflict_paths: Vec<String>,
    /// Human-readable conflict report, when the operation paused.
    pub error_message: Option<String>,
}

impl SequenceOutcome {
    fn completed(applied: Vec<Oid>) -> Self {
        Self {
            applied,
            completed: true,
            conflict_paths: Vec::new(),
            error_message: None,
        }
    }
}

/// Replay the commits unique to HEAD onto `onto`.
///
/// - HEAD same as or ahead of `onto` is a no-op (already based)
/// - HEAD strictly behind `onto` fast-forwards
/// - diverged histories replay `merge-base..HEAD` (merge commits
///   skipped), oldest first, pausing on the first conflict
///
/// # Errors
///
/// [`WeldError::User`] for an unresolvable target, no common ancestor, a
/// dirty index, or another operation in progress.
pub fn rebase(git: &Git, onto: &Oid, identity: &Identity) -> Result<SequenceOutcome, WeldError> {
    let store = store_for(git)?;
    guard_ready(git, &store)?;

    let head = git
        .head_oid()?
        .ok_or_else(|| WeldError::user("cannot rebase in a repository with no commits"))?;

    match classify(git, &head, onto) {
        CommitRelation::Same | CommitRelation::Ahead => {
            return Ok(SequenceOutcome::completed(Vec::new()));
        }
        CommitRelation::Behind => {
            git.reset_head(onto, "rebase: fast-forward")?;
            return Ok(SequenceOutcome::completed(Vec::new()));
        }
        CommitRelation::Unknown => {
            return Err(WeldError::user(format!(
                "cannot resolve commit {}",
                onto.short(12)
            )));
        }
        CommitRelation::Unrelated => {}
    }

    let base = git.merge_base(&head, onto)?.ok_or_else(|| {
        WeldError::user(format!(
            "no common history with {}; nothing to rebase onto",
            onto.short(12)
        ))
    })?;
    let mut commits = Vec::new();
    for oid in git.commits_between(&base, &head)? {
        if git.parent_count(&oid)? > 1 {
            log::debug!("rebase skips merge commit {}", oid.short(12));
            continue;
        }
        commits.push(oid);
    }

    let state = store.start(
        OpKind::Rebase,
        CommitAndRef {
            oid: head,
            refname: git.head_ref(),
        },
        CommitAndRef::detached(onto.clone()),
        commits,
    )?;
    git.reset_head(onto, "rebase: onto")?;
    run_steps(git, &store, state, identity)
}

/// Apply a single commit onto HEAD.
pub fn cherry_pick(git: &Git, pick: &Oid, identity: &Identity) -> Result<SequenceOutcome, WeldError> {
    let store = store_for(git)?;
    guard_ready(git, &store)?;

    let head = git
        .head_oid()?
        .ok_or_else(|| WeldError::user("cannot cherry-pick in a repository with no commits"))?;
    if !git.commit_exists(pick) {
        return Err(WeldError::user(format!(
            "cannot resolve commit {}",
            pick.short(12)
        )));
    }
    if git.parent_count(pick)? > 1 {
        return Err(WeldError::user(format!(
            "{} is a merge commit and cannot be cherry-picked",
            pick.short(12)
        )));
    }

    let state = store.start(
        OpKind::CherryPick,
        CommitAndRef {
            oid: head,
            refname: git.head_ref(),
        },
        CommitAndRef::detached(pick.clone()),
        vec![pick.clone()],
    )?;
    run_steps(git, &store, state, identity)
}

/// Resume the in-progress operation after the user resolved conflicts
/// and staged the result.
pub fn continue_op(git: &Git, identity: &Identity) -> Result<SequenceOutcome, WeldError> {
    let store = store_for(git)?;
    let mut state = store.load()?.ok_or(SequencerError::NotInProgress)?;
    if git.has_conflicts()? {
        return Err(WeldError::user(
            "unresolved conflicts remain; resolve and stage them before continuing",
        ));
    }

    match state.kind {
        OpKind::Merge => {
            let tree = git.write_index_tree()?;
            let message = match git.current_branch() {
                Some(branch) => {
                    format!("Merge {} into {branch}", state.target.oid.short(12))
                }
                None => format!("Merge {}", state.target.oid.short(12)),
            };
            let commit = git.create_commit(
                identity,
                &message,
                &tree,
                &[&state.original_head.oid, &state.target.oid],
                None,
            )?;
            git.reset_head(&commit, "merge: continue")?;
            store.clear()?;
            Ok(SequenceOutcome::completed(vec![commit]))
        }
        OpKind::Rebase | OpKind::CherryPick => {
            let mut applied = Vec::new();
            // Finish the paused step from the resolved index.
            if let Some(pick) = state.current_commit().cloned() {
                let head = git
                    .head_oid()?
                    .ok_or_else(|| WeldError::fatal("HEAD vanished mid-operation"))?;
                let tree = git.write_index_tree()?;
                if tree != git.commit_tree_oid(&head)? {
                    let message = git.commit_message(&pick)?;
                    let commit =
                        git.create_commit(identity, &message, &tree, &[&head], None)?;
                    git.reset_head(&commit, "sequencer: continue")?;
                    applied.push(commit);
                }
                store.advance(&mut state)?;
            }
            let rest = run_steps(git, &store, state, identity)?;
            applied.extend(rest.applied.iter().cloned());
            Ok(SequenceOutcome {
                applied,
                ..rest
            })
        }
    }
}

/// Abandon the in-progress operation and restore the original HEAD.
///
/// Submodule working trees moved by already-resolved steps are not
/// rewound; their gitlinks are, so a later checkout realigns them.
pub fn abort_op(git: &Git) -> Result<(), WeldError> {
    let store = store_for(git)?;
    let state = store.abort()?;
    git.hard_reset(&state.original_head.oid)?;
    Ok(())
}

fn store_for(git: &Git) -> Result<SequencerStore, WeldError> {
    Ok(SequencerStore::new(WeldPaths::new(git.info()?.common_dir)))
}

fn guard_ready(git: &Git, store: &SequencerStore) -> Result<(), WeldError> {
    if let Some(existing) = store.load()? {
        return Err(SequencerError::AlreadyInProgress {
            kind: existing.kind,
        }
        .into());
    }
    if git.has_conflicts()? {
        return Err(WeldError::user(
            "the index has unresolved conflicts; resolve them first",
        ));
    }
    merge::require_clean_worktree(git)
}

/// Apply the remaining steps of a sequencer record.
///
/// The record is durable for the current step before its commit is
/// created; `advance` persists the next position afterwards.
fn run_steps(
    git: &Git,
    store: &SequencerStore,
    mut state: SequencerState,
    identity: &Identity,
) -> Result<SequenceOutcome, WeldError> {
    let mut applied = Vec::new();

    while let Some(pick) = state.current_commit().cloned() {
        let head = git
            .head_oid()?
            .ok_or_else(|| WeldError::fatal("HEAD vanished mid-operation"))?;

        let mut picked = git.cherrypick_commit(&pick, &head)?;
        let unresolved = merge::resolve_submodule_conflicts(
            git,
            &mut picked,
            SubmoduleOpenPolicy::OpenOnDemand,
            identity,
        )?;

        if picked.has_conflicts() {
            git.install_index(&picked)?;
            let mut paths: Vec<String> =
                unresolved.iter().map(|p| p.to_string()).collect();
            for conflict in picked.conflicts()? {
                if !conflict.is_submodule() {
                    paths.push(conflict.path);
                }
            }
            paths.sort();
            paths.dedup();
            let message = format!(
                "{} of {} paused; fix conflicts in: {} then run 'weld continue' \
                 (or 'weld abort')",
                state.kind,
                pick.short(12),
                paths.join(", ")
            );
            return Ok(SequenceOutcome {
                applied,
                completed: false,
                conflict_paths: paths,
                error_message: Some(message),
            });
        }

        let tree = picked.write_tree(git)?;
        if tree == git.commit_tree_oid(&head)? {
            // Already contained, or a crash re-run of an applied step.
            store.advance(&mut state)?;
            continue;
        }

        let message = git.commit_message(&pick)?;
        let commit = git.create_commit(identity, &message, &tree, &[&head], None)?;
        git.reset_head(&commit, "sequencer: apply")?;
        applied.push(commit);
        store.advance(&mut state)?;
    }

    Ok(SequenceOutcome::completed(applied))
}
