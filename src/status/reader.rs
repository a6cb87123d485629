//! status::reader
//!
//! Gathers per-submodule commit/index/workdir facts.
//!
//! For every submodule path present in HEAD, the index, or the working
//! tree, the reader produces one [`Submodule`] record:
//!
//! - commit state from the HEAD tree gitlink (`None` when newly added)
//! - index state from the index entry (`None` when removed), with its
//!   relation to the commit state
//! - workdir state for open submodules: a nested depth-1 [`RepoStatus`]
//!   plus the relation of the submodule's own HEAD to the staged sha
//!
//! Fact-finding against the meta-repo happens on the control thread;
//! per-submodule reads (which open the submodule's repository) fan out
//! through the bounded worker pool, one task per submodule.
//!
//! A missing or corrupt on-disk submodule repository never aborts the
//! read: that submodule degrades to relation `Unknown` and its siblings
//! are unaffected.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::core::types::{Oid, SubmodulePath};
use crate::git::Git;
use crate::status::aggregate;
use crate::status::model::{
    StatusError, Submodule, SubmoduleCommitState, SubmoduleIndexState, SubmoduleWorkdirState,
};
use crate::status::relation::{classify_shas, CommitRelation};
use crate::work;

/// Everything the per-submodule task needs, gathered up front so the
/// task never touches the meta repository.
struct ReadPlan {
    path: SubmodulePath,
    commit: Option<(Oid, String)>,
    index_sha: Option<Oid>,
    index_url: String,
    /// Present in HEAD but removed from the index.
    deleted: bool,
    /// The submodule's working directory when it is open.
    workdir: Option<PathBuf>,
}

/// Read the state of every submodule, restricted to `paths` when
/// non-empty.
pub fn read_submodules(
    git: &Git,
    paths: &[String],
    include_untracked: bool,
) -> Result<BTreeMap<SubmodulePath, Submodule>, StatusError> {
    let head = git.head_oid()?;
    let (head_links, head_urls) = match &head {
        Some(head) => (git.tree_gitlinks(head)?, git.gitmodules_urls(head)?),
        None => (BTreeMap::new(), BTreeMap::new()),
    };
    let index_links = git.index_gitlinks()?;

    let mut known: BTreeSet<SubmodulePath> = BTreeSet::new();
    known.extend(head_links.keys().cloned());
    known.extend(index_links.keys().cloned());
    known.extend(git.submodule_paths()?);

    let mut plans = Vec::new();
    for path in known {
        if !selected(paths, &path) {
            continue;
        }

        let commit = head_links.get(&path).map(|sha| {
            let url = head_urls
                .get(&path)
                .cloned()
                .or_else(|| git.submodule_url(&path))
                .unwrap_or_default();
            (sha.clone(), url)
        });
        let index_sha = index_links.get(&path).cloned();
        let index_url = git
            .submodule_url(&path)
            .or_else(|| head_urls.get(&path).cloned())
            .unwrap_or_default();
        let deleted = commit.is_some() && index_sha.is_none();
        let workdir = if !deleted && git.submodule_is_open(&path) {
            Some(git.work_dir()?.join(path.as_path()))
        } else {
            None
        };

        plans.push(ReadPlan {
            path,
            commit,
            index_sha,
            index_url,
            deleted,
            workdir,
        });
    }

    let results = work::map_per_submodule(plans, |plan| {
        (plan.path.clone(), read_one(plan, include_untracked))
    });

    let mut submodules = BTreeMap::new();
    for (path, result) in results {
        match result {
            Ok(sm) => {
                submodules.insert(path, sm);
            }
            Err(StatusError::Invariant { path, message }) => {
                // Impossible state combinations are fatal, not degradable.
                return Err(StatusError::Invariant { path, message });
            }
            Err(err) => {
                log::warn!("submodule '{path}' unreadable, degrading to unknown: {err}");
                submodules.insert(path, Submodule::unknown(None, None, String::new()));
            }
        }
    }
    Ok(submodules)
}

/// Read one submodule from its plan. Runs on a worker thread.
fn read_one(plan: &ReadPlan, include_untracked: bool) -> Result<Submodule, StatusError> {
    let commit = plan
        .commit
        .as_ref()
        .map(|(sha, url)| SubmoduleCommitState {
            sha: sha.clone(),
            url: url.clone(),
        });

    if plan.deleted {
        return Submodule::new(&plan.path, commit, None, None);
    }

    // Open the submodule repository if the workdir claims to be open.
    // An unreadable repository degrades this submodule to unknown.
    let sub_git = match &plan.workdir {
        Some(dir) => match Git::open(dir) {
            Ok(git) => Some(git),
            Err(err) => {
                log::warn!("submodule '{}' repository unreadable: {err}", plan.path);
                return Ok(Submodule::unknown(
                    commit,
                    plan.index_sha.clone(),
                    plan.index_url.clone(),
                ));
            }
        },
        None => None,
    };

    let index_relation = commit.as_ref().map(|c| match &plan.index_sha {
        Some(sha) => classify_shas(sub_git.as_ref(), sha, &c.sha),
        None => CommitRelation::Unknown,
    });
    let index = Some(SubmoduleIndexState {
        sha: plan.index_sha.clone(),
        url: plan.index_url.clone(),
        relation: index_relation,
    });

    let workdir = match &sub_git {
        Some(sub) => {
            let status = match aggregate::nested_status(sub, include_untracked) {
                Ok(status) => status,
                Err(err) => {
                    log::warn!("submodule '{}' status unreadable: {err}", plan.path);
                    return Ok(Submodule::unknown(
                        commit,
                        plan.index_sha.clone(),
                        plan.index_url.clone(),
                    ));
                }
            };
            let relation = match (&status.head_commit, &plan.index_sha) {
                (Some(head), Some(index_sha)) => {
                    Some(classify_shas(Some(sub), head, index_sha))
                }
                (Some(_), None) => Some(CommitRelation::Unknown),
                (None, _) => None,
            };
            Some(SubmoduleWorkdirState {
                status: Box::new(status),
                relation,
            })
        }
        None => None,
    };

    Submodule::new(&plan.path, commit, index, workdir)
}

/// Whether a submodule path is selected by the pathspec filter.
///
/// Empty filter selects everything. Otherwise a submodule matches a spec
/// that names it, a parent directory of it, or a path inside it (so a
/// path-scoped commit of `libs/parser/src/lib.rs` touches `libs/parser`).
fn selected(paths: &[String], sub: &SubmodulePath) -> bool {
    if paths.is_empty() {
        return true;
    }
    paths.iter().any(|spec| {
        let spec = spec.trim_end_matches('/');
        let sub = sub.as_str();
        spec == sub
            || sub.starts_with(&format!("{spec}/"))
            || spec.starts_with(&format!("{sub}/"))
    })
}
