//! status::model
//!
//! The status data model: an immutable snapshot of the meta-repo and
//! every submodule, with construction-time invariant checking.
//!
//! # Invariants
//!
//! A [`Submodule`] enforces, at construction:
//!
//! - index `None` implies workdir `None` (a deleted submodule is not open)
//! - index `None` implies commit `Some` (cannot be deleted and newly-added
//!   at once)
//! - commit `None` iff `index.relation` is `None`
//! - sha equality iff relation `Same`, for both the index-vs-commit and
//!   workdir-vs-index pairs
//!
//! Violations indicate an impossible repository state and surface as
//! [`StatusError::Invariant`], which callers treat as fatal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{Oid, SubmodulePath};
use crate::git::{FileStatus, GitError};
use crate::sequencer::SequencerState;
use crate::status::relation::CommitRelation;

/// Errors from status computation.
#[derive(Debug, Error)]
pub enum StatusError {
    /// The index reports conflicts without matching stage entries.
    #[error("malformed index: conflicted paths lack stage entries: {paths:?}")]
    MalformedIndex {
        /// The offending paths
        paths: Vec<String>,
    },

    /// An impossible submodule state combination.
    #[error("impossible state for submodule '{path}': {message}")]
    Invariant {
        /// The submodule path
        path: SubmodulePath,
        /// What was violated
        message: String,
    },

    /// Git operation failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Sequencer record could not be read.
    #[error("sequencer state unreadable: {0}")]
    Sequencer(String),
}

/// A submodule as recorded in the parent's current HEAD commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleCommitState {
    /// The gitlink sha in the HEAD tree.
    pub sha: Oid,
    /// The URL recorded in the HEAD commit's `.gitmodules`.
    pub url: String,
}

/// A submodule as recorded in the parent's index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleIndexState {
    /// The staged gitlink sha; `None` when the submodule is configured
    /// but no gitlink is staged yet.
    pub sha: Option<Oid>,
    /// The configured URL.
    pub url: String,
    /// Relation of the staged sha to the HEAD commit's sha.
    /// `None` iff the submodule has no commit state (newly added).
    pub relation: Option<CommitRelation>,
}

/// A submodule's open working repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleWorkdirState {
    /// Full nested status of the open submodule (depth bounded at one
    /// level; the nested status never recurses further).
    pub status: Box<RepoStatus>,
    /// Relation of the submodule's own HEAD to the staged sha.
    /// `None` iff the open submodule has no HEAD commit.
    pub relation: Option<CommitRelation>,
}

/// Everything known about one submodule path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submodule {
    /// State in the parent's HEAD commit; `None` when newly added.
    pub commit: Option<SubmoduleCommitState>,
    /// State in the parent's index; `None` when removed.
    pub index: Option<SubmoduleIndexState>,
    /// State of the open working repository; `None` when closed.
    pub workdir: Option<SubmoduleWorkdirState>,
}

impl Submodule {
    /// Construct a submodule record, checking the state invariants.
    pub fn new(
        path: &SubmodulePath,
        commit: Option<SubmoduleCommitState>,
        index: Option<SubmoduleIndexState>,
        workdir: Option<SubmoduleWorkdirState>,
    ) -> Result<Self, StatusError> {
        let fail = |message: &str| StatusError::Invariant {
            path: path.clone(),
            message: message.to_string(),
        };

        if index.is_none() && workdir.is_some() {
            return Err(fail("deleted from index but reported open"));
        }
        if index.is_none() && commit.is_none() {
            return Err(fail("deleted and newly-added simultaneously"));
        }
        if let Some(index) = &index {
            match (&commit, &index.relation) {
                (None, Some(_)) => {
                    return Err(fail("index relation present without commit state"))
                }
                (Some(_), None) => {
                    return Err(fail("index relation missing despite commit state"))
                }
                (Some(commit), Some(relation)) => {
                    if let Some(sha) = &index.sha {
                        let same = *sha == commit.sha;
                        if same != relation.is_same() {
                            return Err(fail("index sha equality disagrees with relation"));
                        }
                    }
                }
                (None, None) => {}
            }

            if let (Some(workdir), Some(index_sha)) = (&workdir, &index.sha) {
                if let (Some(head), Some(relation)) =
                    (&workdir.status.head_commit, &workdir.relation)
                {
                    let same = head == index_sha;
                    if same != relation.is_same() {
                        return Err(fail("workdir sha equality disagrees with relation"));
                    }
                }
            }
        }

        Ok(Self {
            commit,
            index,
            workdir,
        })
    }

    /// A degraded record for a submodule whose repository could not be
    /// read: known shas kept, every relation `Unknown`.
    pub fn unknown(
        commit: Option<SubmoduleCommitState>,
        index_sha: Option<Oid>,
        url: String,
    ) -> Self {
        let relation = commit.as_ref().map(|_| CommitRelation::Unknown);
        Self {
            commit,
            index: Some(SubmoduleIndexState {
                sha: index_sha,
                url,
                relation,
            }),
            workdir: None,
        }
    }

    /// Whether the staged submodule state matches HEAD.
    pub fn is_index_clean(&self) -> bool {
        match (&self.commit, &self.index) {
            // Removed or newly added: staged change by definition.
            (_, None) | (None, _) => false,
            (Some(_), Some(index)) => {
                matches!(index.relation, Some(CommitRelation::Same))
            }
        }
    }

    /// Whether the open repository's HEAD matches the staged sha.
    /// Closed submodules are trivially clean.
    pub fn is_workdir_clean(&self) -> bool {
        match &self.workdir {
            None => true,
            Some(wd) => matches!(wd.relation, Some(CommitRelation::Same)),
        }
    }
}

/// Immutable status snapshot of one repository.
///
/// For the meta-repo, `submodules` holds one entry per submodule path
/// present in HEAD, index, or working tree. For a nested submodule status
/// the map is always empty (depth bounded at one level).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepoStatus {
    /// The checked-out branch, if HEAD is not detached or unborn.
    pub current_branch: Option<String>,
    /// The HEAD commit, if any.
    pub head_commit: Option<Oid>,
    /// Staged file changes, path -> status.
    pub staged: BTreeMap<String, FileStatus>,
    /// Working tree file changes, path -> status.
    pub workdir: BTreeMap<String, FileStatus>,
    /// Per-submodule state, path -> record.
    pub submodules: BTreeMap<SubmodulePath, Submodule>,
    /// In-progress multi-step operation, if any.
    pub sequencer: Option<SequencerState>,
}

impl RepoStatus {
    /// Whether the meta-repo index is clean: no staged file changes and
    /// no staged submodule changes.
    pub fn is_index_clean(&self) -> bool {
        self.staged.is_empty() && self.submodules.values().all(Submodule::is_index_clean)
    }

    /// Whether the meta-repo working tree is clean. Untracked-only
    /// changes count as dirty only when `all` is set.
    pub fn is_workdir_clean(&self, all: bool) -> bool {
        let files_clean = if all {
            self.workdir.is_empty()
        } else {
            self.workdir
                .values()
                .all(|s| matches!(s, FileStatus::Untracked))
        };
        files_clean && self.submodules.values().all(Submodule::is_workdir_clean)
    }

    /// Deep index cleanliness: the meta index plus every open submodule's
    /// own index.
    pub fn is_index_deep_clean(&self) -> bool {
        self.is_index_clean()
            && self.submodules.values().all(|s| match &s.workdir {
                None => true,
                Some(wd) => wd.status.is_index_clean(),
            })
    }

    /// Deep working tree cleanliness: the meta working tree plus every
    /// open submodule's own working tree.
    pub fn is_workdir_deep_clean(&self, all: bool) -> bool {
        self.is_workdir_clean(all)
            && self.submodules.values().all(|s| match &s.workdir {
                None => true,
                Some(wd) => wd.status.is_workdir_clean(all),
            })
    }

    /// Whether any index (meta or submodule) holds conflict entries.
    pub fn has_conflicts(&self) -> bool {
        let meta = self
            .staged
            .values()
            .any(|s| matches!(s, FileStatus::Conflicted));
        meta || self.submodules.values().any(|s| match &s.workdir {
            None => false,
            Some(wd) => wd
                .status
                .staged
                .values()
                .any(|s| matches!(s, FileStatus::Conflicted)),
        })
    }
}
