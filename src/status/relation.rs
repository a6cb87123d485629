//! status::relation
//!
//! Ancestry classification between two commits.
//!
//! [`classify`] never fails: an unresolvable commit on either side yields
//! [`CommitRelation::Unknown`] and the caller decides whether to skip or
//! abort. Classification uses git's bounded ancestry-graph walk
//! (generation numbers), never a full history materialization.

use serde::{Deserialize, Serialize};

use crate::core::types::Oid;
use crate::git::Git;

/// The ancestry relation of commit `a` with respect to commit `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitRelation {
    /// The commits are identical.
    Same,
    /// `a` is a strict descendant of `b`.
    Ahead,
    /// `a` is a strict ancestor of `b`.
    Behind,
    /// The commits share no ancestry.
    Unrelated,
    /// One of the commits cannot be resolved locally.
    Unknown,
}

impl CommitRelation {
    /// The classification with the arguments swapped.
    ///
    /// `classify(a, b).invert() == classify(b, a)` for all commits.
    pub fn invert(self) -> Self {
        match self {
            CommitRelation::Ahead => CommitRelation::Behind,
            CommitRelation::Behind => CommitRelation::Ahead,
            other => other,
        }
    }

    /// Whether the two commits are the same.
    pub fn is_same(self) -> bool {
        matches!(self, CommitRelation::Same)
    }
}

impl std::fmt::Display for CommitRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CommitRelation::Same => "same",
            CommitRelation::Ahead => "ahead",
            CommitRelation::Behind => "behind",
            CommitRelation::Unrelated => "unrelated",
            CommitRelation::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Classify the ancestry relation of `a` with respect to `b`.
///
/// - `a == b` yields `Same`
/// - `a` strict descendant of `b` yields `Ahead`
/// - `a` strict ancestor of `b` yields `Behind`
/// - disjoint histories yield `Unrelated`
/// - either commit unresolvable yields `Unknown` (never an error)
pub fn classify(git: &Git, a: &Oid, b: &Oid) -> CommitRelation {
    if a == b {
        return CommitRelation::Same;
    }
    if !git.commit_exists(a) || !git.commit_exists(b) {
        return CommitRelation::Unknown;
    }

    match git.is_descendant_of(a, b) {
        Ok(true) => CommitRelation::Ahead,
        Ok(false) => match git.is_descendant_of(b, a) {
            Ok(true) => CommitRelation::Behind,
            Ok(false) => CommitRelation::Unrelated,
            Err(_) => CommitRelation::Unknown,
        },
        Err(_) => CommitRelation::Unknown,
    }
}

/// Classify two shas when the repository that could walk their ancestry
/// may not be open.
///
/// Sha equality alone proves `Same`; anything else without a repository
/// is `Unknown`.
pub fn classify_shas(git: Option<&Git>, a: &Oid, b: &Oid) -> CommitRelation {
    if a == b {
        return CommitRelation::Same;
    }
    match git {
        Some(git) => classify(git, a, b),
        None => CommitRelation::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_swaps_ahead_and_behind() {
        assert_eq!(CommitRelation::Ahead.invert(), CommitRelation::Behind);
        assert_eq!(CommitRelation::Behind.invert(), CommitRelation::Ahead);
    }

    #[test]
    fn invert_is_identity_on_symmetric_relations() {
        for rel in [
            CommitRelation::Same,
            CommitRelation::Unrelated,
            CommitRelation::Unknown,
        ] {
            assert_eq!(rel.invert(), rel);
        }
    }

    #[test]
    fn classify_shas_without_repo() {
        let a = Oid::new("a".repeat(40)).unwrap();
        let b = Oid::new("b".repeat(40)).unwrap();
        assert_eq!(classify_shas(None, &a, &a), CommitRelation::Same);
        assert_eq!(classify_shas(None, &a, &b), CommitRelation::Unknown);
    }
}
