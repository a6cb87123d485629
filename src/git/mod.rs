//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **only doorway** to Git. All repository reads and
//! writes flow through this interface; no other module imports `git2`.
//! It exposes exactly the capability set the core needs:
//! open/lookup commit/tree/index, create commit, reset, fetch, push,
//! resolve ref, and tree diffs.
//!
//! # Responsibilities
//!
//! - Repository and submodule discovery and opening
//! - Ref reads and head movement
//! - Ancestry queries (merge-base, is-descendant)
//! - Tree/index reads, gitlink staging, commit creation
//! - In-memory merge/cherry-pick indexes
//! - Remote fetch/push
//!
//! # Invariants
//!
//! - Errors are normalized into typed [`GitError`] categories, with
//!   submodule path context attached at the recursion boundary
//! - All operations return strong types ([`crate::core::Oid`],
//!   [`crate::core::SubmodulePath`])

mod interface;

pub use interface::{
    ConflictSides, FileStatus, Git, GitError, MergeIndex, RepoInfo, StageSide, TreeChange,
};
