//! status
//!
//! The cross-repository status engine.
//!
//! # Architecture
//!
//! Three layers, bottom up:
//!
//! - [`relation`] - classifies the ancestry relation between two commits
//! - [`reader`] - gathers per-submodule commit/index/workdir facts
//! - [`aggregate`] - assembles the full [`RepoStatus`] tree for the
//!   meta-repo and every open submodule
//!
//! A [`RepoStatus`] is an immutable value snapshot, recomputed on demand
//! and never cached long-term. Submodule recursion is bounded at one
//! physical level: an open submodule's entry embeds its own `RepoStatus`,
//! but submodules of submodules are unsupported.
//!
//! # Failure model
//!
//! A malformed meta-repo index (conflict markers without stage entries) is
//! a fatal status error. One submodule's read failure degrades that
//! submodule to relation `Unknown` without aborting status computation for
//! its siblings.

pub mod aggregate;
pub mod model;
pub mod reader;
pub mod relation;

pub use aggregate::{get_status, StatusOptions};
pub use model::{
    RepoStatus, StatusError, Submodule, SubmoduleCommitState, SubmoduleIndexState,
    SubmoduleWorkdirState,
};
pub use relation::{classify, CommitRelation};
