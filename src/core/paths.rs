//! core::paths
//!
//! Centralized path routing for weld storage locations.
//!
//! All weld data lives under `<common_dir>/weld/`:
//! - `sequencer.json` - durable record of an in-progress multi-step operation
//!
//! No code outside this module may compute `*.join("weld")` paths. Routing
//! through one helper keeps linked worktrees correct: repo-scoped storage
//! always uses the shared `common_dir`, never the per-worktree `git_dir`.

use std::path::{Path, PathBuf};

/// Centralized path routing for weld storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeldPaths {
    /// Path to the shared git directory (refs, objects, config).
    /// For linked worktrees this is the parent repo's git dir.
    common_dir: PathBuf,
}

impl WeldPaths {
    /// Create paths rooted at a repository's common git directory.
    pub fn new(common_dir: impl Into<PathBuf>) -> Self {
        Self {
            common_dir: common_dir.into(),
        }
    }

    /// The weld storage directory, `<common_dir>/weld`.
    pub fn storage_dir(&self) -> PathBuf {
        self.common_dir.join("weld")
    }

    /// The sequencer record, `<common_dir>/weld/sequencer.json`.
    pub fn sequencer_file(&self) -> PathBuf {
        self.storage_dir().join("sequencer.json")
    }

    /// The common git directory this routing is rooted at.
    pub fn common_dir(&self) -> &Path {
        &self.common_dir
    }
}
