//! status::aggregate
//!
//! Assembles the full [`RepoStatus`] snapshot for the meta-repo and its
//! submodules.

use std::collections::BTreeMap;

use crate::core::paths::WeldPaths;
use crate::git::Git;
use crate::sequencer::SequencerStore;
use crate::status::model::{RepoStatus, StatusError};
use crate::status::reader;

/// Options controlling status computation.
#[derive(Debug, Clone)]
pub struct StatusOptions {
    /// Restrict to these pathspecs (empty means everything). Supports
    /// path-scoped `add`/`commit`.
    pub paths: Vec<String>,
    /// Include untracked files in workdir maps.
    pub include_untracked: bool,
    /// Include meta-repo file changes (submodule state is always
    /// reported).
    pub show_meta_changes: bool,
}

impl Default for StatusOptions {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            include_untracked: false,
            show_meta_changes: true,
        }
    }
}

/// Compute the full status snapshot.
///
/// # Errors
///
/// A malformed git state (conflicted entries lacking matching stages)
/// raises [`StatusError::MalformedIndex`], which callers treat as fatal.
/// One submodule's read failure degrades that submodule to unknown
/// without aborting the computation for its siblings.
pub fn get_status(git: &Git, opts: &StatusOptions) -> Result<RepoStatus, StatusError> {
    let malformed = git.malformed_conflict_paths()?;
    if !malformed.is_empty() {
        return Err(StatusError::MalformedIndex { paths: malformed });
    }

    let (staged, workdir) = if opts.show_meta_changes {
        git.file_statuses(&opts.paths, opts.include_untracked)?
    } else {
        (BTreeMap::new(), BTreeMap::new())
    };

    let submodules = reader::read_submodules(git, &opts.paths, opts.include_untracked)?;

    let info = git.info()?;
    let store = SequencerStore::new(WeldPaths::new(info.common_dir));
    let sequencer = store
        .load()
        .map_err(|e| StatusError::Sequencer(e.to_string()))?;

    Ok(RepoStatus {
        current_branch: git.current_branch(),
        head_commit: git.head_oid()?,
        staged,
        workdir,
        submodules,
        sequencer,
    })
}

/// Depth-1 status for an open submodule: file state only, no nested
/// submodules (submodules of submodules are unsupported) and no
/// sequencer.
pub(crate) fn nested_status(
    git: &Git,
    include_untracked: bool,
) -> Result<RepoStatus, StatusError> {
    let (staged, workdir) = git.file_statuses(&[], include_untracked)?;
    Ok(RepoStatus {
        current_branch: git.current_branch(),
        head_commit: git.head_oid()?,
        staged,
        workdir,
        submodules: BTreeMap::new(),
        sequencer: None,
    })
}
