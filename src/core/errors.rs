//! core::errors
//!
//! Top-level error taxonomy.
//!
//! Every failure weld reports falls into one of three categories:
//!
//! - **User**: bad input (invalid path, unknown remote, no repository).
//!   Reported verbatim; nothing is persisted.
//! - **Conflict**: a content or structural conflict during merge, rebase,
//!   or cherry-pick. The index is left conflicted and the sequencer record
//!   persisted so the user can resolve and continue.
//! - **Fatal**: repository state is unreadable or inconsistent (corrupted
//!   index, impossible submodule combination). Propagated without recovery;
//!   already-committed objects are never corrupted.
//!
//! The category determines the process exit code: User and Conflict exit 1,
//! Fatal exits 2. Lower-level module errors ([`GitError`], sequencer and
//! status errors) are wrapped here with enough context to classify them.

use thiserror::Error;

use crate::git::GitError;
use crate::sequencer::SequencerError;
use crate::status::StatusError;

/// Top-level weld error.
#[derive(Debug, Error)]
pub enum WeldError {
    /// Bad input from the user.
    #[error("{0}")]
    User(String),

    /// A merge/rebase/cherry-pick conflict the user must resolve.
    #[error("{0}")]
    Conflict(String),

    /// Unreadable or inconsistent repository state.
    #[error("fatal: {0}")]
    Fatal(String),

    /// Git operation failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Status computation failed.
    #[error(transparent)]
    Status(#[from] StatusError),

    /// Sequencer state handling failed.
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
}

impl WeldError {
    /// Convenience constructor for user errors.
    pub fn user(msg: impl Into<String>) -> Self {
        WeldError::User(msg.into())
    }

    /// Convenience constructor for conflict errors.
    pub fn conflict(msg: impl Into<String>) -> Self {
        WeldError::Conflict(msg.into())
    }

    /// Convenience constructor for fatal errors.
    pub fn fatal(msg: impl Into<String>) -> Self {
        WeldError::Fatal(msg.into())
    }

    /// Map this error to a process exit code.
    ///
    /// 1 for user/conflict errors, 2 for fatal/internal errors.
    pub fn exit_code(&self) -> u8 {
        match self {
            WeldError::User(_) | WeldError::Conflict(_) => 1,
            WeldError::Fatal(_) => 2,
            WeldError::Git(err) => match err {
                GitError::NotARepo { .. }
                | GitError::RefNotFound { .. }
                | GitError::RemoteNotFound { .. } => 1,
                _ => 2,
            },
            WeldError::Status(_) => 2,
            WeldError::Sequencer(err) => match err {
                SequencerError::AlreadyInProgress { .. } | SequencerError::NotInProgress => 1,
                _ => 2,
            },
        }
    }
}
