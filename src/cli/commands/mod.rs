//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! Each handler validates its arguments, calls into the status, merge,
//! sequencer, or push engine, and formats output. Handlers do not mutate
//! the repository directly.

mod commit;
mod merge;
mod push;
mod sequence;
mod status;
mod submodules;

pub use commit::commit;
pub use merge::merge;
pub use push::push;
pub use sequence::{abort, cherry_pick, continue_op, rebase};
pub use status::status;
pub use submodules::{close, open};

use std::path::PathBuf;

use crate::cli::args::Command;
use crate::cli::Context;
use crate::core::errors::WeldError;
use crate::git::Git;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<(), WeldError> {
    match command {
        Command::Status {
            untracked,
            json,
            paths,
        } => status(ctx, untracked, json, &paths),
        Command::Commit {
            message,
            all,
            paths,
        } => commit(ctx, &message, all, &paths),
        Command::Merge {
            commitish,
            ff_only,
            force_commit,
            no_clone,
            message,
        } => merge(ctx, &commitish, ff_only, force_commit, no_clone, message),
        Command::Push {
            remote,
            source,
            target,
            force,
        } => push(ctx, remote, source, target, force),
        Command::Rebase { onto } => rebase(ctx, &onto),
        Command::CherryPick { commit } => cherry_pick(ctx, &commit),
        Command::Continue => continue_op(ctx),
        Command::Abort => abort(ctx),
        Command::Open { path } => open(ctx, &path),
        Command::Close { path } => close(ctx, &path),
    }
}

/// Open the repository the command operates on.
pub(crate) fn open_repo(ctx: &Context) -> Result<Git, WeldError> {
    let cwd = match &ctx.cwd {
        Some(cwd) => cwd.clone(),
        None => current_dir()?,
    };
    Ok(Git::open(&cwd)?)
}

fn current_dir() -> Result<PathBuf, WeldError> {
    std::env::current_dir()
        .map_err(|e| WeldError::fatal(format!("cannot determine working directory: {e}")))
}
