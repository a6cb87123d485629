//! cli::commands::sequence
//!
//! Handlers for the sequencer-driven operations: rebase, cherry-pick,
//! continue, abort.

use crate::cli::commands::open_repo;
use crate::cli::Context;
use crate::core::errors::WeldError;
use crate::sequencer::{self, SequenceOutcome};

/// Run the rebase command.
pub fn rebase(ctx: &Context, onto: &str) -> Result<(), WeldError> {
    let git = open_repo(ctx)?;
    let onto = git
        .resolve_commitish(onto)
        .map_err(|_| WeldError::user(format!("cannot resolve '{onto}'")))?;
    let identity = git.default_identity()?;
    report(ctx, sequencer::rebase(&git, &onto, &identity)?)
}

/// Run the cherry-pick command.
pub fn cherry_pick(ctx: &Context, commit: &str) -> Result<(), WeldError> {
    let git = open_repo(ctx)?;
    let pick = git
        .resolve_commitish(commit)
        .map_err(|_| WeldError::user(format!("cannot resolve '{commit}'")))?;
    let identity = git.default_identity()?;
    report(ctx, sequencer::cherry_pick(&git, &pick, &identity)?)
}

/// Run the continue command.
pub fn continue_op(ctx: &Context) -> Result<(), WeldError> {
    let git = open_repo(ctx)?;
    let identity = git.default_identity()?;
    report(ctx, sequencer::continue_op(&git, &identity)?)
}

/// Run the abort command.
pub fn abort(ctx: &Context) -> Result<(), WeldError> {
    let git = open_repo(ctx)?;
    sequencer::abort_op(&git)?;
    if !ctx.quiet {
        println!("operation aborted; HEAD restored");
    }
    Ok(())
}

/// Print an outcome, turning a paused operation into a conflict error
/// (exit code 1) after its progress has been reported.
fn report(ctx: &Context, outcome: SequenceOutcome) -> Result<(), WeldError> {
    if !ctx.quiet {
        for commit in &outcome.applied {
            println!("applied {}", commit.short(12));
        }
    }
    if let Some(message) = outcome.error_message {
        return Err(WeldError::conflict(message));
    }
    if !ctx.quiet && outcome.completed {
        println!("done");
    }
    Ok(())
}
