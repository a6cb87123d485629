//! cli::commands::merge

use crate::cli::commands::open_repo;
use crate::cli::Context;
use crate::core::errors::WeldError;
use crate::merge::{self, MergeMode, MergeOptions, SubmoduleOpenPolicy};

/// Run the merge command.
pub fn merge(
    ctx: &Context,
    commitish: &str,
    ff_only: bool,
    force_commit: bool,
    no_clone: bool,
    message: Option<String>,
) -> Result<(), WeldError> {
    let git = open_repo(ctx)?;
    let theirs = git
        .resolve_commitish(commitish)
        .map_err(|_| WeldError::user(format!("cannot resolve '{commitish}'")))?;

    let mode = if ff_only {
        MergeMode::FfOnly
    } else if force_commit {
        MergeMode::ForceCommit
    } else {
        MergeMode::Normal
    };
    let opts = MergeOptions {
        mode,
        open_policy: if no_clone {
            SubmoduleOpenPolicy::RequireOpen
        } else {
            SubmoduleOpenPolicy::OpenOnDemand
        },
        message,
        identity: git.default_identity()?,
    };

    let outcome = merge::merge(&git, &theirs, &opts)?;
    if let Some(message) = outcome.error_message {
        return Err(WeldError::conflict(message));
    }

    if !ctx.quiet {
        if outcome.up_to_date {
            println!("already up to date");
        } else if outcome.fast_forward {
            println!("fast-forwarded to {commitish}");
        } else if let Some(commit) = &outcome.commit {
            println!("merged '{commitish}' as {}", commit.short(12));
        }
    }
    Ok(())
}
