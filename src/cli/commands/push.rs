//! cli::commands::push

use crate::cli::commands::open_repo;
use crate::cli::Context;
use crate::core::errors::WeldError;
use crate::push::{self, PushOptions};

/// Run the push command.
pub fn push(
    ctx: &Context,
    remote: String,
    source: Option<String>,
    target: Option<String>,
    force: bool,
) -> Result<(), WeldError> {
    let git = open_repo(ctx)?;
    let opts = PushOptions {
        remote,
        source,
        target,
        force,
    };

    let outcome = push::push(&git, &opts)?;
    if !ctx.quiet {
        for path in &outcome.pushed {
            println!("pushed submodule '{path}'");
        }
        for path in &outcome.up_to_date {
            println!("submodule '{path}' already up to date");
        }
        println!("pushed {}", outcome.meta_ref);
    }
    Ok(())
}
