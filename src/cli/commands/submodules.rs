//! cli::commands::submodules
//!
//! Open and close submodule working trees.

use crate::cli::commands::open_repo;
use crate::cli::Context;
use crate::core::errors::WeldError;
use crate::core::types::SubmodulePath;

/// Run the open command: clone and check out a submodule.
pub fn open(ctx: &Context, path: &str) -> Result<(), WeldError> {
    let git = open_repo(ctx)?;
    let path = parse_path(path)?;
    if git.submodule_is_open(&path) {
        if !ctx.quiet {
            println!("submodule '{path}' is already open");
        }
        return Ok(());
    }
    git.clone_submodule(&path)?;
    if !ctx.quiet {
        println!("opened submodule '{path}'");
    }
    Ok(())
}

/// Run the close command: remove a submodule's working tree. The clone
/// under `.git/modules` is kept so reopening is cheap.
pub fn close(ctx: &Context, path: &str) -> Result<(), WeldError> {
    let git = open_repo(ctx)?;
    let path = parse_path(path)?;
    if !git.submodule_is_open(&path) {
        if !ctx.quiet {
            println!("submodule '{path}' is already closed");
        }
        return Ok(());
    }
    git.close_submodule(&path)?;
    if !ctx.quiet {
        println!("closed submodule '{path}'");
    }
    Ok(())
}

fn parse_path(path: &str) -> Result<SubmodulePath, WeldError> {
    SubmodulePath::new(path).map_err(|e| WeldError::user(format!("invalid submodule path: {e}")))
}
