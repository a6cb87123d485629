//! cli
//!
//! Command-line interface layer for Weld.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Delegate to command handlers
//! - Map errors to exit codes (user/conflict errors exit 1, fatal
//!   errors exit 2)
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to
//! the status, merge, sequencer, and push engines. All repository
//! mutations happen below this layer.

pub mod args;
pub mod commands;

pub use args::Cli;

use std::path::PathBuf;

use crate::core::errors::WeldError;

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    /// Run as if started in this directory.
    pub cwd: Option<PathBuf>,
    /// Minimal output.
    pub quiet: bool,
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<(), WeldError> {
    let cli = Cli::parse_args();
    init_logging(cli.debug);

    let ctx = Context {
        cwd: cli.cwd.clone(),
        quiet: cli.quiet,
    };
    commands::dispatch(cli.command, &ctx)
}

/// Initialize env_logger. `--debug` lowers the default filter;
/// `RUST_LOG` still wins.
fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
