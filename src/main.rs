//! Binary entry point for `weld`.
//!
//! Exit codes: 0 success, 1 user/conflict error, 2 fatal/internal error.

use std::process::ExitCode;

fn main() -> ExitCode {
    match git_weld::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
