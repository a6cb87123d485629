//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! Available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Weld - meta-repository orchestration over git submodules
#[derive(Parser, Debug)]
#[command(name = "weld")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if weld was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the state of the meta-repo and every submodule
    #[command(
        long_about = "Show the state of the meta-repo and every submodule.\n\n\
            For each submodule, status reports the commit recorded by HEAD, the \
            commit staged in the index, and (for open submodules) the submodule's \
            own working state, each annotated with its ancestry relation: same, \
            ahead, behind, unrelated, or unknown."
    )]
    Status {
        /// Include untracked files
        #[arg(short = 'u', long)]
        untracked: bool,

        /// Emit the full status as JSON
        #[arg(long)]
        json: bool,

        /// Restrict to these paths
        paths: Vec<String>,
    },

    /// Commit staged changes across the meta-repo and its submodules
    #[command(
        long_about = "Commit staged changes across the meta-repo and its submodules.\n\n\
            Open submodules with staged changes are committed first (with the same \
            message), their new commits are staged as gitlinks, and then the \
            meta-repo commit is created. With --all, working tree changes are \
            staged everywhere before committing."
    )]
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Stage modified and deleted files before committing
        #[arg(short, long)]
        all: bool,

        /// Restrict to these paths
        paths: Vec<String>,
    },

    /// Merge another meta-repo commit, resolving submodule pointers by ancestry
    #[command(
        long_about = "Merge another meta-repo commit into HEAD.\n\n\
            Submodule pointer conflicts are resolved inside the submodules \
            themselves: a strict descendant wins, and diverged histories are \
            merged three-way from their common base. Remaining conflicts leave \
            the index conflicted for 'weld continue' or 'weld abort'."
    )]
    Merge {
        /// Commit, branch, or tag to merge
        commitish: String,

        /// Fast-forward or fail; never create a merge commit
        #[arg(long, conflicts_with = "force_commit")]
        ff_only: bool,

        /// Always create a merge commit, even for fast-forwards
        #[arg(long)]
        force_commit: bool,

        /// Refuse to clone closed submodules during conflict resolution
        #[arg(long)]
        no_clone: bool,

        /// Override the merge commit message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Push a branch, submodule commits first
    #[command(
        long_about = "Push a branch and every submodule commit it references.\n\n\
            Submodule commits the outgoing meta commits point at are pushed (or \
            verified present) before the meta ref moves, so the remote never \
            references unpublished submodule commits."
    )]
    Push {
        /// Remote to push to
        #[arg(default_value = "origin")]
        remote: String,

        /// Branch to push (defaults to the current branch)
        #[arg(long)]
        source: Option<String>,

        /// Remote branch to update (defaults to the source branch)
        #[arg(long)]
        target: Option<String>,

        /// Allow non-fast-forward updates
        #[arg(short, long)]
        force: bool,
    },

    /// Replay the current branch's commits onto another commit
    Rebase {
        /// Commit, branch, or tag to rebase onto
        onto: String,
    },

    /// Apply a single commit onto HEAD
    CherryPick {
        /// Commit to apply
        commit: String,
    },

    /// Resume the in-progress merge, rebase, or cherry-pick
    Continue,

    /// Abandon the in-progress operation and restore the original HEAD
    Abort,

    /// Clone and check out a submodule
    Open {
        /// Submodule path
        path: String,
    },

    /// Remove a submodule's working tree (the clone is kept)
    Close {
        /// Submodule path
        path: String,
    },
}
