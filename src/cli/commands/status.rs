//! cli::commands::status
//!
//! Render the status snapshot, humanly or as JSON.

use std::fmt::Write as _;

use crate::cli::commands::open_repo;
use crate::cli::Context;
use crate::core::errors::WeldError;
use crate::status::{get_status, CommitRelation, RepoStatus, StatusOptions, Submodule};

/// Run the status command.
pub fn status(
    ctx: &Context,
    untracked: bool,
    json: bool,
    paths: &[String],
) -> Result<(), WeldError> {
    let git = open_repo(ctx)?;
    let opts = StatusOptions {
        paths: paths.to_vec(),
        include_untracked: untracked,
        show_meta_changes: true,
    };
    let snapshot = get_status(&git, &opts)?;

    if json {
        let rendered = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| WeldError::fatal(format!("cannot serialize status: {e}")))?;
        println!("{rendered}");
        return Ok(());
    }

    print!("{}", render(&snapshot, ctx.quiet));
    Ok(())
}

/// Render a snapshot for humans.
fn render(snapshot: &RepoStatus, quiet: bool) -> String {
    let mut out = String::new();

    match (&snapshot.current_branch, &snapshot.head_commit) {
        (Some(branch), Some(head)) => {
            let _ = writeln!(out, "On branch {branch} at {}", head.short(12));
        }
        (None, Some(head)) => {
            let _ = writeln!(out, "HEAD detached at {}", head.short(12));
        }
        _ => {
            let _ = writeln!(out, "No commits yet");
        }
    }

    if let Some(seq) = &snapshot.sequencer {
        let _ = writeln!(
            out,
            "A {} is in progress (step {} of {}); 'weld continue' or 'weld abort'",
            seq.kind,
            seq.current_index + 1,
            seq.commits.len().max(1)
        );
    }

    if !snapshot.staged.is_empty() {
        let _ = writeln!(out, "\nStaged changes:");
        for (path, st) in &snapshot.staged {
            let _ = writeln!(out, "  {st:?}: {path}");
        }
    }
    if !snapshot.workdir.is_empty() {
        let _ = writeln!(out, "\nWorking tree changes:");
        for (path, st) in &snapshot.workdir {
            let _ = writeln!(out, "  {st:?}: {path}");
        }
    }

    if !snapshot.submodules.is_empty() {
        let _ = writeln!(out, "\nSubmodules:");
        for (path, sm) in &snapshot.submodules {
            let _ = writeln!(out, "  {path}: {}", summarize(sm));
            if quiet {
                continue;
            }
            if let Some(wd) = &sm.workdir {
                if !wd.status.staged.is_empty() || !wd.status.workdir.is_empty() {
                    let staged = wd.status.staged.len();
                    let dirty = wd.status.workdir.len();
                    let _ = writeln!(
                        out,
                        "      {staged} staged, {dirty} working tree change(s) inside"
                    );
                }
            }
        }
    }

    if snapshot.sequencer.is_none()
        && snapshot.staged.is_empty()
        && snapshot.workdir.is_empty()
        && snapshot
            .submodules
            .values()
            .all(|s| s.is_index_clean() && s.is_workdir_clean())
    {
        let _ = writeln!(out, "\nNothing to commit; everything in sync");
    }

    out
}

/// One-line summary of a submodule's state.
fn summarize(sm: &Submodule) -> String {
    match (&sm.commit, &sm.index) {
        (Some(_), None) => "removed from index".to_string(),
        (None, Some(index)) => match &index.sha {
            Some(sha) => format!("newly added at {}", sha.short(12)),
            None => "configured but not staged".to_string(),
        },
        (Some(commit), Some(index)) => {
            let staged = match &index.relation {
                Some(CommitRelation::Same) | None => String::new(),
                Some(rel) => {
                    let sha = index
                        .sha
                        .as_ref()
                        .map(|s| s.short(12))
                        .unwrap_or_default();
                    format!("staged {sha} ({rel} of recorded)")
                }
            };
            let open = match &sm.workdir {
                None => "closed".to_string(),
                Some(wd) => match &wd.relation {
                    Some(CommitRelation::Same) => "open, in sync".to_string(),
                    Some(rel) => format!("open, HEAD {rel} of staged"),
                    None => "open, no commits".to_string(),
                },
            };
            if staged.is_empty() {
                format!("at {}, {open}", commit.sha.short(12))
            } else {
                format!("at {}, {staged}, {open}", commit.sha.short(12))
            }
        }
        (None, None) => "unknown".to_string(),
    }
}
