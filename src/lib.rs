//! Weld - a CLI for driving a meta-repository of git submodules as one
//! logical repository.
//!
//! A meta-repo is a top-level git repository whose tree entries reference
//! commits in independent submodule repositories. Git has no atomic
//! multi-repository transaction, so weld layers a consistency engine on top:
//! cross-repo status, cross-repo merge with conflict propagation, resumable
//! multi-step operations (rebase, cherry-pick), and submodule-first push
//! ordering.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to the core)
//! - [`core`] - Domain types, identity resolution, error taxonomy, paths
//! - [`git`] - Single interface for all Git operations
//! - [`status`] - Relation classification, submodule state reading, status aggregation
//! - [`sequencer`] - Durable state machine for multi-step operations
//! - [`merge`] - Cross-repository merge engine
//! - [`push`] - Submodule-first push synchronization
//! - [`work`] - Bounded per-submodule worker pool
//!
//! # Correctness Invariants
//!
//! 1. All git I/O flows through the [`git`] interface; no other module
//!    imports git2
//! 2. The sequencer record is written before any side-effecting commit of the
//!    current step, so a crash leaves "step N fully applied or not started"
//! 3. Submodule pushes always precede the meta-repo ref update
//! 4. Work on the same submodule is never executed concurrently

pub mod cli;
pub mod core;
pub mod git;
pub mod merge;
pub mod push;
pub mod sequencer;
pub mod status;
pub mod work;
