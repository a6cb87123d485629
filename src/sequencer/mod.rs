//! sequencer
//!
//! Durable state machine for multi-step operations.
//!
//! # Architecture
//!
//! A rebase, cherry-pick, or conflicted merge spans multiple commits and
//! may be interrupted by a conflict the user must resolve, or by a
//! crash. The sequencer persists a single small record under
//! `.git/weld/sequencer.json` that is the **sole durable mutable record**
//! and the single source of truth for "is an operation in progress".
//!
//! # Crash Safety Contract
//!
//! The record is written (with fsync) **before** any side-effecting
//! commit of the current step is produced. A crash can therefore only
//! leave state consistent with "step N either fully applied or not yet
//! started": resume compares the recorded target with repository state
//! to detect an already-applied step and either skips or safely
//! re-attempts it.
//!
//! # Lifecycle
//!
//! - `start` creates the record at position 0; it fails if a record
//!   already exists
//! - `advance` moves to the next step; at the end of the commit list the
//!   record is deleted (completion)
//! - `abort` deletes the record only; already-applied commits are not
//!   undone, and the caller resets refs separately

mod flows;
mod state;

pub use flows::{abort_op, cherry_pick, continue_op, rebase, SequenceOutcome};
pub use state::{
    CommitAndRef, OpKind, Progress, SequencerError, SequencerState, SequencerStore,
    SEQUENCER_SCHEMA_VERSION,
};
