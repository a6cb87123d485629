//! sequencer::state
//!
//! The persisted sequencer record and its store.
//!
//! The record is stored as pretty-printed JSON so a user can inspect it
//! with a pager when deciding whether to continue or abort. Writes go
//! through a temp file with fsync and an atomic rename.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::paths::WeldPaths;
use crate::core::types::Oid;

/// Schema version of the persisted record. Bumped on incompatible
/// layout changes; a mismatch on load tells the user to abort with a
/// matching binary.
pub const SEQUENCER_SCHEMA_VERSION: u32 = 1;

/// Errors from sequencer state handling.
#[derive(Debug, Error)]
pub enum SequencerError {
    /// I/O error reading or writing the record.
    #[error("sequencer i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("sequencer record corrupt: {0}")]
    Json(#[from] serde_json::Error),

    /// An operation is already in progress.
    #[error("a {kind} is already in progress (resolve it with 'weld continue' or 'weld abort')")]
    AlreadyInProgress {
        /// The in-progress operation kind
        kind: OpKind,
    },

    /// No operation is in progress.
    #[error("no operation in progress")]
    NotInProgress,

    /// The record was written by an incompatible binary.
    #[error(
        "sequencer record has schema v{found}, this binary expects v{expected}; \
         abort with a matching binary version"
    )]
    SchemaMismatch {
        /// Version found on disk
        found: u32,
        /// Version this binary writes
        expected: u32,
    },

    /// The record's position is outside its commit list.
    #[error("sequencer record inconsistent: position {position} of {total} commits")]
    PositionOutOfRange {
        /// Recorded position
        position: usize,
        /// Number of commits
        total: usize,
    },
}

/// The kind of multi-step operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Replaying a commit range onto a new base.
    Rebase,
    /// Replaying explicit commits onto HEAD.
    CherryPick,
    /// A merge paused on conflicts.
    Merge,
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OpKind::Rebase => "rebase",
            OpKind::CherryPick => "cherry-pick",
            OpKind::Merge => "merge",
        };
        write!(f, "{s}")
    }
}

/// A commit plus the ref it was resolved from, when there was one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAndRef {
    /// The commit.
    pub oid: Oid,
    /// The full ref name it came from, if any.
    pub refname: Option<String>,
}

impl CommitAndRef {
    /// A commit with no originating ref.
    pub fn detached(oid: Oid) -> Self {
        Self { oid, refname: None }
    }
}

/// The persisted record of an in-progress multi-step operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerState {
    /// Record layout version.
    pub schema_version: u32,
    /// What kind of operation is running.
    pub kind: OpKind,
    /// HEAD when the operation began (abort resets here).
    pub original_head: CommitAndRef,
    /// What the operation is applying onto/merging in.
    pub target: CommitAndRef,
    /// The ordered commits to apply.
    pub commits: Vec<Oid>,
    /// Index of the step currently being applied.
    pub current_index: usize,
    /// RFC3339 timestamp of when the operation began.
    pub started_at: String,
}

impl SequencerState {
    /// The commit for the current step, or `None` when all steps are done.
    pub fn current_commit(&self) -> Option<&Oid> {
        self.commits.get(self.current_index)
    }

    /// Whether every step has been applied.
    pub fn is_done(&self) -> bool {
        self.current_index >= self.commits.len()
    }
}

/// Result of advancing the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// More steps remain; the new position is given.
    InProgress(usize),
    /// All steps applied; the record has been deleted.
    Completed,
}

/// Durable storage for the sequencer record.
#[derive(Debug, Clone)]
pub struct SequencerStore {
    paths: WeldPaths,
}

impl SequencerStore {
    /// Create a store rooted at the repository's weld storage.
    pub fn new(paths: WeldPaths) -> Self {
        Self { paths }
    }

    fn file(&self) -> PathBuf {
        self.paths.sequencer_file()
    }

    /// Whether a record exists on disk.
    pub fn exists(&self) -> bool {
        self.file().exists()
    }

    /// Load the record, if any.
    ///
    /// # Errors
    ///
    /// - [`SequencerError::SchemaMismatch`] for records from an
    ///   incompatible binary
    /// - [`SequencerError::Json`] for corrupt records
    pub fn load(&self) -> Result<Option<SequencerState>, SequencerError> {
        let path = self.file();
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SequencerError::Io(e)),
        };
        let state: SequencerState = serde_json::from_str(&json)?;

        if state.schema_version != SEQUENCER_SCHEMA_VERSION {
            return Err(SequencerError::SchemaMismatch {
                found: state.schema_version,
                expected: SEQUENCER_SCHEMA_VERSION,
            });
        }
        if state.current_index > state.commits.len() {
            return Err(SequencerError::PositionOutOfRange {
                position: state.current_index,
                total: state.commits.len(),
            });
        }
        Ok(Some(state))
    }

    /// Begin a new operation at position 0.
    ///
    /// Fails with [`SequencerError::AlreadyInProgress`] if a record
    /// already exists. The record is durably written before returning.
    pub fn start(
        &self,
        kind: OpKind,
        original_head: CommitAndRef,
        target: CommitAndRef,
        commits: Vec<Oid>,
    ) -> Result<SequencerState, SequencerError> {
        if let Some(existing) = self.load()? {
            return Err(SequencerError::AlreadyInProgress {
                kind: existing.kind,
            });
        }

        let state = SequencerState {
            schema_version: SEQUENCER_SCHEMA_VERSION,
            kind,
            original_head,
            target,
            commits,
            current_index: 0,
            started_at: Utc::now().to_rfc3339(),
        };
        self.save(&state)?;
        Ok(state)
    }

    /// Durably write the record.
    ///
    /// Must be called before the current step's side-effecting commit is
    /// produced. Uses write-to-temp, fsync, rename.
    pub fn save(&self, state: &SequencerState) -> Result<(), SequencerError> {
        let dir = self.paths.storage_dir();
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(state)?;
        let tmp = dir.join("sequencer.json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.file())?;
        Ok(())
    }

    /// Advance past the current step.
    ///
    /// Persists the new position, or deletes the record when the last
    /// step was applied.
    pub fn advance(&self, state: &mut SequencerState) -> Result<Progress, SequencerError> {
        state.current_index += 1;
        if state.is_done() {
            self.clear()?;
            Ok(Progress::Completed)
        } else {
            self.save(state)?;
            Ok(Progress::InProgress(state.current_index))
        }
    }

    /// Abort the operation, discarding progress markers only.
    ///
    /// Already-applied on-disk commits are not undone; the caller resets
    /// refs separately.
    pub fn abort(&self) -> Result<SequencerState, SequencerError> {
        let state = self.load()?.ok_or(SequencerError::NotInProgress)?;
        self.clear()?;
        Ok(state)
    }

    /// Delete the record if present.
    pub fn clear(&self) -> Result<(), SequencerError> {
        match fs::remove_file(self.file()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SequencerError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn oid(c: char) -> Oid {
        Oid::new(c.to_string().repeat(40)).unwrap()
    }

    fn store(dir: &TempDir) -> SequencerStore {
        SequencerStore::new(WeldPaths::new(dir.path()))
    }

    fn start_rebase(store: &SequencerStore, commits: Vec<Oid>) -> SequencerState {
        store
            .start(
                OpKind::Rebase,
                CommitAndRef {
                    oid: oid('a'),
                    refname: Some("refs/heads/main".into()),
                },
                CommitAndRef::detached(oid('b')),
                commits,
            )
            .unwrap()
    }

    #[test]
    fn start_persists_at_position_zero() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let state = start_rebase(&store, vec![oid('c'), oid('d')]);

        assert_eq!(state.current_index, 0);
        assert_eq!(state.current_commit(), Some(&oid('c')));
        assert!(store.exists());
    }

    #[test]
    fn start_fails_when_record_exists() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        start_rebase(&store, vec![oid('c')]);

        let err = store.start(
            OpKind::CherryPick,
            CommitAndRef::detached(oid('a')),
            CommitAndRef::detached(oid('b')),
            vec![oid('d')],
        );
        assert!(matches!(
            err,
            Err(SequencerError::AlreadyInProgress {
                kind: OpKind::Rebase
            })
        ));
    }

    #[test]
    fn advance_then_reload_resumes_at_new_position() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut state = start_rebase(&store, vec![oid('c'), oid('d'), oid('e')]);

        assert_eq!(
            store.advance(&mut state).unwrap(),
            Progress::InProgress(1)
        );

        // Simulate a process restart: reload from disk.
        let reloaded = store.load().unwrap().unwrap();
        assert_eq!(reloaded.current_index, 1);
        assert_eq!(reloaded.commits, vec![oid('c'), oid('d'), oid('e')]);
        assert_eq!(reloaded.kind, OpKind::Rebase);
    }

    #[test]
    fn advancing_past_last_step_completes_and_deletes() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut state = start_rebase(&store, vec![oid('c')]);

        assert_eq!(store.advance(&mut state).unwrap(), Progress::Completed);
        assert!(!store.exists());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn abort_deletes_record_and_returns_state() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        start_rebase(&store, vec![oid('c')]);

        let state = store.abort().unwrap();
        assert_eq!(state.original_head.oid, oid('a'));
        assert!(!store.exists());

        assert!(matches!(
            store.abort(),
            Err(SequencerError::NotInProgress)
        ));
    }

    #[test]
    fn schema_mismatch_is_detected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut state = start_rebase(&store, vec![oid('c')]);
        state.schema_version = 99;
        store.save(&state).unwrap();

        assert!(matches!(
            store.load(),
            Err(SequencerError::SchemaMismatch {
                found: 99,
                expected: SEQUENCER_SCHEMA_VERSION
            })
        ));
    }

    #[test]
    fn record_is_human_inspectable_json() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        start_rebase(&store, vec![oid('c')]);

        let raw = std::fs::read_to_string(store.file()).unwrap();
        assert!(raw.contains("\"kind\": \"rebase\""));
        assert!(raw.contains("\"current_index\": 0"));
    }
}
