//! Property-based tests for core domain types.
//!
//! These tests use proptest to verify invariants hold across randomly
//! generated inputs.

use proptest::prelude::*;

use git_weld::core::types::{Oid, SubmodulePath};
use git_weld::sequencer::{
    CommitAndRef, OpKind, SequencerState, SEQUENCER_SCHEMA_VERSION,
};
use git_weld::status::CommitRelation;

/// Strategy for valid hex OID strings (40 or 64 chars).
fn valid_oid_string() -> impl Strategy<Value = String> {
    let hex = prop::sample::select(vec![
        '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
    ]);
    prop_oneof![
        prop::collection::vec(hex.clone(), 40),
        prop::collection::vec(hex, 64),
    ]
    .prop_map(|chars| chars.into_iter().collect())
}

/// Strategy for simple relative submodule paths.
fn valid_submodule_path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9_-]{0,8}", 1..4).prop_map(|parts| parts.join("/"))
}

fn any_relation() -> impl Strategy<Value = CommitRelation> {
    prop::sample::select(vec![
        CommitRelation::Same,
        CommitRelation::Ahead,
        CommitRelation::Behind,
        CommitRelation::Unrelated,
        CommitRelation::Unknown,
    ])
}

proptest! {
    #[test]
    fn valid_oids_round_trip(s in valid_oid_string()) {
        let oid = Oid::new(s.clone()).unwrap();
        prop_assert_eq!(oid.as_str(), s.as_str());

        let json = serde_json::to_string(&oid).unwrap();
        let back: Oid = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, oid);
    }

    #[test]
    fn uppercase_oids_normalize_to_lowercase(s in valid_oid_string()) {
        let oid = Oid::new(s.to_uppercase()).unwrap();
        prop_assert_eq!(oid.as_str(), s.as_str());
    }

    #[test]
    fn submodule_paths_normalize_idempotently(s in valid_submodule_path()) {
        let once = SubmodulePath::new(&s).unwrap();
        let twice = SubmodulePath::new(once.as_str()).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn trailing_slash_is_stripped(s in valid_submodule_path()) {
        let plain = SubmodulePath::new(&s).unwrap();
        let slashed = SubmodulePath::new(format!("{s}/")).unwrap();
        prop_assert_eq!(plain, slashed);
    }

    #[test]
    fn relation_invert_is_an_involution(rel in any_relation()) {
        prop_assert_eq!(rel.invert().invert(), rel);
    }

    #[test]
    fn sequencer_records_round_trip_through_json(
        oids in prop::collection::vec(valid_oid_string(), 1..5),
        index in 0usize..5,
    ) {
        let commits: Vec<Oid> = oids.into_iter().map(|s| Oid::new(s).unwrap()).collect();
        prop_assume!(index <= commits.len());

        let state = SequencerState {
            schema_version: SEQUENCER_SCHEMA_VERSION,
            kind: OpKind::Rebase,
            original_head: CommitAndRef {
                oid: commits[0].clone(),
                refname: Some("refs/heads/main".into()),
            },
            target: CommitAndRef::detached(commits[commits.len() - 1].clone()),
            commits,
            current_index: index,
            started_at: "2026-01-01T00:00:00+00:00".into(),
        };

        let json = serde_json::to_string(&state).unwrap();
        let back: SequencerState = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, state);
    }
}
