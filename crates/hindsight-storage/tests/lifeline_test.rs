//! Lifeline engine: commit, idempotence, supersession, point-in-time.

mod common;

use common::*;
use hindsight_core::record::END_OF_TIME;
use hindsight_core::selector::LifelineFilter;
use hindsight_core::StoreError;
use hindsight_storage::engine::ScanRequest;
use rusqlite::types::Value;

fn division_key(division: i64) -> Vec<(&'static str, Value)> {
    vec![("division", Value::Integer(division))]
}

#[test]
fn first_commit_inserts_live_with_fresh_identity() {
    let engine = engine();
    let committed = engine.commit(balance(42, 100, 1, 5000)).unwrap();

    let cid = committed.envelope.cid.expect("identity assigned");
    assert!(cid > 0);
    assert!(committed.envelope.is_live());
    assert_eq!(engine.count_history::<WalletBalance>(owner(42)).unwrap(), 1);
    assert_eq!(engine.count_live::<WalletBalance>(owner(42)).unwrap(), 1);
}

#[test]
fn recommitting_equivalent_payload_grows_no_history() {
    let engine = engine();
    let first = engine.commit(balance(42, 100, 1, 5000)).unwrap();

    // Same business fields, later observation time.
    let second = engine.commit(balance(42, 300, 1, 5000)).unwrap();

    assert_eq!(second.envelope.cid, first.envelope.cid);
    assert_eq!(second.envelope.life_start, 100, "existing version untouched");
    assert_eq!(engine.count_history::<WalletBalance>(owner(42)).unwrap(), 1);

    let at_350: WalletBalance = engine
        .get(BALANCE_MASK, owner(42), &division_key(1), 350)
        .unwrap()
        .unwrap();
    assert_eq!(at_350.envelope.cid, first.envelope.cid);
}

#[test]
fn changed_payload_retires_old_and_inserts_new() {
    let engine = engine();
    let a = engine.commit(balance(42, 100, 1, 5000)).unwrap();
    let b = engine.commit(balance(42, 200, 1, 7500)).unwrap();

    assert_ne!(a.envelope.cid, b.envelope.cid);
    assert_eq!(engine.count_history::<WalletBalance>(owner(42)).unwrap(), 2);
    assert_eq!(engine.count_live::<WalletBalance>(owner(42)).unwrap(), 1);

    // get(42, division 1, 150) sees the old value, 250 the new, 50 nothing.
    let at_150: WalletBalance = engine
        .get(BALANCE_MASK, owner(42), &division_key(1), 150)
        .unwrap()
        .unwrap();
    assert_eq!(at_150.envelope.cid, a.envelope.cid);
    assert_eq!(at_150.balance, 5000);
    assert_eq!(at_150.envelope.life_end, 200, "retired at the transition");

    let at_250: WalletBalance = engine
        .get(BALANCE_MASK, owner(42), &division_key(1), 250)
        .unwrap()
        .unwrap();
    assert_eq!(at_250.envelope.cid, b.envelope.cid);
    assert_eq!(at_250.balance, 7500);

    assert!(engine
        .get::<WalletBalance>(BALANCE_MASK, owner(42), &division_key(1), 50)
        .unwrap()
        .is_none());
}

#[test]
fn lifeline_partition_has_no_gaps_or_overlaps() {
    let engine = engine();
    for (t, amount) in [(100, 1), (200, 2), (300, 3), (400, 4)] {
        engine.commit(balance(42, t, 1, amount)).unwrap();
    }

    let history: Vec<WalletBalance> = engine
        .scan(
            BALANCE_MASK,
            &ScanRequest::new(owner(42), LifelineFilter::Any),
            None,
        )
        .unwrap();
    assert_eq!(history.len(), 4);

    assert_eq!(history[0].envelope.life_start, 100);
    for pair in history.windows(2) {
        assert_eq!(
            pair[0].envelope.life_end, pair[1].envelope.life_start,
            "intervals must tile with no gap"
        );
    }
    assert_eq!(history.last().unwrap().envelope.life_end, END_OF_TIME);
    assert_eq!(engine.count_live::<WalletBalance>(owner(42)).unwrap(), 1);
}

#[test]
fn commit_before_live_life_start_is_invariant_violation() {
    let engine = engine();
    engine.commit(balance(42, 200, 1, 5000)).unwrap();

    let stale = balance(42, 150, 1, 9999);
    let err = engine.commit(stale).unwrap_err();
    assert!(matches!(err, StoreError::InvariantViolation { .. }));

    // Equal life_start is just as impossible under half-open intervals.
    let same_instant = balance(42, 200, 1, 9999);
    assert!(matches!(
        engine.commit(same_instant).unwrap_err(),
        StoreError::InvariantViolation { .. }
    ));
    assert_eq!(engine.count_history::<WalletBalance>(owner(42)).unwrap(), 1);
}

#[test]
fn commit_rejects_non_live_candidate() {
    let engine = engine();
    let mut candidate = balance(42, 100, 1, 5000);
    candidate.envelope.retire(200).unwrap();

    assert!(matches!(
        engine.commit(candidate).unwrap_err(),
        StoreError::InvalidState { .. }
    ));
}

#[test]
fn identities_are_independent() {
    let engine = engine();
    engine.commit(balance(42, 100, 1, 5000)).unwrap();
    engine.commit(balance(42, 100, 2, 800)).unwrap();
    engine.commit(balance(42, 200, 1, 6000)).unwrap();

    // Division 2 is untouched by division 1's supersession.
    let div2: WalletBalance = engine
        .get(BALANCE_MASK, owner(42), &division_key(2), 250)
        .unwrap()
        .unwrap();
    assert!(div2.envelope.is_live());
    assert_eq!(div2.envelope.life_start, 100);
    assert_eq!(engine.count_live::<WalletBalance>(owner(42)).unwrap(), 2);
}

#[test]
fn singleton_shape_versions_through_empty_natural_key() {
    let engine = engine();
    let v1 = engine.commit(sheet(42, 100, "Alpha Holdings")).unwrap();
    let v2 = engine.commit(sheet(42, 200, "Alpha Holdings Ltd")).unwrap();
    assert_ne!(v1.envelope.cid, v2.envelope.cid);
    assert_eq!(engine.count_live::<ProfileSheet>(owner(42)).unwrap(), 1);

    // A different owner has its own singleton lifeline.
    engine.commit(sheet(7, 100, "Beta Corp")).unwrap();
    let beta: ProfileSheet = engine
        .get(SHEET_MASK, owner(7), &[], 150)
        .unwrap()
        .unwrap();
    assert_eq!(beta.name, "Beta Corp");

    let alpha_at_150: ProfileSheet = engine
        .get(SHEET_MASK, owner(42), &[], 150)
        .unwrap()
        .unwrap();
    assert_eq!(alpha_at_150.name, "Alpha Holdings");
}

#[test]
fn incoming_identity_is_cleared_not_trusted() {
    let engine = engine();
    let committed = engine.commit(balance(42, 100, 1, 5000)).unwrap();

    // A worker re-submitting a loaded record with changed payload must
    // get a fresh identity, not overwrite the existing row.
    let mut resubmit = committed.clone();
    resubmit.envelope.life_start = 200;
    resubmit.balance = 6000;
    let next = engine.commit(resubmit).unwrap();

    assert_ne!(next.envelope.cid, committed.envelope.cid);
    assert_eq!(engine.count_history::<WalletBalance>(owner(42)).unwrap(), 2);
}

#[test]
fn derived_fields_are_recomputed_on_load() {
    let engine = engine();
    engine
        .commit(asset(42, 100, 10, None, "Cargo Container", 3, &[]))
        .unwrap();

    let loaded: Asset = engine
        .get(ASSET_MASK, owner(42), &[("item_id", Value::Integer(10))], 150)
        .unwrap()
        .unwrap();
    assert_eq!(loaded.display, "Cargo Container x3");
}
