// Snapshot Store Tests
// Persistence, statistics and clearing of ledger snapshots

use flightsurety::config::{ether, MarketConfig};
use flightsurety::identity::Address;
use flightsurety::ledger::LedgerState;
use flightsurety::storage::SnapshotStore;
use tempfile::TempDir;

fn genesis() -> LedgerState {
    LedgerState::genesis(Address::from_label("owner"), "Genesis Air", MarketConfig::default())
}

#[test]
fn test_new_store_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let store = SnapshotStore::open(temp_dir.path()).unwrap();

    assert!(store.is_empty().unwrap());
    assert!(store.load_state().unwrap().is_none());
    assert_eq!(store.load_version().unwrap(), None);
}

#[test]
fn test_state_round_trips_through_disk() {
    let temp_dir = TempDir::new().unwrap();
    let config = MarketConfig::default()
        .with_minimum_funds(ether(5))
        .with_request_max_age(300);

    {
        let store = SnapshotStore::open(temp_dir.path()).unwrap();
        let state = LedgerState::genesis(Address::from_label("owner"), "Genesis Air", config.clone());
        store.save_state(&state).unwrap();
        store.flush().unwrap();
    }

    let store = SnapshotStore::open(temp_dir.path()).unwrap();
    let state = store.load_state().unwrap().unwrap();
    assert_eq!(state.config(), &config);
    assert!(state.airlines().is_airline(&Address::from_label("owner")));
    assert_eq!(
        state.airlines().airline(&Address::from_label("owner")).unwrap().name(),
        "Genesis Air"
    );
}

#[test]
fn test_save_overwrites_previous_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let store = SnapshotStore::open(temp_dir.path()).unwrap();

    store.save_state(&genesis()).unwrap();
    store.save_state(&genesis()).unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.key_count, 2);
    assert_eq!(stats.snapshot_version, Some(0));
}

#[test]
fn test_clear_removes_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let store = SnapshotStore::open(temp_dir.path()).unwrap();
    store.save_state(&genesis()).unwrap();
    assert!(!store.is_empty().unwrap());

    store.clear().unwrap();
    assert!(store.is_empty().unwrap());
    assert_eq!(store.stats().unwrap().key_count, 0);
}
