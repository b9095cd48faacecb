// Storage module - PERSISTENCE
// Ledger snapshots in an embedded sled database

mod store;

pub use store::{SnapshotStore, StorageStats, StoreError};
