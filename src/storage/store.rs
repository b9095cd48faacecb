// SnapshotStore - Persistent ledger snapshots using sled
//
// Holds the last committed LedgerState so a market can be reopened after a
// restart. Each commit overwrites the snapshot atomically.

use crate::ledger::{LedgerState, LedgerStateError};
use std::path::Path;
use thiserror::Error;

/// Key layout
mod keys {
    pub const LEDGER_STATE: &[u8] = b"ledger:state";
    pub const LEDGER_VERSION: &[u8] = b"ledger:version";
}

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

impl From<LedgerStateError> for StoreError {
    fn from(err: LedgerStateError) -> Self {
        match err {
            LedgerStateError::SerializationFailed(e) => StoreError::SerializationFailed(e),
            LedgerStateError::DeserializationFailed(e) => StoreError::DeserializationFailed(e),
        }
    }
}

/// Statistics about the storage
#[derive(Clone, Debug)]
pub struct StorageStats {
    /// Number of keys in the database
    pub key_count: usize,
    /// Approximate disk size in bytes
    pub disk_size_bytes: u64,
    /// Version of the stored snapshot, if any
    pub snapshot_version: Option<u64>,
}

/// Persistent snapshot store for ledger state
pub struct SnapshotStore {
    db: sled::Db,
}

impl SnapshotStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    /// Check if the store holds no snapshot
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(!self.db.contains_key(keys::LEDGER_STATE)?)
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats, StoreError> {
        Ok(StorageStats {
            key_count: self.db.len(),
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
            snapshot_version: self.load_version()?,
        })
    }

    /// Save a committed state. State and version are written in one batch.
    pub fn save_state(&self, state: &LedgerState) -> Result<(), StoreError> {
        let bytes = state.to_bytes()?;
        let mut batch = sled::Batch::default();
        batch.insert(keys::LEDGER_STATE, bytes);
        batch.insert(keys::LEDGER_VERSION, &state.version().to_be_bytes()[..]);
        self.db.apply_batch(batch)?;
        Ok(())
    }

    /// Load the last saved state
    pub fn load_state(&self) -> Result<Option<LedgerState>, StoreError> {
        match self.db.get(keys::LEDGER_STATE)? {
            Some(bytes) => Ok(Some(LedgerState::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Version of the saved snapshot
    pub fn load_version(&self) -> Result<Option<u64>, StoreError> {
        match self.db.get(keys::LEDGER_VERSION)? {
            Some(bytes) => {
                if bytes.len() != 8 {
                    return Err(StoreError::DeserializationFailed(
                        "Invalid version length".to_string(),
                    ));
                }
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes);
                Ok(Some(u64::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    /// Remove the snapshot
    pub fn clear(&self) -> Result<(), StoreError> {
        self.db.remove(keys::LEDGER_STATE)?;
        self.db.remove(keys::LEDGER_VERSION)?;
        Ok(())
    }
}
