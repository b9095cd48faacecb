// Ledger Store - serialized, all-or-nothing transactions over LedgerState
//
// One transaction runs at a time. Each runs against a draft copy of the
// committed state; the draft replaces the committed state only when the
// transaction returns Ok, so a failing operation leaves no trace. Events
// raised inside a transaction are published after the commit.

use crate::ledger::events::LedgerEvent;
use crate::ledger::state::LedgerState;
use crate::storage::{SnapshotStore, StoreError};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default capacity of the event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Mutable view handed to a running transaction
pub struct Transaction<'a> {
    state: &'a mut LedgerState,
    events: Vec<LedgerEvent>,
    now: u64,
}

impl<'a> Transaction<'a> {
    pub fn state(&self) -> &LedgerState {
        self.state
    }

    pub fn state_mut(&mut self) -> &mut LedgerState {
        self.state
    }

    /// Time the transaction started, Unix seconds
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Queue an event for publication on commit
    pub fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }
}

pub struct LedgerStore {
    state: Mutex<LedgerState>,
    events: broadcast::Sender<LedgerEvent>,
    snapshots: Option<SnapshotStore>,
}

impl LedgerStore {
    /// In-memory store
    pub fn new(state: LedgerState) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(state),
            events,
            snapshots: None,
        }
    }

    /// Store that writes every committed state to `snapshots`
    pub fn with_snapshots(state: LedgerState, snapshots: SnapshotStore) -> Result<Self, StoreError> {
        snapshots.save_state(&state)?;
        let mut store = Self::new(state);
        store.snapshots = Some(snapshots);
        Ok(store)
    }

    /// Subscribe to committed events
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Run a read against the committed state
    pub fn read<T>(&self, f: impl FnOnce(&LedgerState) -> T) -> T {
        f(&self.lock())
    }

    /// Copy of the committed state
    pub fn snapshot(&self) -> LedgerState {
        self.lock().clone()
    }

    /// Flush pending snapshot writes to disk. No-op for in-memory stores.
    pub fn flush(&self) -> Result<(), StoreError> {
        match &self.snapshots {
            Some(snapshots) => snapshots.flush(),
            None => Ok(()),
        }
    }

    /// Run a mutating transaction
    pub fn transact<T, E>(
        &self,
        now: u64,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut committed = self.lock();
        let mut draft = committed.clone();

        let mut tx = Transaction {
            state: &mut draft,
            events: Vec::new(),
            now,
        };
        let value = f(&mut tx)?;
        let events = tx.events;

        draft.version += 1;
        if let Some(snapshots) = &self.snapshots {
            snapshots.save_state(&draft)?;
        }
        *committed = draft;
        let version = committed.version;
        drop(committed);

        debug!(version, events = events.len(), "transaction committed");
        for event in events {
            trace!(?event, "publishing event");
            // No subscribers is not an error
            let _ = self.events.send(event);
        }
        Ok(value)
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        // Transactions only ever swap in a complete draft, so a poisoned
        // lock still guards a consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
