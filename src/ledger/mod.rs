// Ledger module - THE STATE STORE
// Owns every entity and executes each mutation as one atomic transaction

mod clock;
mod events;
mod state;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{LedgerEvent, OracleRequest};
pub use state::{LedgerState, LedgerStateError, LedgerStatistics};
pub use store::{LedgerStore, Transaction, EVENT_CHANNEL_CAPACITY};
