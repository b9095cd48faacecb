// Relay module - THE OUTSIDE WORLD
// Simulated oracle processes that watch for requests and report statuses

mod oracle_relay;
mod source;

pub use oracle_relay::{OracleRelay, RelayConfig, RelayError, RelayHandle, RelayStats};
pub use source::{DefaultStatusSource, StatusSource};
