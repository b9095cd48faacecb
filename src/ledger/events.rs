// Ledger events - notifications published after a transaction commits

use crate::config::Amount;
use crate::flight::{FlightKey, FlightStatus};
use crate::identity::Address;
use crate::oracle::OracleIndexes;
use serde::{Deserialize, Serialize};

/// Broadcast to oracle relays when a status check is requested
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub routing_index: u8,
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    OperatingStatusChanged { operational: bool },
    AirlineApplied { airline: Address },
    AirlineFunded { airline: Address, amount: Amount },
    VoteRecorded { candidate: Address, voter: Address, votes: usize, required: usize },
    AirlineRegistered { airline: Address },
    FlightRegistered { flight: FlightKey, timestamp: u64 },
    OracleRegistered { oracle: Address, indexes: OracleIndexes },
    OracleRequest(OracleRequest),
    /// An accepted report that did not finalize the request
    OracleReport { airline: Address, flight: String, timestamp: u64, status: FlightStatus },
    /// The request reached consensus
    FlightStatusInfo { airline: Address, flight: String, timestamp: u64, status: FlightStatus },
    PolicyPurchased { passenger: Address, flight: FlightKey, amount: Amount },
    InsureeCredited { passenger: Address, flight: FlightKey, amount: Amount },
    Paid { passenger: Address, amount: Amount },
}

impl LedgerEvent {
    /// The oracle request carried by this event, if any
    pub fn as_oracle_request(&self) -> Option<&OracleRequest> {
        match self {
            LedgerEvent::OracleRequest(request) => Some(request),
            _ => None,
        }
    }
}
