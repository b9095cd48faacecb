// Ledger State - every persistent entity of the marketplace
//
// The state is a plain value: the store clones it at the start of each
// transaction and swaps the draft in only when the transaction succeeds.

use crate::config::MarketConfig;
use crate::governance::AirlineRegistry;
use crate::identity::Address;
use crate::insurance::{InsuranceLedger, Treasury};
use crate::oracle::OracleEngine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur encoding or decoding ledger state
#[derive(Error, Debug)]
pub enum LedgerStateError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),
}

/// Summary counters for status displays
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerStatistics {
    pub version: u64,
    pub registered_airlines: usize,
    pub oracles: usize,
    pub open_requests: usize,
    pub treasury_balance: crate::config::Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerState {
    /// Contract owner; also the genesis airline
    pub(crate) owner: Address,
    pub(crate) operational: bool,
    pub(crate) config: MarketConfig,
    pub(crate) airlines: AirlineRegistry,
    pub(crate) oracle: OracleEngine,
    pub(crate) insurance: InsuranceLedger,
    pub(crate) treasury: Treasury,
    /// Committed transaction counter
    pub(crate) version: u64,
}

impl LedgerState {
    /// Initial state: owner registered as the genesis airline, market operational
    pub fn genesis(owner: Address, genesis_name: &str, config: MarketConfig) -> Self {
        Self {
            owner,
            operational: true,
            config,
            airlines: AirlineRegistry::new(owner, genesis_name),
            oracle: OracleEngine::new(),
            insurance: InsuranceLedger::new(),
            treasury: Treasury::new(),
            version: 0,
        }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn airlines(&self) -> &AirlineRegistry {
        &self.airlines
    }

    pub fn oracle(&self) -> &OracleEngine {
        &self.oracle
    }

    pub fn insurance(&self) -> &InsuranceLedger {
        &self.insurance
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn statistics(&self) -> LedgerStatistics {
        LedgerStatistics {
            version: self.version,
            registered_airlines: self.airlines.airlines_count(),
            oracles: self.oracle.oracles().len(),
            open_requests: self.oracle.open_request_count(),
            treasury_balance: self.treasury.balance(),
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerStateError> {
        postcard::to_allocvec(self).map_err(|e| LedgerStateError::SerializationFailed(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerStateError> {
        postcard::from_bytes(bytes).map_err(|e| LedgerStateError::DeserializationFailed(e.to_string()))
    }
}
