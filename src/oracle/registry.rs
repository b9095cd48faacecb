// Oracle registry - who may report and which requests they are routed

use crate::identity::Address;
use crate::oracle::index::OracleIndexes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A registered oracle and its immutable index set
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oracle {
    address: Address,
    indexes: OracleIndexes,
}

impl Oracle {
    pub fn new(address: Address, indexes: OracleIndexes) -> Self {
        Self { address, indexes }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn indexes(&self) -> OracleIndexes {
        self.indexes
    }

    /// Whether requests with this routing index are routed to the oracle
    pub fn serves(&self, routing_index: u8) -> bool {
        self.indexes.contains(&routing_index)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OracleRegistry {
    oracles: HashMap<Address, Oracle>,
}

impl OracleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.oracles.contains_key(address)
    }

    pub fn get(&self, address: &Address) -> Option<&Oracle> {
        self.oracles.get(address)
    }

    /// Insert an oracle. Returns false (and keeps the existing indexes) if already present.
    pub(crate) fn insert(&mut self, oracle: Oracle) -> bool {
        if self.oracles.contains_key(oracle.address()) {
            return false;
        }
        self.oracles.insert(*oracle.address(), oracle);
        true
    }

    /// Oracles routed a given index
    pub fn serving(&self, routing_index: u8) -> Vec<&Oracle> {
        self.oracles
            .values()
            .filter(|o| o.serves(routing_index))
            .collect()
    }
}
