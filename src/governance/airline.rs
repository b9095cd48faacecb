// Airline records and candidate vote sets

use crate::config::Amount;
use crate::identity::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lifecycle of an airline in the marketplace
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AirlineState {
    /// Known to the market but neither funded nor admitted
    Applied,
    /// Deposited the minimum funds, not yet admitted
    Funded,
    /// Admitted member; may register flights
    Registered,
}

/// An airline participating in the marketplace
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airline {
    address: Address,
    name: String,
    state: AirlineState,
    /// Total deposited value
    funds: Amount,
}

impl Airline {
    /// Create an applicant
    pub fn applied(address: Address, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            state: AirlineState::Applied,
            funds: 0,
        }
    }

    /// Create the genesis member: registered, no deposit
    pub fn genesis(address: Address, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            state: AirlineState::Registered,
            funds: 0,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> AirlineState {
        self.state
    }

    pub fn funds(&self) -> Amount {
        self.funds
    }

    pub fn is_registered(&self) -> bool {
        self.state == AirlineState::Registered
    }

    /// Whether the deposit meets the governance minimum
    pub fn has_funded(&self, minimum: Amount) -> bool {
        self.funds >= minimum
    }

    pub(crate) fn deposit(&mut self, amount: Amount) -> Option<Amount> {
        self.funds = self.funds.checked_add(amount)?;
        if self.state == AirlineState::Applied {
            self.state = AirlineState::Funded;
        }
        Some(self.funds)
    }

    pub(crate) fn admit(&mut self) {
        self.state = AirlineState::Registered;
    }
}

/// Distinct proposers backing a candidate
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSet {
    voters: BTreeSet<Address>,
}

impl VoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a vote. Returns false if the voter already voted.
    pub fn cast(&mut self, voter: Address) -> bool {
        self.voters.insert(voter)
    }

    pub fn has_voted(&self, voter: &Address) -> bool {
        self.voters.contains(voter)
    }

    pub fn len(&self) -> usize {
        self.voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }

    pub fn voters(&self) -> impl Iterator<Item = &Address> {
        self.voters.iter()
    }
}
