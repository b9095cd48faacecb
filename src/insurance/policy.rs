use crate::config::Amount;
use crate::flight::FlightKey;
use crate::identity::Address;
use serde::{Deserialize, Serialize};

/// Numerator/denominator of the payout multiplier (1.5x)
pub const PAYOUT_NUMERATOR: Amount = 3;
pub const PAYOUT_DENOMINATOR: Amount = 2;

/// A passenger's insurance on one flight
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    passenger: Address,
    flight: FlightKey,
    /// Premium paid, fixed at purchase
    amount: Amount,
    purchased_at: u64,
}

impl Policy {
    pub fn new(passenger: Address, flight: FlightKey, amount: Amount, purchased_at: u64) -> Self {
        Self {
            passenger,
            flight,
            amount,
            purchased_at,
        }
    }

    pub fn passenger(&self) -> &Address {
        &self.passenger
    }

    pub fn flight(&self) -> &FlightKey {
        &self.flight
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn purchased_at(&self) -> u64 {
        self.purchased_at
    }

    /// Credit owed when the flight is late through the airline's fault
    pub fn payout(&self) -> Option<Amount> {
        self.amount
            .checked_mul(PAYOUT_NUMERATOR)
            .map(|scaled| scaled / PAYOUT_DENOMINATOR)
    }
}
