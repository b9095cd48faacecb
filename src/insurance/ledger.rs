// Insurance Ledger - policies, credits and withdrawals

use crate::config::{Amount, MarketConfig};
use crate::flight::{Flight, FlightKey, FlightStatus};
use crate::identity::Address;
use crate::insurance::policy::Policy;
use crate::insurance::treasury::Treasury;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from insurance operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InsuranceError {
    #[error("Unknown flight {0}")]
    UnknownFlight(FlightKey),

    #[error("Flight {flight} already settled as {status}")]
    FlightClosed { flight: FlightKey, status: FlightStatus },

    #[error("Premium {amount} exceeds the limit of {limit}")]
    PriceExceeded { amount: Amount, limit: Amount },

    #[error("Premium must be greater than zero")]
    InvalidAmount,

    #[error("Passenger {passenger} already insured on {flight}")]
    DuplicatePolicy { passenger: Address, flight: FlightKey },

    #[error("Nothing owed to {0}")]
    NothingOwed(Address),

    #[error("Credit would overflow")]
    CreditOverflow,

    #[error("Treasury short by {shortfall}")]
    TreasuryShortfall { shortfall: Amount },
}

/// One policy credited after an airline-caused delay
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credit {
    pub passenger: Address,
    pub amount: Amount,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InsuranceLedger {
    /// Policies per flight, in purchase order
    policies: BTreeMap<FlightKey, Vec<Policy>>,
    /// Owed credit per passenger
    credits: HashMap<Address, Amount>,
    /// (flight, passenger) pairs already credited
    credited: BTreeSet<(FlightKey, Address)>,
}

impl InsuranceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn policy(&self, passenger: &Address, flight: &FlightKey) -> Option<&Policy> {
        self.policies
            .get(flight)?
            .iter()
            .find(|p| p.passenger() == passenger)
    }

    pub fn policies_for(&self, flight: &FlightKey) -> &[Policy] {
        self.policies.get(flight).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Insured passengers of a flight, in purchase order
    pub fn passengers_of(&self, flight: &FlightKey) -> Vec<Address> {
        self.policies_for(flight)
            .iter()
            .map(|p| *p.passenger())
            .collect()
    }

    /// Credit currently owed to a passenger
    pub fn get_credit_to_pay(&self, passenger: &Address) -> Amount {
        self.credits.get(passenger).copied().unwrap_or(0)
    }

    pub fn is_credited(&self, flight: &FlightKey, passenger: &Address) -> bool {
        self.credited.contains(&(flight.clone(), *passenger))
    }

    // ========================================================================
    // PURCHASE
    // ========================================================================

    /// Buy insurance on a flight that has not settled yet
    pub fn buy(
        &mut self,
        passenger: Address,
        flight: &Flight,
        amount: Amount,
        now: u64,
        config: &MarketConfig,
    ) -> Result<&Policy, InsuranceError> {
        if flight.is_settled() {
            return Err(InsuranceError::FlightClosed {
                flight: flight.key().clone(),
                status: flight.status(),
            });
        }
        if amount == 0 {
            return Err(InsuranceError::InvalidAmount);
        }
        if amount > config.insurance_price_limit {
            return Err(InsuranceError::PriceExceeded {
                amount,
                limit: config.insurance_price_limit,
            });
        }
        if self.policy(&passenger, flight.key()).is_some() {
            return Err(InsuranceError::DuplicatePolicy {
                passenger,
                flight: flight.key().clone(),
            });
        }

        info!(passenger = %passenger, flight = %flight.key(), amount, "policy purchased");
        let policies = self.policies.entry(flight.key().clone()).or_default();
        policies.push(Policy::new(passenger, flight.key().clone(), amount, now));
        Ok(&policies[policies.len() - 1])
    }

    // ========================================================================
    // CREDITING
    // ========================================================================

    /// Credit every policy on a flight late through the airline's fault.
    ///
    /// Each (flight, passenger) pair is credited at most once, so calling
    /// this again for the same flight returns an empty list.
    pub fn credit_insurees(&mut self, flight: &FlightKey) -> Result<Vec<Credit>, InsuranceError> {
        let mut credited = Vec::new();

        for policy in self.policies.get(flight).map(Vec::as_slice).unwrap_or(&[]) {
            let marker = (flight.clone(), *policy.passenger());
            if self.credited.contains(&marker) {
                continue;
            }

            let payout = policy.payout().ok_or(InsuranceError::CreditOverflow)?;
            let balance = self.credits.entry(*policy.passenger()).or_insert(0);
            *balance = balance
                .checked_add(payout)
                .ok_or(InsuranceError::CreditOverflow)?;
            self.credited.insert(marker);

            info!(passenger = %policy.passenger(), flight = %flight, payout, "insuree credited");
            credited.push(Credit {
                passenger: *policy.passenger(),
                amount: payout,
            });
        }

        Ok(credited)
    }

    // ========================================================================
    // WITHDRAWAL
    // ========================================================================

    /// Withdraw everything owed to a passenger.
    ///
    /// The balance is zeroed before value leaves the treasury and restored
    /// if the treasury cannot cover it.
    pub fn pay(&mut self, passenger: Address, treasury: &mut Treasury) -> Result<Amount, InsuranceError> {
        let owed = self.get_credit_to_pay(&passenger);
        if owed == 0 {
            return Err(InsuranceError::NothingOwed(passenger));
        }

        self.credits.remove(&passenger);

        if let Err(shortfall) = treasury.disburse(passenger, owed) {
            self.credits.insert(passenger, owed);
            warn!(passenger = %passenger, owed, shortfall, "treasury cannot cover payout");
            return Err(InsuranceError::TreasuryShortfall { shortfall });
        }

        info!(passenger = %passenger, amount = owed, "credit paid out");
        Ok(owed)
    }
}
