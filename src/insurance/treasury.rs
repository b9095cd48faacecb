// Treasury - value held by the marketplace
//
// Airline deposits, premiums and oracle fees flow in; passenger payouts
// flow out to the passenger's account.

use crate::config::Amount;
use crate::identity::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    balance: Amount,
    /// Total transferred out per account
    disbursed: HashMap<Address, Amount>,
}

impl Treasury {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Total ever paid out to an account
    pub fn disbursed_to(&self, account: &Address) -> Amount {
        self.disbursed.get(account).copied().unwrap_or(0)
    }

    /// Take value in. Returns None on overflow.
    pub fn deposit(&mut self, amount: Amount) -> Option<Amount> {
        self.balance = self.balance.checked_add(amount)?;
        Some(self.balance)
    }

    /// Transfer value out. Returns the shortfall if the balance is too small.
    pub(crate) fn disburse(&mut self, to: Address, amount: Amount) -> Result<(), Amount> {
        if amount > self.balance {
            return Err(amount - self.balance);
        }
        self.balance -= amount;
        let total = self.disbursed.entry(to).or_insert(0);
        *total = total.saturating_add(amount);
        Ok(())
    }
}
