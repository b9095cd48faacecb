// Market configuration - contract constants and tunables
//
// The defaults are the values the marketplace contract publishes; tests and
// the simulation binary override them through the builder methods.

use serde::{Deserialize, Serialize};

/// Value in the smallest unit (wei)
pub type Amount = u128;

/// Smallest units per whole unit of value
pub const WEI_PER_ETHER: Amount = 1_000_000_000_000_000_000;

/// Minimum deposit that lets an airline take part in governance
pub const MINIMUM_FUNDS: Amount = 10 * WEI_PER_ETHER;

/// Fee an oracle pays to register
pub const REGISTRATION_FEE: Amount = WEI_PER_ETHER;

/// Maximum premium a passenger may pay for a single policy
pub const INSURANCE_PRICE_LIMIT: Amount = WEI_PER_ETHER;

/// Matching responses needed to finalize a status request
pub const MIN_RESPONSES: usize = 3;

/// Routing indexes are drawn from [0, INDEX_RANGE)
pub const INDEX_RANGE: u8 = 10;

/// Indexes assigned to every oracle
pub const INDEXES_PER_ORACLE: usize = 3;

/// Below this many registered airlines a single proposer admits a candidate
pub const DIRECT_ADMISSION_LIMIT: usize = 4;

/// Convert whole units to wei
pub const fn ether(units: u64) -> Amount {
    units as Amount * WEI_PER_ETHER
}

/// Tunable parameters of the marketplace
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Deposit required before an airline may propose others
    pub minimum_funds: Amount,
    /// Oracle registration fee
    pub registration_fee: Amount,
    /// Upper bound on a policy premium
    pub insurance_price_limit: Amount,
    /// Matching oracle responses needed for finalization
    pub min_responses: usize,
    /// Registered-airline count under which admission needs no vote
    pub direct_admission_limit: usize,
    /// Age after which an open status request stops accepting responses.
    /// `None` keeps requests open forever.
    pub request_max_age_secs: Option<u64>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            minimum_funds: MINIMUM_FUNDS,
            registration_fee: REGISTRATION_FEE,
            insurance_price_limit: INSURANCE_PRICE_LIMIT,
            min_responses: MIN_RESPONSES,
            direct_admission_limit: DIRECT_ADMISSION_LIMIT,
            request_max_age_secs: None,
        }
    }
}

impl MarketConfig {
    /// Create a config with the contract defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum airline funding
    pub fn with_minimum_funds(mut self, amount: Amount) -> Self {
        self.minimum_funds = amount;
        self
    }

    /// Set the oracle registration fee
    pub fn with_registration_fee(mut self, fee: Amount) -> Self {
        self.registration_fee = fee;
        self
    }

    /// Set the premium limit
    pub fn with_insurance_price_limit(mut self, limit: Amount) -> Self {
        self.insurance_price_limit = limit;
        self
    }

    /// Set the response threshold
    pub fn with_min_responses(mut self, min_responses: usize) -> Self {
        self.min_responses = min_responses.max(1);
        self
    }

    /// Set the direct admission limit
    pub fn with_direct_admission_limit(mut self, limit: usize) -> Self {
        self.direct_admission_limit = limit;
        self
    }

    /// Expire open status requests after `secs` seconds
    pub fn with_request_max_age(mut self, secs: u64) -> Self {
        self.request_max_age_secs = Some(secs);
        self
    }
}
