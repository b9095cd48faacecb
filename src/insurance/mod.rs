// Insurance module - THE MONEY
// Policy purchase, payout crediting and withdrawals

mod ledger;
mod policy;
mod treasury;

pub use ledger::{Credit, InsuranceError, InsuranceLedger};
pub use policy::{Policy, PAYOUT_DENOMINATOR, PAYOUT_NUMERATOR};
pub use treasury::Treasury;
