// Governance module - WHO MAY SELL INSURANCE
// Airline lifecycle, multi-party admission votes and flight registration

mod airline;
mod registry;

pub use airline::{Airline, AirlineState, VoteSet};
pub use registry::{Admission, AirlineRegistry, GovernanceError};
