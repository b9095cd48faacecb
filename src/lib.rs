// FlightSurety - flight delay insurance with oracle status consensus
//
// Airlines join through multi-party governance, passengers insure flights,
// and independent oracles agree on a flight's status. A flight settled as
// late through the airline's fault credits every policy 1.5x its premium.

pub mod config;
pub mod flight;
pub mod governance;
pub mod identity;
pub mod insurance;
pub mod ledger;
pub mod market;
pub mod oracle;
pub mod relay;
pub mod storage;

pub use config::{ether, Amount, MarketConfig};
pub use market::{FlightSurety, MarketBuilder, MarketError};
