// Flight module - WHAT IS INSURED
// Flight records and the status codes oracles report

mod model;
mod status;

pub use model::{Flight, FlightKey};
pub use status::{FlightStatus, UnknownStatusCode};
