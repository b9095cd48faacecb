// Identity module - WHO IS CALLING
// Account addresses shared by airlines, passengers, oracles and the owner

mod address;

pub use address::{Address, AddressError};
