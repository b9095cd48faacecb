use crate::flight::FlightStatus;
use crate::identity::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Flights are unique per (airline, code)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlightKey {
    airline: Address,
    code: String,
}

impl FlightKey {
    pub fn new(airline: Address, code: impl Into<String>) -> Self {
        Self {
            airline,
            code: code.into(),
        }
    }

    pub fn airline(&self) -> &Address {
        &self.airline
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.code, self.airline.short())
    }
}

/// A scheduled flight registered by its airline
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    key: FlightKey,
    destination: String,
    /// Scheduled departure (Unix seconds)
    timestamp: u64,
    status: FlightStatus,
}

impl Flight {
    /// Create a flight with Unknown status
    pub fn new(key: FlightKey, destination: impl Into<String>, timestamp: u64) -> Self {
        Self {
            key,
            destination: destination.into(),
            timestamp,
            status: FlightStatus::Unknown,
        }
    }

    pub fn key(&self) -> &FlightKey {
        &self.key
    }

    pub fn code(&self) -> &str {
        self.key.code()
    }

    pub fn airline(&self) -> &Address {
        self.key.airline()
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn status(&self) -> FlightStatus {
        self.status
    }

    /// Whether the status has been finalized
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal()
    }

    /// Settle the flight. Returns false if it was already settled.
    pub(crate) fn settle(&mut self, status: FlightStatus) -> bool {
        if self.is_settled() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }
}
