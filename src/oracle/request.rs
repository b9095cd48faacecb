// Status requests - per-key response aggregation
//
// A request is Open until one status code collects the threshold of
// distinct oracle reports, then Finalized for good.

use crate::flight::{FlightKey, FlightStatus};
use crate::identity::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifies a status request: (airline, flight code, timestamp)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    flight: FlightKey,
    timestamp: u64,
}

impl RequestKey {
    pub fn new(airline: Address, flight: impl Into<String>, timestamp: u64) -> Self {
        Self {
            flight: FlightKey::new(airline, flight),
            timestamp,
        }
    }

    pub fn flight_key(&self) -> &FlightKey {
        &self.flight
    }

    pub fn airline(&self) -> &Address {
        self.flight.airline()
    }

    pub fn flight(&self) -> &str {
        self.flight.code()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.flight, self.timestamp)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    Open,
    Finalized(FlightStatus),
}

/// What happened to a recorded report
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Tally {
    Counted(usize),
    Finalized(usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRequest {
    key: RequestKey,
    routing_index: u8,
    /// When the request was (re)opened, Unix seconds
    opened_at: u64,
    state: RequestState,
    buckets: BTreeMap<FlightStatus, BTreeSet<Address>>,
    responders: BTreeSet<Address>,
}

impl StatusRequest {
    pub fn open(key: RequestKey, routing_index: u8, opened_at: u64) -> Self {
        Self {
            key,
            routing_index,
            opened_at,
            state: RequestState::Open,
            buckets: BTreeMap::new(),
            responders: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn routing_index(&self) -> u8 {
        self.routing_index
    }

    pub fn opened_at(&self) -> u64 {
        self.opened_at
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == RequestState::Open
    }

    pub fn finalized_status(&self) -> Option<FlightStatus> {
        match self.state {
            RequestState::Finalized(status) => Some(status),
            RequestState::Open => None,
        }
    }

    /// Whether an open request has outlived `max_age` seconds
    pub fn is_expired(&self, now: u64, max_age: Option<u64>) -> bool {
        match max_age {
            Some(age) => self.is_open() && now.saturating_sub(self.opened_at) > age,
            None => false,
        }
    }

    pub fn has_responded(&self, oracle: &Address) -> bool {
        self.responders.contains(oracle)
    }

    /// Oracles that reported a given status
    pub fn reports_for(&self, status: FlightStatus) -> usize {
        self.buckets.get(&status).map(BTreeSet::len).unwrap_or(0)
    }

    pub fn response_count(&self) -> usize {
        self.responders.len()
    }

    /// Record a report. The caller has already rejected duplicates.
    pub(crate) fn record(&mut self, oracle: Address, status: FlightStatus, threshold: usize) -> Tally {
        self.responders.insert(oracle);
        let bucket = self.buckets.entry(status).or_default();
        bucket.insert(oracle);
        let count = bucket.len();

        if count >= threshold {
            self.state = RequestState::Finalized(status);
            Tally::Finalized(count)
        } else {
            Tally::Counted(count)
        }
    }

    /// Clear all reports and start over
    pub(crate) fn reopen(&mut self, routing_index: u8, now: u64) {
        self.routing_index = routing_index;
        self.opened_at = now;
        self.state = RequestState::Open;
        self.buckets.clear();
        self.responders.clear();
    }
}
