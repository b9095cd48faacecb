// Airline Registry - airline lifecycle, multi-party admission and flights
//
// Admission rules:
// - Proposers must have deposited the minimum funds
// - Below the direct admission limit one proposer admits a candidate
// - From the limit on, a candidate needs ceil(registered / 2) distinct votes

use crate::config::{Amount, MarketConfig};
use crate::flight::{Flight, FlightKey, FlightStatus};
use crate::governance::airline::{Airline, AirlineState, VoteSet};
use crate::identity::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from governance operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Insufficient funds: provided {provided}, required {required}")]
    InsufficientFunds { provided: Amount, required: Amount },

    #[error("Airline {0} already exists")]
    DuplicateAirline(Address),

    #[error("Airline {voter} already voted for {candidate}")]
    DuplicateVote { candidate: Address, voter: Address },

    #[error("Flight {0} already registered")]
    DuplicateFlight(FlightKey),

    #[error("Unknown airline {0}")]
    UnknownAirline(Address),

    #[error("Airline funds would overflow")]
    FundsOverflow,
}

/// Result of a registerAirline call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Candidate admitted. `votes` is 1 for direct admission.
    Admitted { votes: usize },
    /// Vote recorded, threshold not reached yet
    Pending { votes: usize, required: usize },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Airlines, pending vote sets and the flights airlines registered
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AirlineRegistry {
    airlines: HashMap<Address, Airline>,
    votes: HashMap<Address, VoteSet>,
    flights: BTreeMap<FlightKey, Flight>,
}

impl AirlineRegistry {
    /// Create a registry with the genesis airline already registered
    pub fn new(genesis: Address, name: impl Into<String>) -> Self {
        let mut airlines = HashMap::new();
        airlines.insert(genesis, Airline::genesis(genesis, name));
        Self {
            airlines,
            votes: HashMap::new(),
            flights: BTreeMap::new(),
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn airline(&self, address: &Address) -> Option<&Airline> {
        self.airlines.get(address)
    }

    /// Whether the address is a registered airline
    pub fn is_airline(&self, address: &Address) -> bool {
        self.airlines
            .get(address)
            .map(Airline::is_registered)
            .unwrap_or(false)
    }

    /// Number of registered airlines
    pub fn airlines_count(&self) -> usize {
        self.airlines.values().filter(|a| a.is_registered()).count()
    }

    /// Distinct votes currently backing a candidate
    pub fn votes_for(&self, candidate: &Address) -> usize {
        self.votes.get(candidate).map(VoteSet::len).unwrap_or(0)
    }

    /// Votes a candidate needs once direct admission no longer applies
    pub fn required_votes(&self) -> usize {
        self.airlines_count().div_ceil(2)
    }

    pub fn flight(&self, key: &FlightKey) -> Option<&Flight> {
        self.flights.get(key)
    }

    /// All flights of an airline
    pub fn flights_of(&self, airline: &Address) -> Vec<&Flight> {
        self.flights
            .values()
            .filter(|f| f.airline() == airline)
            .collect()
    }

    /// Current status of a flight, Unknown if not registered
    pub fn flight_status(&self, key: &FlightKey) -> FlightStatus {
        self.flights
            .get(key)
            .map(Flight::status)
            .unwrap_or_default()
    }

    // ========================================================================
    // AIRLINE LIFECYCLE
    // ========================================================================

    /// Record a new applicant
    pub fn apply_airline(&mut self, candidate: Address, name: &str) -> Result<(), GovernanceError> {
        if self.airlines.contains_key(&candidate) {
            return Err(GovernanceError::DuplicateAirline(candidate));
        }
        self.airlines.insert(candidate, Airline::applied(candidate, name));
        info!(airline = %candidate, name, "airline applied");
        Ok(())
    }

    /// Deposit funds. Returns the airline's total deposit.
    pub fn fund(
        &mut self,
        airline: &Address,
        amount: Amount,
        config: &MarketConfig,
    ) -> Result<Amount, GovernanceError> {
        if amount < config.minimum_funds {
            return Err(GovernanceError::InsufficientFunds {
                provided: amount,
                required: config.minimum_funds,
            });
        }

        let record = self
            .airlines
            .get_mut(airline)
            .ok_or(GovernanceError::UnknownAirline(*airline))?;
        let total = record.deposit(amount).ok_or(GovernanceError::FundsOverflow)?;

        info!(airline = %airline, amount, total, state = ?record.state(), "airline funded");
        Ok(total)
    }

    /// Propose a candidate for membership
    pub fn register_airline(
        &mut self,
        candidate: Address,
        name: &str,
        proposer: Address,
        config: &MarketConfig,
    ) -> Result<Admission, GovernanceError> {
        self.ensure_can_propose(&proposer, config)?;

        if candidate == proposer {
            return Err(GovernanceError::NotAuthorized(
                "airlines cannot propose themselves".into(),
            ));
        }

        match self.airlines.get(&candidate) {
            Some(existing) if existing.is_registered() => {
                return Err(GovernanceError::DuplicateAirline(candidate));
            }
            Some(_) => {}
            None => {
                self.airlines.insert(candidate, Airline::applied(candidate, name));
            }
        }

        let registered = self.airlines_count();
        if registered < config.direct_admission_limit {
            self.admit(&candidate);
            info!(candidate = %candidate, proposer = %proposer, registered = registered + 1, "airline admitted directly");
            return Ok(Admission::Admitted { votes: 1 });
        }

        let required = registered.div_ceil(2);
        let votes = self.votes.entry(candidate).or_default();
        if !votes.cast(proposer) {
            return Err(GovernanceError::DuplicateVote {
                candidate,
                voter: proposer,
            });
        }
        let count = votes.len();
        debug!(candidate = %candidate, proposer = %proposer, votes = count, required, "vote recorded");

        if count >= required {
            self.admit(&candidate);
            info!(candidate = %candidate, votes = count, registered = registered + 1, "airline admitted by vote");
            Ok(Admission::Admitted { votes: count })
        } else {
            Ok(Admission::Pending {
                votes: count,
                required,
            })
        }
    }

    fn ensure_can_propose(&self, proposer: &Address, config: &MarketConfig) -> Result<(), GovernanceError> {
        let airline = self
            .airlines
            .get(proposer)
            .ok_or_else(|| GovernanceError::NotAuthorized(format!("{} is not an airline", proposer)))?;

        let eligible = matches!(airline.state(), AirlineState::Funded | AirlineState::Registered);
        if !eligible || !airline.has_funded(config.minimum_funds) {
            return Err(GovernanceError::NotAuthorized(format!(
                "{} has not funded the required minimum",
                proposer
            )));
        }
        Ok(())
    }

    fn admit(&mut self, candidate: &Address) {
        if let Some(airline) = self.airlines.get_mut(candidate) {
            airline.admit();
        }
        self.votes.remove(candidate);
    }

    // ========================================================================
    // FLIGHTS
    // ========================================================================

    /// Register a flight owned by a registered airline
    pub fn register_flight(
        &mut self,
        owner: Address,
        code: &str,
        destination: &str,
        timestamp: u64,
    ) -> Result<&Flight, GovernanceError> {
        if !self.is_airline(&owner) {
            return Err(GovernanceError::NotAuthorized(format!(
                "{} is not a registered airline",
                owner
            )));
        }

        let key = FlightKey::new(owner, code);
        if self.flights.contains_key(&key) {
            return Err(GovernanceError::DuplicateFlight(key));
        }

        info!(flight = %key, destination, timestamp, "flight registered");
        let flight = Flight::new(key.clone(), destination, timestamp);
        Ok(self.flights.entry(key).or_insert(flight))
    }

    /// Apply a finalized status. Returns false if the flight is unknown or already settled.
    pub(crate) fn settle_flight(&mut self, key: &FlightKey, status: FlightStatus) -> bool {
        self.flights
            .get_mut(key)
            .map(|flight| flight.settle(status))
            .unwrap_or(false)
    }
}
