// Oracle Consensus Engine - request routing and status finalization
//
// Request lifecycle: Open -> Finalized (terminal). Reports are accepted only
// from oracles whose index set holds the request's routing index, at most
// once per oracle per request. Reports arriving after finalization are
// ignored without error.

use crate::config::{Amount, MarketConfig};
use crate::flight::FlightStatus;
use crate::identity::Address;
use crate::oracle::index::{routing_index, IndexSource, OracleIndexes};
use crate::oracle::registry::{Oracle, OracleRegistry};
use crate::oracle::request::{RequestKey, StatusRequest, Tally};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from oracle operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Insufficient funds: provided {provided}, required {required}")]
    InsufficientFunds { provided: Amount, required: Amount },

    #[error("Oracle {0} already registered")]
    DuplicateOracle(Address),

    #[error("Oracle {0} is not registered")]
    UnknownOracle(Address),

    #[error("No open request for {0}")]
    UnknownRequest(RequestKey),

    #[error("Index {index} is not assigned to oracle {oracle}")]
    IndexMismatch { oracle: Address, index: u8 },

    #[error("Oracle {oracle} already responded to {key}")]
    DuplicateResponse { oracle: Address, key: RequestKey },

    #[error("Invalid status code: {0}")]
    InvalidStatusCode(u8),
}

/// Result of fetchFlightStatus
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusTicket {
    pub key: RequestKey,
    pub routing_index: u8,
    pub kind: TicketKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TicketKind {
    /// A new request was opened
    Opened,
    /// The key already had an open request
    AlreadyOpen,
    /// An expired request was reset and opened again
    Reopened,
    /// The key is already finalized; no request is broadcast
    Finalized(FlightStatus),
}

impl StatusTicket {
    /// Whether oracles should be notified
    pub fn needs_broadcast(&self) -> bool {
        !matches!(self.kind, TicketKind::Finalized(_))
    }
}

/// Result of submitOracleResponse
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Report counted, request still open
    Recorded { status: FlightStatus, reports: usize },
    /// Report pushed a status over the threshold
    Finalized { status: FlightStatus, reports: usize },
    /// Request was already finalized; the report was dropped
    Ignored { finalized: FlightStatus },
}

/// Oracles and their status requests
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OracleEngine {
    oracles: OracleRegistry,
    requests: HashMap<RequestKey, StatusRequest>,
}

impl OracleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn oracles(&self) -> &OracleRegistry {
        &self.oracles
    }

    pub fn request(&self, key: &RequestKey) -> Option<&StatusRequest> {
        self.requests.get(key)
    }

    pub fn open_request_count(&self) -> usize {
        self.requests.values().filter(|r| r.is_open()).count()
    }

    // ========================================================================
    // ORACLE REGISTRATION
    // ========================================================================

    /// Register an oracle and assign its indexes
    pub fn register_oracle(
        &mut self,
        address: Address,
        fee: Amount,
        source: &mut dyn IndexSource,
        config: &MarketConfig,
    ) -> Result<OracleIndexes, OracleError> {
        if fee < config.registration_fee {
            return Err(OracleError::InsufficientFunds {
                provided: fee,
                required: config.registration_fee,
            });
        }
        if self.oracles.contains(&address) {
            return Err(OracleError::DuplicateOracle(address));
        }

        let indexes = source.draw();
        self.oracles.insert(Oracle::new(address, indexes));
        info!(oracle = %address, ?indexes, "oracle registered");
        Ok(indexes)
    }

    /// Indexes assigned to an oracle
    pub fn get_my_indexes(&self, oracle: &Address) -> Result<OracleIndexes, OracleError> {
        self.oracles
            .get(oracle)
            .map(Oracle::indexes)
            .ok_or(OracleError::UnknownOracle(*oracle))
    }

    // ========================================================================
    // REQUESTS
    // ========================================================================

    /// Open (or locate) the status request for a flight
    pub fn fetch_flight_status(
        &mut self,
        airline: Address,
        flight: &str,
        timestamp: u64,
        now: u64,
        config: &MarketConfig,
    ) -> StatusTicket {
        let key = RequestKey::new(airline, flight, timestamp);
        let index = routing_index(&airline, flight, timestamp);

        let kind = match self.requests.get_mut(&key) {
            Some(request) => {
                if let Some(status) = request.finalized_status() {
                    TicketKind::Finalized(status)
                } else if request.is_expired(now, config.request_max_age_secs) {
                    request.reopen(index, now);
                    TicketKind::Reopened
                } else {
                    TicketKind::AlreadyOpen
                }
            }
            None => {
                self.requests
                    .insert(key.clone(), StatusRequest::open(key.clone(), index, now));
                TicketKind::Opened
            }
        };

        info!(request = %key, routing_index = index, ?kind, "flight status requested");
        StatusTicket {
            key,
            routing_index: index,
            kind,
        }
    }

    /// Accept one oracle report
    #[allow(clippy::too_many_arguments)]
    pub fn submit_oracle_response(
        &mut self,
        oracle: Address,
        index: u8,
        airline: Address,
        flight: &str,
        timestamp: u64,
        status_code: u8,
        now: u64,
        config: &MarketConfig,
    ) -> Result<ResponseOutcome, OracleError> {
        let key = RequestKey::new(airline, flight, timestamp);

        let request = match self.requests.get_mut(&key) {
            Some(request) if request.routing_index() == index => request,
            _ => return Err(OracleError::UnknownRequest(key)),
        };

        if let Some(finalized) = request.finalized_status() {
            debug!(request = %key, oracle = %oracle, "late report ignored");
            return Ok(ResponseOutcome::Ignored { finalized });
        }

        if request.is_expired(now, config.request_max_age_secs) {
            warn!(request = %key, oracle = %oracle, "report for expired request");
            return Err(OracleError::UnknownRequest(key));
        }

        let registered = self
            .oracles
            .get(&oracle)
            .ok_or(OracleError::UnknownOracle(oracle))?;
        if !registered.serves(index) {
            return Err(OracleError::IndexMismatch { oracle, index });
        }

        let status = FlightStatus::from_code(status_code)
            .ok()
            .filter(|s| s.is_terminal())
            .ok_or(OracleError::InvalidStatusCode(status_code))?;

        if request.has_responded(&oracle) {
            return Err(OracleError::DuplicateResponse { oracle, key });
        }

        match request.record(oracle, status, config.min_responses) {
            Tally::Counted(reports) => {
                debug!(request = %key, oracle = %oracle, %status, reports, "oracle report recorded");
                Ok(ResponseOutcome::Recorded { status, reports })
            }
            Tally::Finalized(reports) => {
                info!(request = %key, %status, reports, "flight status finalized");
                Ok(ResponseOutcome::Finalized { status, reports })
            }
        }
    }

    /// Drop open requests older than the configured maximum age
    pub fn expire_stale_requests(&mut self, now: u64, config: &MarketConfig) -> usize {
        let before = self.requests.len();
        self.requests
            .retain(|_, request| !request.is_expired(now, config.request_max_age_secs));
        let expired = before - self.requests.len();
        if expired > 0 {
            info!(expired, "stale status requests dropped");
        }
        expired
    }
}
