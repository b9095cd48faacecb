// FlightSurety - the marketplace facade
//
// Every mutating call runs as one LedgerStore transaction: the operating
// status check, the engine operation, cross-engine effects (finalization
// settling a flight and crediting its policies) and the events all commit
// together or not at all.

use crate::config::{Amount, MarketConfig};
use crate::flight::{Flight, FlightKey, FlightStatus};
use crate::governance::{Admission, Airline, GovernanceError};
use crate::identity::Address;
use crate::insurance::{InsuranceError, Policy};
use crate::ledger::{
    Clock, LedgerEvent, LedgerState, LedgerStatistics, LedgerStore, OracleRequest, SystemClock,
    Transaction,
};
use crate::oracle::{
    EntropyIndexSource, IndexSource, OracleError, OracleIndexes, ResponseOutcome, StatusTicket,
};
use crate::storage::{SnapshotStore, StoreError};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Errors surfaced by the marketplace
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Operation paused: the market is not operational")]
    OperationPaused,

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Governance: {0}")]
    Governance(#[from] GovernanceError),

    #[error("Oracle: {0}")]
    Oracle(#[from] OracleError),

    #[error("Insurance: {0}")]
    Insurance(#[from] InsuranceError),

    #[error("Storage: {0}")]
    Storage(#[from] StoreError),

    #[error("Treasury balance would overflow")]
    TreasuryOverflow,
}

/// Builder for a FlightSurety market
pub struct MarketBuilder {
    owner: Address,
    genesis_name: String,
    config: MarketConfig,
    clock: Arc<dyn Clock>,
    index_source: Box<dyn IndexSource>,
    snapshots: Option<SnapshotStore>,
}

impl MarketBuilder {
    pub fn genesis_name(mut self, name: impl Into<String>) -> Self {
        self.genesis_name = name.into();
        self
    }

    pub fn config(mut self, config: MarketConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn index_source(mut self, source: impl IndexSource + 'static) -> Self {
        self.index_source = Box::new(source);
        self
    }

    /// Persist every commit. A snapshot already in the store is resumed
    /// instead of creating a fresh genesis state.
    pub fn snapshots(mut self, snapshots: SnapshotStore) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn build(self) -> Result<FlightSurety, MarketError> {
        let store = match self.snapshots {
            Some(snapshots) => {
                let state = match snapshots.load_state()? {
                    Some(state) => {
                        info!(version = state.version(), owner = %state.owner(), "resuming ledger snapshot");
                        state
                    }
                    None => LedgerState::genesis(self.owner, &self.genesis_name, self.config),
                };
                LedgerStore::with_snapshots(state, snapshots)?
            }
            None => LedgerStore::new(LedgerState::genesis(
                self.owner,
                &self.genesis_name,
                self.config,
            )),
        };

        Ok(FlightSurety {
            store,
            index_source: Mutex::new(self.index_source),
            clock: self.clock,
        })
    }
}

pub struct FlightSurety {
    store: LedgerStore,
    index_source: Mutex<Box<dyn IndexSource>>,
    clock: Arc<dyn Clock>,
}

impl FlightSurety {
    /// In-memory market with the default configuration
    pub fn new(owner: Address) -> Self {
        Self {
            store: LedgerStore::new(LedgerState::genesis(owner, "Genesis Airline", MarketConfig::default())),
            index_source: Mutex::new(Box::new(EntropyIndexSource)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn builder(owner: Address) -> MarketBuilder {
        MarketBuilder {
            owner,
            genesis_name: "Genesis Airline".to_string(),
            config: MarketConfig::default(),
            clock: Arc::new(SystemClock),
            index_source: Box::new(EntropyIndexSource),
            snapshots: None,
        }
    }

    /// Subscribe to committed ledger events
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.store.subscribe()
    }

    /// Copy of the committed state
    pub fn snapshot(&self) -> LedgerState {
        self.store.snapshot()
    }

    /// Flush the snapshot store, if any
    pub fn flush(&self) -> Result<(), MarketError> {
        Ok(self.store.flush()?)
    }

    pub fn statistics(&self) -> LedgerStatistics {
        self.store.read(LedgerState::statistics)
    }

    pub fn owner(&self) -> Address {
        self.store.read(|s| *s.owner())
    }

    pub fn config(&self) -> MarketConfig {
        self.store.read(|s| s.config().clone())
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    // ========================================================================
    // OPERATIONS CONTROL
    // ========================================================================

    pub fn is_operational(&self) -> bool {
        self.store.read(LedgerState::is_operational)
    }

    /// Pause or resume the market. Owner only.
    pub fn set_operating_status(&self, caller: Address, operational: bool) -> Result<(), MarketError> {
        self.store.transact(self.clock.now(), |tx| {
            if caller != *tx.state().owner() {
                return Err(MarketError::NotAuthorized(format!(
                    "{} is not the contract owner",
                    caller
                )));
            }
            if tx.state().operational != operational {
                tx.state_mut().operational = operational;
                tx.emit(LedgerEvent::OperatingStatusChanged { operational });
                info!(operational, "operating status changed");
            }
            Ok(())
        })
    }

    // ========================================================================
    // GOVERNANCE
    // ========================================================================

    pub fn apply_airline(&self, candidate: Address, name: &str) -> Result<(), MarketError> {
        self.mutate(|tx| {
            tx.state_mut().airlines.apply_airline(candidate, name)?;
            tx.emit(LedgerEvent::AirlineApplied { airline: candidate });
            Ok(())
        })
    }

    /// Deposit airline funds. Returns the airline's total deposit.
    pub fn fund(&self, airline: Address, amount: Amount) -> Result<Amount, MarketError> {
        self.mutate(|tx| {
            let state = tx.state_mut();
            let total = state.airlines.fund(&airline, amount, &state.config)?;
            state
                .treasury
                .deposit(amount)
                .ok_or(MarketError::TreasuryOverflow)?;
            tx.emit(LedgerEvent::AirlineFunded { airline, amount });
            Ok(total)
        })
    }

    /// Propose `candidate` on behalf of `proposer`
    pub fn register_airline(
        &self,
        proposer: Address,
        candidate: Address,
        name: &str,
    ) -> Result<Admission, MarketError> {
        self.mutate(|tx| {
            let state = tx.state_mut();
            let known = state.airlines.airline(&candidate).is_some();
            let admission = state
                .airlines
                .register_airline(candidate, name, proposer, &state.config)?;

            if !known {
                tx.emit(LedgerEvent::AirlineApplied { airline: candidate });
            }
            match admission {
                Admission::Admitted { .. } => {
                    tx.emit(LedgerEvent::AirlineRegistered { airline: candidate });
                }
                Admission::Pending { votes, required } => {
                    tx.emit(LedgerEvent::VoteRecorded {
                        candidate,
                        voter: proposer,
                        votes,
                        required,
                    });
                }
            }
            Ok(admission)
        })
    }

    pub fn register_flight(
        &self,
        owner: Address,
        code: &str,
        destination: &str,
        timestamp: u64,
    ) -> Result<Flight, MarketError> {
        self.mutate(|tx| {
            let flight = tx
                .state_mut()
                .airlines
                .register_flight(owner, code, destination, timestamp)?
                .clone();
            tx.emit(LedgerEvent::FlightRegistered {
                flight: flight.key().clone(),
                timestamp,
            });
            Ok(flight)
        })
    }

    pub fn is_airline(&self, address: &Address) -> bool {
        self.store.read(|s| s.airlines().is_airline(address))
    }

    pub fn airlines_count(&self) -> usize {
        self.store.read(|s| s.airlines().airlines_count())
    }

    pub fn airline(&self, address: &Address) -> Option<Airline> {
        self.store.read(|s| s.airlines().airline(address).cloned())
    }

    pub fn votes_for(&self, candidate: &Address) -> usize {
        self.store.read(|s| s.airlines().votes_for(candidate))
    }

    pub fn flight(&self, airline: Address, code: &str) -> Option<Flight> {
        let key = FlightKey::new(airline, code);
        self.store.read(|s| s.airlines().flight(&key).cloned())
    }

    // ========================================================================
    // ORACLES
    // ========================================================================

    /// Register an oracle paying `fee`. Returns its assigned indexes.
    pub fn register_oracle(&self, oracle: Address, fee: Amount) -> Result<OracleIndexes, MarketError> {
        self.mutate(|tx| {
            let indexes = {
                let mut source = self
                    .index_source
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let state = tx.state_mut();
                state
                    .oracle
                    .register_oracle(oracle, fee, &mut **source, &state.config)?
            };
            tx.state_mut()
                .treasury
                .deposit(fee)
                .ok_or(MarketError::TreasuryOverflow)?;
            tx.emit(LedgerEvent::OracleRegistered { oracle, indexes });
            Ok(indexes)
        })
    }

    pub fn get_my_indexes(&self, oracle: &Address) -> Result<OracleIndexes, MarketError> {
        Ok(self.store.read(|s| s.oracle().get_my_indexes(oracle))?)
    }

    /// Ask the oracles for a flight's status
    pub fn fetch_flight_status(
        &self,
        airline: Address,
        flight: &str,
        timestamp: u64,
    ) -> Result<StatusTicket, MarketError> {
        self.mutate(|tx| {
            let now = tx.now();
            let state = tx.state_mut();
            let ticket = state
                .oracle
                .fetch_flight_status(airline, flight, timestamp, now, &state.config);

            if ticket.needs_broadcast() {
                tx.emit(LedgerEvent::OracleRequest(OracleRequest {
                    routing_index: ticket.routing_index,
                    airline,
                    flight: flight.to_string(),
                    timestamp,
                }));
            }
            Ok(ticket)
        })
    }

    /// Accept a status report from an oracle
    #[allow(clippy::too_many_arguments)]
    pub fn submit_oracle_response(
        &self,
        oracle: Address,
        index: u8,
        airline: Address,
        flight: &str,
        timestamp: u64,
        status_code: u8,
    ) -> Result<ResponseOutcome, MarketError> {
        self.mutate(|tx| {
            let now = tx.now();
            let state = tx.state_mut();
            let outcome = state.oracle.submit_oracle_response(
                oracle,
                index,
                airline,
                flight,
                timestamp,
                status_code,
                now,
                &state.config,
            )?;

            match outcome {
                ResponseOutcome::Recorded { status, .. } => {
                    tx.emit(LedgerEvent::OracleReport {
                        airline,
                        flight: flight.to_string(),
                        timestamp,
                        status,
                    });
                }
                ResponseOutcome::Finalized { status, .. } => {
                    tx.emit(LedgerEvent::OracleReport {
                        airline,
                        flight: flight.to_string(),
                        timestamp,
                        status,
                    });
                    tx.emit(LedgerEvent::FlightStatusInfo {
                        airline,
                        flight: flight.to_string(),
                        timestamp,
                        status,
                    });
                    Self::settle(tx, FlightKey::new(airline, flight), status)?;
                }
                ResponseOutcome::Ignored { .. } => {}
            }
            Ok(outcome)
        })
    }

    /// Apply a finalized status to the flight and pay out if the airline is at fault
    fn settle(tx: &mut Transaction<'_>, key: FlightKey, status: FlightStatus) -> Result<(), MarketError> {
        if !tx.state_mut().airlines.settle_flight(&key, status) {
            warn!(flight = %key, %status, "finalized status not applied: flight unknown or already settled");
            return Ok(());
        }
        info!(flight = %key, %status, "flight settled");

        if status.is_payable() {
            let credits = tx.state_mut().insurance.credit_insurees(&key)?;
            for credit in credits {
                tx.emit(LedgerEvent::InsureeCredited {
                    passenger: credit.passenger,
                    flight: key.clone(),
                    amount: credit.amount,
                });
            }
        }
        Ok(())
    }

    /// Drop open requests past the configured maximum age
    pub fn expire_stale_requests(&self) -> Result<usize, MarketError> {
        self.mutate(|tx| {
            let now = tx.now();
            let state = tx.state_mut();
            Ok(state.oracle.expire_stale_requests(now, &state.config))
        })
    }

    /// Status code of a flight (0 while unknown)
    pub fn view_flight_status(&self, flight: &str, airline: Address) -> u8 {
        self.flight_status(&FlightKey::new(airline, flight)).code()
    }

    pub fn flight_status(&self, key: &FlightKey) -> FlightStatus {
        self.store.read(|s| s.airlines().flight_status(key))
    }

    // ========================================================================
    // INSURANCE
    // ========================================================================

    /// Buy insurance on `airline`'s flight `flight`
    pub fn buy(
        &self,
        passenger: Address,
        airline: Address,
        flight: &str,
        amount: Amount,
    ) -> Result<Policy, MarketError> {
        self.mutate(|tx| {
            let now = tx.now();
            let key = FlightKey::new(airline, flight);
            let state = tx.state_mut();
            let target = state
                .airlines
                .flight(&key)
                .ok_or_else(|| InsuranceError::UnknownFlight(key.clone()))?;
            let policy = state
                .insurance
                .buy(passenger, target, amount, now, &state.config)?
                .clone();
            state
                .treasury
                .deposit(amount)
                .ok_or(MarketError::TreasuryOverflow)?;

            tx.emit(LedgerEvent::PolicyPurchased {
                passenger,
                flight: key,
                amount,
            });
            Ok(policy)
        })
    }

    pub fn get_credit_to_pay(&self, passenger: &Address) -> Amount {
        self.store.read(|s| s.insurance().get_credit_to_pay(passenger))
    }

    /// Withdraw everything owed to `passenger`. Returns the amount transferred.
    pub fn pay(&self, passenger: Address) -> Result<Amount, MarketError> {
        self.mutate(|tx| {
            let state = tx.state_mut();
            let amount = state.insurance.pay(passenger, &mut state.treasury)?;
            tx.emit(LedgerEvent::Paid { passenger, amount });
            Ok(amount)
        })
    }

    pub fn passengers_of(&self, airline: Address, flight: &str) -> Vec<Address> {
        let key = FlightKey::new(airline, flight);
        self.store.read(|s| s.insurance().passengers_of(&key))
    }

    pub fn treasury_balance(&self) -> Amount {
        self.store.read(|s| s.treasury().balance())
    }

    /// Total ever transferred to an account
    pub fn disbursed_to(&self, account: &Address) -> Amount {
        self.store.read(|s| s.treasury().disbursed_to(account))
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// Run a transaction that requires the market to be operational
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T, MarketError>,
    ) -> Result<T, MarketError> {
        self.store.transact(self.clock.now(), |tx| {
            if !tx.state().is_operational() {
                return Err(MarketError::OperationPaused);
            }
            f(tx)
        })
    }
}
