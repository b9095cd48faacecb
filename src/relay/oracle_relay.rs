// Oracle Relay - simulated off-ledger oracle fleet
//
// Registers a set of oracle accounts, listens for OracleRequest events and
// answers from every oracle whose indexes include the request's routing
// index. Submissions rejected because the market is paused are retried
// with linear backoff; every other rejection is final for that oracle.

use crate::flight::FlightStatus;
use crate::identity::Address;
use crate::ledger::{LedgerEvent, OracleRequest};
use crate::market::{FlightSurety, MarketError};
use crate::oracle::{OracleError, OracleIndexes, ResponseOutcome};
use crate::relay::source::StatusSource;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Relay errors
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Oracle {oracle} registration failed: {source}")]
    Registration {
        oracle: Address,
        #[source]
        source: MarketError,
    },

    #[error("Relay task failed: {0}")]
    TaskFailed(String),
}

/// Configuration for the relay
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Attempts after the first one for retryable rejections
    pub max_retries: u32,
    /// Backoff unit; attempt n waits n * backoff
    pub retry_backoff_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 50,
        }
    }
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_backoff_ms(mut self, ms: u64) -> Self {
        self.retry_backoff_ms = ms;
        self
    }
}

/// Counters accumulated by a relay
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub requests_seen: u64,
    pub reports_accepted: u64,
    pub reports_ignored: u64,
    pub reports_rejected: u64,
    pub retries: u64,
    pub finalizations: u64,
}

impl RelayStats {
    fn absorb(&mut self, other: &RelayStats) {
        self.requests_seen += other.requests_seen;
        self.reports_accepted += other.reports_accepted;
        self.reports_ignored += other.reports_ignored;
        self.reports_rejected += other.reports_rejected;
        self.retries += other.retries;
        self.finalizations += other.finalizations;
    }
}

pub struct OracleRelay {
    market: Arc<FlightSurety>,
    oracles: Vec<(Address, OracleIndexes)>,
    source: Arc<dyn StatusSource>,
    config: RelayConfig,
}

impl OracleRelay {
    /// Register every account as an oracle (paying the market's fee) and
    /// remember the indexes it was assigned. Accounts that are already
    /// oracles are adopted with their existing indexes.
    pub fn register(
        market: Arc<FlightSurety>,
        accounts: impl IntoIterator<Item = Address>,
        source: Arc<dyn StatusSource>,
        config: RelayConfig,
    ) -> Result<Self, RelayError> {
        let fee = market.config().registration_fee;
        let mut oracles = Vec::new();

        for oracle in accounts {
            let indexes = match market.register_oracle(oracle, fee) {
                Ok(indexes) => indexes,
                Err(MarketError::Oracle(OracleError::DuplicateOracle(_))) => market
                    .get_my_indexes(&oracle)
                    .map_err(|source| RelayError::Registration { oracle, source })?,
                Err(source) => return Err(RelayError::Registration { oracle, source }),
            };
            info!(oracle = %oracle, ?indexes, "relay oracle ready");
            oracles.push((oracle, indexes));
        }

        Ok(Self {
            market,
            oracles,
            source,
            config,
        })
    }

    pub fn oracles(&self) -> &[(Address, OracleIndexes)] {
        &self.oracles
    }

    /// Oracles routed a given index
    pub fn oracles_for(&self, routing_index: u8) -> Vec<Address> {
        self.oracles
            .iter()
            .filter(|(_, indexes)| indexes.contains(&routing_index))
            .map(|(address, _)| *address)
            .collect()
    }

    /// Answer one request from every eligible oracle
    pub async fn respond(&self, request: &OracleRequest) -> RelayStats {
        let mut stats = RelayStats {
            requests_seen: 1,
            ..RelayStats::default()
        };

        let status = self.source.status_for(request).await;
        if status == FlightStatus::Unknown {
            debug!(flight = %request.flight, "no status to report");
            return stats;
        }

        let eligible = self.oracles_for(request.routing_index);
        debug!(
            flight = %request.flight,
            routing_index = request.routing_index,
            oracles = eligible.len(),
            %status,
            "answering oracle request"
        );

        for oracle in eligible {
            self.submit_with_retry(oracle, request, status, &mut stats).await;
        }
        stats
    }

    async fn submit_with_retry(
        &self,
        oracle: Address,
        request: &OracleRequest,
        status: FlightStatus,
        stats: &mut RelayStats,
    ) {
        let mut attempt = 0u32;
        loop {
            let result = self.market.submit_oracle_response(
                oracle,
                request.routing_index,
                request.airline,
                &request.flight,
                request.timestamp,
                status.code(),
            );

            match result {
                Ok(ResponseOutcome::Recorded { .. }) => {
                    stats.reports_accepted += 1;
                    return;
                }
                Ok(ResponseOutcome::Finalized { .. }) => {
                    stats.reports_accepted += 1;
                    stats.finalizations += 1;
                    return;
                }
                Ok(ResponseOutcome::Ignored { .. }) => {
                    stats.reports_ignored += 1;
                    return;
                }
                Err(MarketError::OperationPaused) if attempt < self.config.max_retries => {
                    attempt += 1;
                    stats.retries += 1;
                    let backoff = self.config.retry_backoff_ms * attempt as u64;
                    debug!(oracle = %oracle, attempt, backoff, "market paused, retrying");
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => {
                    warn!(oracle = %oracle, error = %e, "oracle report rejected");
                    stats.reports_rejected += 1;
                    return;
                }
            }
        }
    }

    /// Start listening for requests in a background task.
    ///
    /// Must be called from within a tokio runtime. Dropping the returned
    /// handle stops the relay.
    pub fn spawn(self) -> RelayHandle {
        let mut events = self.market.subscribe();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut totals = RelayStats::default();
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    received = events.recv() => match received {
                        Ok(LedgerEvent::OracleRequest(request)) => {
                            let stats = self.respond(&request).await;
                            totals.absorb(&stats);
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "relay lagged behind ledger events");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            info!(?totals, "oracle relay stopped");
            totals
        });

        RelayHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Handle to a running relay
pub struct RelayHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<RelayStats>,
}

impl RelayHandle {
    /// Stop the relay and collect its counters
    pub async fn shutdown(mut self) -> Result<RelayStats, RelayError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task
            .await
            .map_err(|e| RelayError::TaskFailed(e.to_string()))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
