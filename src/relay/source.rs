// Status sources - what a relay reports for a request

use crate::flight::FlightStatus;
use crate::ledger::OracleRequest;
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

/// Decides the status an oracle reports for a request
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn status_for(&self, request: &OracleRequest) -> FlightStatus;
}

/// Reports one operator-controlled default status for every request
pub struct DefaultStatusSource {
    current: watch::Sender<FlightStatus>,
}

impl DefaultStatusSource {
    pub fn new(initial: FlightStatus) -> Self {
        let (current, _) = watch::channel(initial);
        Self { current }
    }

    pub fn current(&self) -> FlightStatus {
        *self.current.borrow()
    }

    pub fn set(&self, status: FlightStatus) {
        self.current.send_replace(status);
        info!(%status, "default relay status changed");
    }

    /// Operator override by wire code; unlisted codes fall back to Unknown,
    /// which makes the relay stay silent
    pub fn set_code(&self, code: u8) -> FlightStatus {
        let status = FlightStatus::from_code(code).unwrap_or(FlightStatus::Unknown);
        self.set(status);
        status
    }

    /// Observe changes to the default
    pub fn watch(&self) -> watch::Receiver<FlightStatus> {
        self.current.subscribe()
    }
}

impl Default for DefaultStatusSource {
    fn default() -> Self {
        Self::new(FlightStatus::OnTime)
    }
}

#[async_trait]
impl StatusSource for DefaultStatusSource {
    async fn status_for(&self, _request: &OracleRequest) -> FlightStatus {
        self.current()
    }
}
