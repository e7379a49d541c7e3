//! Session connection status state machine
//!
//! `Connecting → Connected`, exactly once, driven by the settle delay elapsing.
//! Peer count plays no part: an empty room still becomes `Connected`.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Session readiness as reported to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
}

/// Events that drive the status machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    SettleElapsed,
}

/// Rejected status transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid status transition from {from} on {event:?}")]
pub struct StateTransitionError {
    pub from: ConnectionStatus,
    pub event: StatusEvent,
}

impl ConnectionStatus {
    pub fn state_name(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
        }
    }

    /// Consume the current status and produce the next one
    pub fn transition(self, event: StatusEvent) -> Result<ConnectionStatus, StateTransitionError> {
        match (self, event) {
            (ConnectionStatus::Connecting, StatusEvent::SettleElapsed) => {
                Ok(ConnectionStatus::Connected)
            }
            (from, event) => Err(StateTransitionError { from, event }),
        }
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Connecting
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_connects_once() {
        let status = ConnectionStatus::default();
        assert_eq!(status, ConnectionStatus::Connecting);

        let status = status.transition(StatusEvent::SettleElapsed).unwrap();
        assert_eq!(status, ConnectionStatus::Connected);

        let err = status.transition(StatusEvent::SettleElapsed).unwrap_err();
        assert_eq!(err.from, ConnectionStatus::Connected);
    }
}
