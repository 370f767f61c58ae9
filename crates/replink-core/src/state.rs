//! Link state types
//!
//! The connection state machine and the read-only status snapshot exposed to
//! callers (console, event loop, scripts).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state of a printer link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkState {
    /// No serial connection is established
    #[default]
    Disconnected,
    /// Connected, but the firmware has not authorized a send
    Connected,
    /// Connected and authorized to transmit (credits available or direct mode)
    ReadyToSend,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
            Self::ReadyToSend => write!(f, "ready_to_send"),
        }
    }
}

/// Read-only snapshot of a link's state
///
/// Safe to request from any thread; never blocks on I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    /// Current connection state
    pub state: LinkState,
    /// Commands the firmware currently authorizes us to send
    pub credits: u32,
    /// Whether the serial handle is open
    pub connected: bool,
    /// Commands waiting in the pending queue
    pub queue_length: usize,
}

impl LinkStatus {
    /// Snapshot for a link with no connection
    pub fn disconnected() -> Self {
        Self {
            state: LinkState::Disconnected,
            credits: 0,
            connected: false,
            queue_length: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_disconnected() {
        assert_eq!(LinkState::default(), LinkState::Disconnected);
        assert_eq!(LinkState::ReadyToSend.to_string(), "ready_to_send");
    }

    #[test]
    fn disconnected_snapshot_is_empty() {
        let status = LinkStatus::disconnected();
        assert_eq!(status.credits, 0);
        assert_eq!(status.queue_length, 0);
        assert!(!status.connected);
    }
}
