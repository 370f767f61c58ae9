//! Printer device description
//!
//! A [`Device`] identifies a serial endpoint (path plus baud rate) together
//! with the hardware reset strategy its electronics expect. The description
//! is immutable once a connection is established.

use crate::serial::Transport;
use serde::{Deserialize, Serialize};
use std::io;
use std::thread;
use std::time::Duration;

/// Default speed for RepRap-style controllers
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// A serial endpoint a printer can be reached at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device path (e.g., "/dev/ttyUSB0", "COM3")
    pub path: String,

    /// Baud rate for the serial connection
    pub baud_rate: u32,

    /// Hardware reset signaling the controller board expects
    pub reset_strategy: ResetStrategy,
}

impl Device {
    /// Describe a device at the default baud rate with the default reset
    /// strategy
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            reset_strategy: ResetStrategy::default(),
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the reset strategy
    pub fn with_reset_strategy(mut self, reset_strategy: ResetStrategy) -> Self {
        self.reset_strategy = reset_strategy;
        self
    }
}

/// Hardware reset signaling variants
///
/// Different firmware/board combinations expect different control-line
/// choreography to trigger a controller reset. The pulse and settle times are
/// fixed, named constants rather than inline sleeps so the choreography stays
/// testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResetStrategy {
    /// Pulse DTR and RTS low; Arduino-based boards reset on the falling edge
    #[default]
    Arduino,
    /// Raise DTR briefly, then drop it; used by some RepRap electronics
    RepRap,
}

impl ResetStrategy {
    /// How long the control lines are held in the reset-asserting position
    pub const PULSE: Duration = Duration::from_millis(200);

    /// Startup time granted to the controller after the lines are released
    pub const SETTLE: Duration = Duration::from_millis(300);

    /// Drive the transport's control lines through this strategy's reset
    /// choreography, sleeping for the pulse and settle times
    pub fn signal(&self, transport: &dyn Transport) -> io::Result<()> {
        match self {
            ResetStrategy::Arduino => {
                transport.set_data_terminal_ready(false)?;
                transport.set_request_to_send(false)?;
                thread::sleep(Self::PULSE);
                transport.set_data_terminal_ready(true)?;
                transport.set_request_to_send(true)?;
                thread::sleep(Self::SETTLE);
            }
            ResetStrategy::RepRap => {
                transport.set_data_terminal_ready(true)?;
                thread::sleep(Self::PULSE);
                transport.set_data_terminal_ready(false)?;
                thread::sleep(Self::SETTLE);
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for ResetStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Arduino => write!(f, "arduino"),
            Self::RepRap => write!(f, "reprap"),
        }
    }
}
