//! Error handling for Replink
//!
//! Provides error types for the printer link engine:
//! - Connection errors (opening, enumerating, and losing serial devices)
//! - A unified `Error` used in public APIs
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents errors related to the serial connection to the printer,
/// reported synchronously by `connect` or raised by the background reader
/// when the transport fails.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Failed to open the device
    #[error("Failed to open device {device}: {reason}")]
    FailedToOpen {
        /// The device path that failed to open.
        device: String,
        /// The reason the device failed to open.
        reason: String,
    },

    /// No link is currently established
    #[error("Printer not connected")]
    NotConnected,

    /// The transport failed mid-session
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// Device enumeration failed
    #[error("Failed to enumerate serial devices: {reason}")]
    EnumerationFailed {
        /// The reason enumeration failed.
        reason: String,
    },
}

/// Main error type for Replink
///
/// A unified error type used in the public API surface.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
