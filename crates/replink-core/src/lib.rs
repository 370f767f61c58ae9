//! # Replink Core
//!
//! Shared types for the Replink printer link engine: the error taxonomy and
//! the link state machine types consumed by both the engine and its callers.

pub mod error;
pub mod state;

pub use error::{ConnectionError, Error, Result};
pub use state::{LinkState, LinkStatus};
