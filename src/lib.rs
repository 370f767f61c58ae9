//! # Replink
//!
//! A printer link engine for RepRap-style 3D printers. Replink owns the
//! serial connection to the machine, frames outgoing G-code into the
//! checksummed `N<seq> <cmd> *<checksum>` wire format, enforces the
//! firmware's stop-and-wait flow control so its tiny receive buffer is never
//! overrun, and transparently recovers from corrupted transmissions via
//! firmware-requested resends.
//!
//! ## Architecture
//!
//! Replink is organized as a workspace with two crates:
//!
//! 1. **replink-core** - Error taxonomy and shared result alias
//! 2. **replink-communication** - Serial transport, line codec, command
//!    queue, flow control, and the link state machine
//!
//! The root crate re-exports the public surface and owns logging setup. The
//! surrounding application (event loop, joystick dispatch, console) lives
//! outside this repository and consumes [`PrinterLink`] as an explicitly
//! owned handle.

pub use replink_core::{ConnectionError, Error, LinkState, LinkStatus, Result};

pub use replink_communication::{
    list_ports, CommandQueue, Device, FlowController, LinkConfig, OutgoingLine, PrinterLink,
    RawDirective, ResetStrategy, Response, SerialPortInfo, SerialTransport, Transport,
    BOOTSTRAP_COMMAND, DEFAULT_BAUD_RATE, DEFAULT_GREETINGS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
