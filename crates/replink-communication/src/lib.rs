//! # Replink Communication
//!
//! The printer link engine: serial transport, wire framing, flow control,
//! and the connection state machine for RepRap-style firmware.
//!
//! The engine speaks the checksummed line protocol
//! (`N<seq> <cmd> *<checksum>\n`) and enforces a stop-and-wait window so the
//! firmware's receive buffer holds at most one unacknowledged command.
//! Corrupted transmissions are replayed transparently when the firmware
//! requests a resend.

pub mod codec;
pub mod device;
pub mod flow;
pub mod link;
pub mod queue;
pub mod serial;

pub use codec::{OutgoingLine, RawDirective, Response};
pub use device::{Device, ResetStrategy, DEFAULT_BAUD_RATE};
pub use flow::FlowController;
pub use link::{LinkConfig, PrinterLink, BOOTSTRAP_COMMAND, DEFAULT_GREETINGS};
pub use queue::CommandQueue;
pub use serial::{list_ports, SerialPortInfo, SerialTransport, Transport};

pub use replink_core::{LinkState, LinkStatus};
