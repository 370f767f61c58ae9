//! Printer link engine
//!
//! [`PrinterLink`] owns the serial connection to the machine. Submissions
//! are framed with line numbers and checksums, gated by the firmware's
//! stop-and-wait flow control, and replayed on request when a transmission
//! arrives corrupted. A dedicated background thread reads and dispatches
//! firmware responses; any number of other threads may submit commands or
//! take status snapshots concurrently.
//!
//! All mutable link state lives behind a single lock that is held only for
//! the duration of each state transition, never across the blocking read.

use crate::codec::{self, OutgoingLine, RawDirective, Response};
use crate::device::{Device, ResetStrategy};
use crate::flow::FlowController;
use crate::queue::CommandQueue;
use crate::serial::{SerialTransport, Transport};
use parking_lot::Mutex;
use replink_core::{ConnectionError, LinkState, LinkStatus, Result};
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::thread;

/// Handshake no-op transmitted after every protocol reset. The firmware
/// answers it with an acknowledgment, proving the link is alive. Sent
/// unnumbered so the first real command after a reset is line 1.
pub const BOOTSTRAP_COMMAND: &str = "M101";

/// Banner prefixes firmware prints when it (re)boots
pub const DEFAULT_GREETINGS: [&str; 2] = ["start", "Grbl"];

/// Configuration for a printer link
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Greeting prefixes that mark a firmware boot banner
    pub greetings: Vec<String>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            greetings: DEFAULT_GREETINGS.iter().map(|g| g.to_string()).collect(),
        }
    }
}

/// State behind the engine lock
#[derive(Default)]
struct LinkInner {
    /// Open transport; `None` while disconnected
    transport: Option<Arc<dyn Transport>>,
    /// Reset signaling for the connected device
    reset_strategy: ResetStrategy,
    /// Send-window accounting
    flow: FlowController,
    /// Last line number handed out; the next submission gets `sequence + 1`
    sequence: u32,
    /// Transmitted and queued lines by sequence, retained for resends
    history: BTreeMap<u32, OutgoingLine>,
    /// Sequence of the most recently transmitted line
    last_sent: Option<u32>,
    /// Bumped on every connect/disconnect; stale readers see a mismatch and
    /// exit
    generation: u64,
}

struct LinkShared {
    config: LinkConfig,
    queue: CommandQueue,
    inner: Mutex<LinkInner>,
}

impl LinkShared {
    fn submit(&self, command: &str) {
        let mut inner = self.inner.lock();
        inner.sequence += 1;
        let line = codec::encode(inner.sequence, command);
        inner.history.insert(line.sequence, line.clone());
        tracing::debug!(sequence = line.sequence, "queued {}", command);

        if inner.transport.is_some() && inner.flow.can_send() && self.queue.is_empty() {
            self.transmit(&mut inner, line);
        } else {
            self.queue.enqueue_tail(line);
        }
    }

    fn reset(&self) {
        let mut inner = self.inner.lock();
        self.queue.clear();
        inner.history.clear();
        inner.sequence = 0;
        inner.last_sent = None;
        inner.flow.grant();
        tracing::info!("protocol state reset");

        if let Some(transport) = inner.transport.clone() {
            let mut wire = BOOTSTRAP_COMMAND.as_bytes().to_vec();
            wire.push(b'\n');
            tracing::debug!("sending {}", BOOTSTRAP_COMMAND);
            if let Err(e) = transport.send(&wire) {
                tracing::error!("bootstrap write failed: {}", e);
                self.drop_connection(&mut inner);
            }
        }
    }

    fn handle_line(&self, generation: u64, line: &str) {
        if line.is_empty() {
            return;
        }

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }
        tracing::debug!("received {}", line);

        match codec::classify(line, &self.config.greetings) {
            Response::Greeting => {
                tracing::info!("firmware greeting: {}", line);
                inner.flow.grant();
            }
            Response::Ack => {
                inner.flow.grant();
                Self::retire_confirmed(&mut inner);
            }
            Response::ResendRequest { line_number } => {
                // The firmware-reported number is ignored on purpose: with a
                // send window of one command, only the most recently
                // transmitted line can be unacknowledged. A wider window
                // must key this off `line_number` against the history.
                let last = inner.last_sent;
                match last.and_then(|seq| inner.history.get(&seq).cloned()) {
                    Some(sent) => {
                        tracing::warn!(
                            sequence = sent.sequence,
                            requested = line_number,
                            "resend requested, replaying last transmitted line"
                        );
                        self.queue.enqueue_head(sent);
                    }
                    None => {
                        tracing::warn!(
                            requested = line_number,
                            "resend requested but no transmitted line is retained"
                        );
                    }
                }
                inner.flow.grant();
            }
            Response::Fault => {
                inner.flow.withhold();
                tracing::error!("hardware fault reported: {}", line);
            }
            Response::Informational => {
                tracing::debug!("info: {}", line);
            }
        }

        self.drain(&mut inner);
    }

    /// An acknowledgment retires the in-flight line; nothing at or below it
    /// can be asked for again
    fn retire_confirmed(inner: &mut LinkInner) {
        if let Some(seq) = inner.last_sent {
            inner.history = inner.history.split_off(&(seq + 1));
        }
    }

    fn drain(&self, inner: &mut LinkInner) {
        while inner.flow.credits() > 0 && inner.transport.is_some() {
            let Some(line) = self.queue.dequeue() else {
                break;
            };
            self.transmit(inner, line);
        }
    }

    fn transmit(&self, inner: &mut LinkInner, line: OutgoingLine) {
        let Some(transport) = inner.transport.clone() else {
            self.queue.enqueue_head(line);
            return;
        };

        tracing::debug!(
            sequence = line.sequence,
            "sending {}",
            String::from_utf8_lossy(&line.wire).trim_end()
        );
        if let Err(e) = transport.send(&line.wire) {
            tracing::error!("write failed, dropping connection: {}", e);
            self.drop_connection(inner);
            return;
        }

        inner.flow.consume();
        inner.last_sent = Some(line.sequence);
    }

    fn handle_transport_loss(&self, generation: u64, err: io::Error) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }
        tracing::error!("connection lost: {}", err);
        self.drop_connection(&mut inner);
    }

    fn drop_connection(&self, inner: &mut LinkInner) {
        inner.transport = None;
        inner.generation += 1;
        inner.flow.withhold();
    }
}

fn reader_loop(shared: Arc<LinkShared>, transport: Arc<dyn Transport>, generation: u64) {
    loop {
        if shared.inner.lock().generation != generation {
            break;
        }

        match transport.recv_line() {
            Ok(Some(line)) => shared.handle_line(generation, &line),
            Ok(None) => {}
            Err(err) => {
                shared.handle_transport_loss(generation, err);
                break;
            }
        }
    }
    tracing::debug!("reader loop exited");
}

/// Thread-safe handle to the printer link engine
///
/// Cheap to clone; all clones drive the same link. Lifecycle is
/// `connect → … → disconnect`: disconnect before dropping the last handle so
/// the background reader winds down.
#[derive(Clone)]
pub struct PrinterLink {
    shared: Arc<LinkShared>,
}

impl PrinterLink {
    /// Create a link with the default configuration
    pub fn new() -> Self {
        Self::with_config(LinkConfig::default())
    }

    /// Create a link with a custom configuration
    pub fn with_config(config: LinkConfig) -> Self {
        Self {
            shared: Arc::new(LinkShared {
                config,
                queue: CommandQueue::new(),
                inner: Mutex::new(LinkInner::default()),
            }),
        }
    }

    /// Open the device and bring the link up
    ///
    /// Starts the background reader and runs the hard-reset handshake; on
    /// success the link is ready to send with an empty queue. On failure the
    /// link stays disconnected and the error is returned; no retry is
    /// attempted.
    pub fn connect(&self, device: &Device) -> Result<()> {
        let transport = SerialTransport::open(device)?;
        tracing::info!("opened {} at {} baud", device.path, device.baud_rate);
        self.attach(Box::new(transport), device.reset_strategy)
    }

    /// Bring the link up over an already-open transport
    ///
    /// This is the seam `connect` goes through; alternative transports
    /// (in-memory, network bridges) attach here directly.
    pub fn attach(&self, transport: Box<dyn Transport>, reset_strategy: ResetStrategy) -> Result<()> {
        self.disconnect();

        let transport: Arc<dyn Transport> = Arc::from(transport);
        let generation = {
            let mut inner = self.shared.inner.lock();
            inner.generation += 1;
            inner.transport = Some(transport.clone());
            inner.reset_strategy = reset_strategy;
            inner.flow.withhold();
            inner.generation
        };

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("replink-reader".to_string())
            .spawn(move || reader_loop(shared, transport, generation));
        if let Err(e) = spawned {
            self.disconnect();
            return Err(e.into());
        }

        if let Err(e) = self.hard_reset() {
            self.disconnect();
            return Err(e);
        }
        Ok(())
    }

    /// Close the link; idempotent
    ///
    /// The background reader exits on its next poll tick. Commands already
    /// transmitted are not un-sent; the machine may still execute them.
    pub fn disconnect(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.transport.is_some() {
            tracing::info!("disconnected");
        }
        inner.transport = None;
        inner.generation += 1;
        inner.flow.withhold();
    }

    /// Whether the serial handle is open
    pub fn is_connected(&self) -> bool {
        self.shared.inner.lock().transport.is_some()
    }

    /// Submit one already-formatted G-code command
    ///
    /// The command is framed with the next line number and either
    /// transmitted immediately (send window open, nothing queued ahead of
    /// it) or appended to the pending queue. Never fails from the caller's
    /// perspective; transport problems surface via the background loop and
    /// [`status`](Self::status).
    pub fn submit(&self, command: &str) {
        self.shared.submit(command);
    }

    /// Feed a raw multi-line blob (e.g. a .gcode file body)
    ///
    /// Lines that do not start with a command word are dropped; a line-counter
    /// reset (M110) triggers a full protocol reset in place of the line.
    pub fn submit_raw(&self, blob: &str) {
        for directive in codec::scan_blob(blob) {
            match directive {
                RawDirective::Command(line) => self.submit(&line),
                RawDirective::CounterReset => {
                    tracing::info!("raw blob requested a line-counter reset");
                    self.reset();
                }
            }
        }
    }

    /// Reset the protocol state without touching the serial handle
    ///
    /// Clears the queue and history, restarts line numbering, opens the send
    /// window, and puts the bootstrap handshake line on the wire.
    pub fn reset(&self) {
        self.shared.reset();
    }

    /// Hardware-reset the controller, then reset the protocol state
    ///
    /// Drives the control lines through the device's reset choreography
    /// (sleeping for the pulse and settle times without holding the engine
    /// lock), then performs [`reset`](Self::reset).
    pub fn hard_reset(&self) -> Result<()> {
        let (transport, strategy) = {
            let inner = self.shared.inner.lock();
            (inner.transport.clone(), inner.reset_strategy)
        };
        let transport = transport.ok_or(ConnectionError::NotConnected)?;

        tracing::info!("hard resetting controller ({})", strategy);
        strategy.signal(transport.as_ref())?;
        self.reset();
        Ok(())
    }

    /// Snapshot of the link state; non-blocking, safe from any thread
    pub fn status(&self) -> LinkStatus {
        let inner = self.shared.inner.lock();
        let connected = inner.transport.is_some();
        let state = if !connected {
            LinkState::Disconnected
        } else if inner.flow.can_send() {
            LinkState::ReadyToSend
        } else {
            LinkState::Connected
        };

        LinkStatus {
            state,
            credits: inner.flow.credits(),
            connected,
            queue_length: self.shared.queue.len(),
        }
    }

    /// Enable or disable direct mode (submissions bypass flow control)
    pub fn set_direct_mode(&self, enabled: bool) {
        self.shared.inner.lock().flow.set_direct_mode(enabled);
    }

    /// Whether direct mode is enabled
    pub fn direct_mode(&self) -> bool {
        self.shared.inner.lock().flow.direct_mode()
    }
}

impl Default for PrinterLink {
    fn default() -> Self {
        Self::new()
    }
}

// Test helpers and unit tests
#[cfg(test)]
impl PrinterLink {
    /// Attach a transport without hardware signaling or a reader thread
    /// (test helper)
    pub(crate) fn attach_bare(&self, transport: Arc<dyn Transport>) {
        {
            let mut inner = self.shared.inner.lock();
            inner.generation += 1;
            inner.transport = Some(transport);
            inner.flow.withhold();
        }
        self.reset();
    }

    /// Dispatch a firmware line as the reader loop would (test helper)
    pub(crate) fn feed(&self, line: &str) {
        let generation = self.shared.inner.lock().generation;
        self.shared.handle_line(generation, line.trim());
    }

    /// Fail the connection as a reader-side transport error would (test
    /// helper)
    pub(crate) fn fail_transport(&self) {
        let generation = self.shared.inner.lock().generation;
        self.shared.handle_transport_loss(
            generation,
            io::Error::new(io::ErrorKind::UnexpectedEof, "stream closed"),
        );
    }
}
