//! Integration tests driving the full engine: real background reader thread,
//! in-memory transport fed from the test side.

use parking_lot::Mutex;
use replink_communication::{
    Device, LinkState, PrinterLink, ResetStrategy, Transport, DEFAULT_BAUD_RATE,
};
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// In-memory transport: the test pushes firmware lines through a channel and
/// inspects everything the engine wrote.
struct ChannelTransport {
    sent: Arc<Mutex<Vec<String>>>,
    rx: Mutex<Receiver<io::Result<String>>>,
}

impl ChannelTransport {
    fn new() -> (Box<Self>, Sender<io::Result<String>>, Arc<Mutex<Vec<String>>>) {
        let (tx, rx) = mpsc::channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = Box::new(Self {
            sent: sent.clone(),
            rx: Mutex::new(rx),
        });
        (transport, tx, sent)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, data: &[u8]) -> io::Result<()> {
        self.sent
            .lock()
            .push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn recv_line(&self) -> io::Result<Option<String>> {
        match self.rx.lock().recv_timeout(Duration::from_millis(10)) {
            Ok(Ok(line)) => Ok(Some(line)),
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed",
            )),
        }
    }

    fn set_data_terminal_ready(&self, _level: bool) -> io::Result<()> {
        Ok(())
    }

    fn set_request_to_send(&self, _level: bool) -> io::Result<()> {
        Ok(())
    }
}

/// Poll until the condition holds; panics after two seconds.
fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {}", what);
}

#[test]
fn end_to_end_connect_submit_ack_cycle() {
    let (transport, tx, sent) = ChannelTransport::new();
    let link = PrinterLink::new();

    link.attach(transport, ResetStrategy::RepRap).unwrap();

    // The handshake put the bootstrap line on the wire and opened the window.
    assert_eq!(sent.lock().first().unwrap(), "M101\n");
    assert_eq!(link.status().credits, 1);

    // Firmware boots and greets us.
    tx.send(Ok("start".to_string())).unwrap();
    wait_until("greeting to land", || link.status().credits == 1);

    link.submit("G28");
    wait_until("G28 to transmit", || {
        sent.lock().iter().any(|l| l == "N1 G28 *50\n")
    });
    assert_eq!(link.status().credits, 0);

    // Queue a second command; it drains on the acknowledgment.
    link.submit("M105");
    assert_eq!(link.status().queue_length, 1);

    tx.send(Ok("ok".to_string())).unwrap();
    wait_until("M105 to drain", || {
        sent.lock().iter().any(|l| l.starts_with("N2 M105 "))
    });
    assert_eq!(link.status().queue_length, 0);

    link.disconnect();
    assert!(!link.status().connected);
}

#[test]
fn transport_error_forces_disconnect_and_halts_draining() {
    let (transport, tx, sent) = ChannelTransport::new();
    let link = PrinterLink::new();

    link.attach(transport, ResetStrategy::Arduino).unwrap();

    tx.send(Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")))
        .unwrap();
    wait_until("the link to notice the loss", || !link.status().connected);
    assert_eq!(link.status().state, LinkState::Disconnected);

    // Later submissions queue but are never drained.
    let writes_before = sent.lock().len();
    link.submit("G28");
    link.submit("M105");
    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(link.status().queue_length, 2);
    assert_eq!(sent.lock().len(), writes_before);
}

#[test]
fn responses_interleave_with_submissions_in_order() {
    let (transport, tx, sent) = ChannelTransport::new();
    let link = PrinterLink::new();

    link.attach(transport, ResetStrategy::Arduino).unwrap();

    link.submit("G28");
    link.submit("G1 X10");
    link.submit("G1 X20");

    tx.send(Ok("ok".to_string())).unwrap();
    tx.send(Ok("T:21.3 B:20.1".to_string())).unwrap();
    tx.send(Ok("ok".to_string())).unwrap();

    wait_until("all three commands to transmit", || {
        sent.lock().iter().filter(|l| l.starts_with('N')).count() == 3
    });

    let sent = sent.lock();
    let numbered: Vec<&String> = sent.iter().filter(|l| l.starts_with('N')).collect();
    assert!(numbered[0].starts_with("N1 G28 "));
    assert!(numbered[1].starts_with("N2 G1 X10 "));
    assert!(numbered[2].starts_with("N3 G1 X20 "));
}

#[test]
fn resend_request_from_the_wire_replays_the_last_line() {
    let (transport, tx, sent) = ChannelTransport::new();
    let link = PrinterLink::new();

    link.attach(transport, ResetStrategy::Arduino).unwrap();

    link.submit("G1 X10 Y0");
    wait_until("the command to transmit", || {
        sent.lock().iter().any(|l| l.starts_with("N1 "))
    });
    let original = sent
        .lock()
        .iter()
        .find(|l| l.starts_with("N1 "))
        .unwrap()
        .clone();

    tx.send(Ok("rs 1".to_string())).unwrap();
    wait_until("the replay to transmit", || {
        sent.lock().iter().filter(|l| **l == original).count() == 2
    });
}

#[test]
fn status_snapshot_serializes_for_the_console() {
    let link = PrinterLink::new();
    let value = serde_json::to_value(link.status()).unwrap();

    assert_eq!(value["state"], "Disconnected");
    assert_eq!(value["credits"], 0);
    assert_eq!(value["connected"], false);
    assert_eq!(value["queue_length"], 0);
}

#[test]
fn connecting_to_a_missing_device_fails_cleanly() {
    let device = Device::new("/dev/ttyUSB-nonexistent-replink")
        .with_baud_rate(DEFAULT_BAUD_RATE)
        .with_reset_strategy(ResetStrategy::RepRap);

    let link = PrinterLink::new();
    let err = link.connect(&device).unwrap_err();
    assert!(err.is_connection_error());
    assert!(!link.status().connected);
}
