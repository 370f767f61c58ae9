//! Wire framing and response classification
//!
//! Outgoing commands are framed as `N<seq> <cmd> *<checksum>\n` where the
//! checksum is an 8-bit XOR over every byte of `N<seq> <cmd> ` including the
//! trailing space, rendered as a decimal integer. The framing must match the
//! firmware byte for byte; the trailing space is part of the checksummed
//! header.
//!
//! Inbound lines are classified by case-sensitive prefix:
//!
//! ```text
//! start / Grbl   greeting, firmware (re)booted
//! ok             acknowledgment, previous command accepted
//! rs / resend    retransmission request after a bad or missing checksum
//! !!             hardware fault, machine shuts down
//! anything else  temperatures, coordinates, debug output
//! ```

use serde::{Deserialize, Serialize};

/// A command line framed for transmission
///
/// `wire` is derived from `sequence` and `payload` once at submission time
/// and never recomputed, so a resend replays exactly the bytes that were
/// first put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingLine {
    /// Monotonic line number, starting at 1
    pub sequence: u32,
    /// The G-code body as submitted by the caller
    pub payload: String,
    /// The framed bytes sent to the device
    pub wire: Vec<u8>,
}

/// 8-bit running XOR over every byte of the header, seeded at 0
pub fn checksum(header: &str) -> u8 {
    header.bytes().fold(0, |c, b| c ^ b)
}

/// Frame a command for transmission under the given line number
pub fn encode(sequence: u32, payload: &str) -> OutgoingLine {
    let header = format!("N{} {} ", sequence, payload);
    let wire = format!("{}*{}\n", header, checksum(&header)).into_bytes();

    OutgoingLine {
        sequence,
        payload: payload.to_string(),
        wire,
    }
}

/// Classification of an inbound firmware line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// Firmware booted or rebooted
    Greeting,
    /// Previous command accepted; one more may be sent
    Ack,
    /// Retransmission request; the reported line number is carried
    /// best-effort but unused while the send window is a single command
    ResendRequest {
        /// Line number the firmware asked for, when it supplied one
        line_number: Option<u32>,
    },
    /// Hardware fault; the machine shuts down after sending this
    Fault,
    /// Temperatures, coordinates, debug output; no protocol state change
    Informational,
}

/// Classify a trimmed inbound line by prefix
pub fn classify(line: &str, greetings: &[String]) -> Response {
    if greetings.iter().any(|g| line.starts_with(g.as_str())) {
        Response::Greeting
    } else if line.starts_with("ok") {
        Response::Ack
    } else if line.starts_with("rs") || line.starts_with("resend") {
        Response::ResendRequest {
            line_number: leading_number(line),
        }
    } else if line.starts_with("!!") {
        Response::Fault
    } else {
        Response::Informational
    }
}

/// Best-effort extraction of the first decimal number in a resend line
/// (formats vary: "rs 3", "Resend:3", "rs N3")
fn leading_number(line: &str) -> Option<u32> {
    let digits: String = line
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// One entry recovered from a raw multi-line blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDirective {
    /// A command line to submit as-is
    Command(String),
    /// The blob asked for a line-counter reset (M110); the link performs a
    /// full protocol reset instead of queueing the line
    CounterReset,
}

/// Scan a raw blob (e.g. the body of a .gcode file) into directives
///
/// Lines must start with a command word (one letter followed by digits) to be
/// kept; comments, blanks, and anything else are dropped.
pub fn scan_blob(blob: &str) -> Vec<RawDirective> {
    blob.lines()
        .filter_map(|line| {
            let line = line.trim();
            let word = command_word(line)?;

            if word.eq_ignore_ascii_case("M110") {
                Some(RawDirective::CounterReset)
            } else {
                Some(RawDirective::Command(line.to_string()))
            }
        })
        .collect()
}

/// Extract the leading command word (letter + digits) from a trimmed line
fn command_word(line: &str) -> Option<String> {
    let mut chars = line.chars();
    let letter = chars.next().filter(|c| c.is_ascii_alphabetic())?;

    let digits: String = chars.take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    Some(format!("{}{}", letter.to_ascii_uppercase(), digits))
}
