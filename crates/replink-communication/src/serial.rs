//! Serial port communication
//!
//! Provides low-level serial port operations for direct hardware connection
//! to printer controllers via USB or RS-232.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Baud rate configuration
//! - Control-line (DTR/RTS) signaling for hardware resets
//! - Blocking line reads with an internal poll interval

use crate::device::Device;
use parking_lot::Mutex;
use replink_core::{ConnectionError, Result};
use std::io::{self, Read};
use std::time::Duration;

/// Poll interval for the blocking read loop. From the engine's point of view
/// a read blocks until a line arrives; the poll tick only exists so a
/// disconnect is observed promptly.
const READ_POLL: Duration = Duration::from_millis(100);

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set serial number
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

/// List serial ports a printer is likely to be attached to
///
/// Filters the system's ports to the patterns printer controllers enumerate
/// under:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => {
            let port_infos: Vec<SerialPortInfo> = ports
                .iter()
                .filter(|port| is_printer_port(&port.port_name))
                .map(|port| {
                    let info = SerialPortInfo::new(&port.port_name, port_description(port));

                    match &port.port_type {
                        serialport::SerialPortType::UsbPort(usb_info) => {
                            let mut info = info.with_usb_ids(usb_info.vid, usb_info.pid);
                            if let Some(ref mfg) = usb_info.manufacturer {
                                info = info.with_manufacturer(mfg);
                            }
                            if let Some(ref serial) = usb_info.serial_number {
                                info = info.with_serial_number(serial);
                            }
                            info
                        }
                        _ => info,
                    }
                })
                .collect();

            Ok(port_infos)
        }
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(ConnectionError::EnumerationFailed {
                reason: e.to_string(),
            }
            .into())
        }
    }
}

/// Check if a port name matches the patterns printer controllers show up as
fn is_printer_port(port_name: &str) -> bool {
    // Windows COM ports
    if port_name.starts_with("COM") && port_name[3..].chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    // Linux USB and ACM devices
    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }

    // macOS serial and modem devices
    if port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem") {
        return true;
    }

    false
}

/// Get a user-friendly description for a port
fn port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Byte-level transport the link engine is written against
///
/// The real implementation wraps a serial port; tests drive the engine with
/// an in-memory implementation. All methods take `&self` so a single
/// transport can be shared between the submitting side and the background
/// reader.
pub trait Transport: Send + Sync {
    /// Write raw bytes to the device
    fn send(&self, data: &[u8]) -> io::Result<()>;

    /// Read the next line from the device
    ///
    /// Blocks until a full line arrives, returning `Ok(None)` when the poll
    /// interval elapses without one. The returned line is trimmed of its
    /// terminator and surrounding whitespace. An error terminates the
    /// connection.
    fn recv_line(&self) -> io::Result<Option<String>>;

    /// Drive the DTR control line
    fn set_data_terminal_ready(&self, level: bool) -> io::Result<()>;

    /// Drive the RTS control line
    fn set_request_to_send(&self, level: bool) -> io::Result<()>;
}

/// Accumulates raw serial bytes and hands out complete lines
struct LineReader {
    port: Box<dyn serialport::SerialPort>,
    buf: Vec<u8>,
}

impl LineReader {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw).trim().to_string();
                return Ok(Some(line));
            }

            let mut chunk = [0u8; 256];
            match self.port.read(&mut chunk) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "serial stream closed",
                    ))
                }
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

/// Real serial transport backed by the serialport crate
///
/// Holds two cloned handles to the same port: the reader side is only ever
/// locked by the background read loop, the writer side by whichever thread is
/// transmitting, so a blocking read never delays a write.
pub struct SerialTransport {
    writer: Mutex<Box<dyn serialport::SerialPort>>,
    reader: Mutex<LineReader>,
}

impl SerialTransport {
    /// Open the device at 8N1 with no flow control
    pub fn open(device: &Device) -> Result<Self> {
        let open_error = |reason: String| ConnectionError::FailedToOpen {
            device: device.path.clone(),
            reason,
        };

        let writer = serialport::new(&device.path, device.baud_rate)
            .timeout(READ_POLL)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", device.path, e);
                open_error(e.to_string())
            })?;

        let reader = writer.try_clone().map_err(|e| open_error(e.to_string()))?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(LineReader {
                port: reader,
                buf: Vec::new(),
            }),
        })
    }
}

impl Transport for SerialTransport {
    fn send(&self, data: &[u8]) -> io::Result<()> {
        use std::io::Write;
        self.writer.lock().write_all(data)
    }

    fn recv_line(&self) -> io::Result<Option<String>> {
        self.reader.lock().next_line()
    }

    fn set_data_terminal_ready(&self, level: bool) -> io::Result<()> {
        self.writer
            .lock()
            .write_data_terminal_ready(level)
            .map_err(io::Error::from)
    }

    fn set_request_to_send(&self, level: bool) -> io::Result<()> {
        self.writer
            .lock()
            .write_request_to_send(level)
            .map_err(io::Error::from)
    }
}
