// src/io/mod.rs
//
// Analyzer links. A link is a point-to-point byte source (serial port or TCP
// socket) read in bounded-timeout chunks.

mod error;
pub mod serial;
pub mod tcp;

pub use error::IoError;
pub use serial::{list_serial_ports, Parity, SerialLink, SerialPortInfo, StopBits};
pub use tcp::TcpLink;

use std::io::ErrorKind;

use crate::settings::LinkSettings;

/// A byte source that never blocks longer than its configured read timeout.
pub trait Link: Send {
    /// Read whatever arrived within the timeout window.
    ///
    /// Returns `Ok(0)` when the timeout expired without data. EOF and any
    /// other failure are reported as errors.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, IoError>;

    /// Human-readable device label used in logs and errors
    fn label(&self) -> &str;
}

/// Where the analyzer is attached
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// Serial device name (`/dev/ttyUSB0`, `COM3`)
    Serial(String),
    /// LAN endpoint written as `tcp://host:port`
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    pub fn parse(text: &str) -> Result<Endpoint, IoError> {
        let text = text.trim();
        let Some(rest) = text.strip_prefix("tcp://") else {
            if text.is_empty() {
                return Err(IoError::configuration("link", "empty port name"));
            }
            return Ok(Endpoint::Serial(text.to_string()));
        };

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| IoError::configuration(text, "expected tcp://host:port"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(IoError::configuration(text, "missing host"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| IoError::configuration(text, format!("invalid TCP port '{}'", port)))?;

        Ok(Endpoint::Tcp {
            host: host.to_string(),
            port,
        })
    }
}

/// Open the configured link. Failure here is fatal to the process.
pub fn open_link(settings: &LinkSettings) -> Result<Box<dyn Link>, IoError> {
    match Endpoint::parse(&settings.port)? {
        Endpoint::Serial(name) => Ok(Box::new(SerialLink::open(&name, settings)?)),
        Endpoint::Tcp { host, port } => {
            Ok(Box::new(TcpLink::connect(&host, port, settings.read_timeout)?))
        }
    }
}

/// Map a raw `Read::read` outcome onto the link contract.
pub(crate) fn classify_read(device: &str, result: std::io::Result<usize>) -> Result<usize, IoError> {
    match result {
        Ok(0) => Err(IoError::disconnected(device)),
        Ok(n) => Ok(n),
        Err(ref e)
            if matches!(
                e.kind(),
                ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
            ) =>
        {
            Ok(0)
        }
        Err(e) => Err(IoError::read(device, e.to_string())),
    }
}
