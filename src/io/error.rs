// src/io/error.rs
//
// Typed errors for link drivers (serial, TCP).

use thiserror::Error;

/// Errors raised while opening or reading an analyzer link.
///
/// Every variant carries the device label (`/dev/ttyUSB0`, `tcp(10.0.0.5:4000)`)
/// so the operator can tell which link failed.
#[derive(Debug, Error)]
pub enum IoError {
    /// Link parameters could not be interpreted
    #[error("{device}: invalid configuration: {message}")]
    Configuration { device: String, message: String },

    /// The driver accepted the parameters but the link refused to open
    #[error("{device}: failed to open: {message}")]
    Connection { device: String, message: String },

    /// An operation did not complete within its deadline
    #[error("{device}: timed out during {operation}")]
    Timeout { device: String, operation: String },

    /// A control operation on an open link failed
    #[error("{device}: {message}")]
    Protocol { device: String, message: String },

    /// The link parameters are valid but the driver cannot express them
    #[error("{device}: unsupported setting: {message}")]
    Unsupported { device: String, message: String },

    /// A read failed for a reason other than an expired timeout
    #[error("{device}: read error: {message}")]
    Read { device: String, message: String },

    /// The peer closed the link (EOF)
    #[error("{device}: link closed by peer")]
    Disconnected { device: String },
}

impl IoError {
    pub fn configuration(device: &str, message: impl Into<String>) -> Self {
        IoError::Configuration {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn connection(device: &str, message: impl Into<String>) -> Self {
        IoError::Connection {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn timeout(device: &str, operation: impl Into<String>) -> Self {
        IoError::Timeout {
            device: device.to_string(),
            operation: operation.into(),
        }
    }

    pub fn protocol(device: &str, message: impl Into<String>) -> Self {
        IoError::Protocol {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn unsupported(device: &str, message: impl Into<String>) -> Self {
        IoError::Unsupported {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn read(device: &str, message: impl Into<String>) -> Self {
        IoError::Read {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn disconnected(device: &str) -> Self {
        IoError::Disconnected {
            device: device.to_string(),
        }
    }

    /// Lifecycle stage the error belongs to, for operator diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            IoError::Read { .. } | IoError::Disconnected { .. } => "read",
            _ => "open",
        }
    }
}
