// src/io/serial/utils.rs
//
// Line-parameter types and their mapping onto the serialport crate.

use std::fmt;
use std::str::FromStr;

use serialport::{DataBits, FlowControl, Parity as SpParity, StopBits as SpStopBits};

// ============================================================================
// Types
// ============================================================================

/// Parity setting for serial port configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
    Mark,
    Space,
}

impl Parity {
    /// Single-letter form used in `8-N-1` notation
    pub fn letter(&self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        }
    }
}

impl FromStr for Parity {
    type Err = String;

    /// Accepts full names or the N/E/O/M/S letters, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "n" | "none" => Ok(Parity::None),
            "e" | "even" => Ok(Parity::Even),
            "o" | "odd" => Ok(Parity::Odd),
            "m" | "mark" => Ok(Parity::Mark),
            "s" | "space" => Ok(Parity::Space),
            other => Err(format!("unknown parity '{}'", other)),
        }
    }
}

/// Stop-bit count. 1.5 is a legal UART setting for 5-bit words.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    pub fn from_count(count: f64) -> Option<StopBits> {
        if count == 1.0 {
            Some(StopBits::One)
        } else if count == 1.5 {
            Some(StopBits::OnePointFive)
        } else if count == 2.0 {
            Some(StopBits::Two)
        } else {
            None
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopBits::One => write!(f, "1"),
            StopBits::OnePointFive => write!(f, "1.5"),
            StopBits::Two => write!(f, "2"),
        }
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert our Parity enum to serialport crate's Parity type.
/// Returns `None` for mark/space, which the driver cannot express.
pub fn to_serialport_parity(p: Parity) -> Option<SpParity> {
    match p {
        Parity::None => Some(SpParity::None),
        Parity::Odd => Some(SpParity::Odd),
        Parity::Even => Some(SpParity::Even),
        Parity::Mark | Parity::Space => None,
    }
}

/// Convert data bits count to serialport crate's DataBits type
pub fn to_serialport_data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

/// Convert stop bits to serialport crate's StopBits type.
/// The driver has no 1.5 setting; it is driven as two stop bits.
pub fn to_serialport_stop_bits(bits: StopBits) -> SpStopBits {
    match bits {
        StopBits::One => SpStopBits::One,
        StopBits::OnePointFive | StopBits::Two => SpStopBits::Two,
    }
}

/// RTS/CTS maps onto the driver's hardware flow control. DSR/DTR is handled
/// separately by asserting DTR after open.
pub fn to_serialport_flow_control(rts_cts: bool) -> FlowControl {
    if rts_cts {
        FlowControl::Hardware
    } else {
        FlowControl::None
    }
}

// ============================================================================
// Tests
// ============================================================================
