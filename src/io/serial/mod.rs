// src/io/serial/mod.rs
//
// Serial port link for RS-232 analyzers.
//
// Features:
// - Full line-parameter mapping (data bits, parity, stop bits)
// - RTS/CTS hardware flow control, DTR assertion for DSR/DTR handshaking
// - Port enumeration for the --list-ports command

pub mod reader;
pub(crate) mod utils;

pub use reader::{list_serial_ports, parity_supported, SerialLink, SerialPortInfo};
pub use utils::{Parity, StopBits};
