// src/io/serial/reader.rs
//
// Serial port link. Opens the port with the configured line parameters and
// hands out bounded-timeout reads to the capture loop.

use std::io::Read;

use serialport::SerialPort;

use super::utils::{
    to_serialport_data_bits, to_serialport_flow_control, to_serialport_parity,
    to_serialport_stop_bits, Parity, StopBits,
};
use crate::io::{classify_read, IoError, Link};
use crate::settings::LinkSettings;

// ============================================================================
// Types
// ============================================================================

/// Information about an available serial port
#[derive(Clone, Debug)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

// ============================================================================
// Serial Link
// ============================================================================

/// An open serial port. The port closes when this value is dropped.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    label: String,
}

impl SerialLink {
    /// Open `name` with the line parameters in `settings`.
    pub fn open(name: &str, settings: &LinkSettings) -> Result<Self, IoError> {
        let parity = to_serialport_parity(settings.parity).ok_or_else(|| {
            IoError::unsupported(
                name,
                format!("{:?} parity is not supported by the serial driver", settings.parity),
            )
        })?;

        if settings.stop_bits == StopBits::OnePointFive {
            tlog!(
                "[serial] {} requested 1.5 stop bits; the driver will use 2",
                name
            );
        }

        let mut port = serialport::new(name, settings.baud_rate)
            .data_bits(to_serialport_data_bits(settings.data_bits))
            .stop_bits(to_serialport_stop_bits(settings.stop_bits))
            .parity(parity)
            .flow_control(to_serialport_flow_control(settings.rts_cts))
            .timeout(settings.read_timeout)
            .open()
            .map_err(|e| IoError::connection(name, e.to_string()))?;

        if settings.dsr_dtr {
            port.write_data_terminal_ready(true)
                .map_err(|e| IoError::protocol(name, format!("assert DTR: {}", e)))?;
            match port.read_data_set_ready() {
                Ok(true) => {}
                Ok(false) => tlog!(
                    "[serial] {}: DSR is not asserted by the analyzer yet",
                    name
                ),
                Err(e) => tlog!("[serial] {}: could not read DSR: {}", name, e),
            }
        }

        tlog!(
            "[serial] Opened {} at {} baud ({}-{}-{}) [rts/cts: {}, dsr/dtr: {}]",
            name,
            settings.baud_rate,
            settings.data_bits,
            settings.parity.letter(),
            settings.stop_bits,
            on_off(settings.rts_cts),
            on_off(settings.dsr_dtr)
        );

        Ok(SerialLink {
            port,
            label: name.to_string(),
        })
    }
}

impl Link for SerialLink {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        let result = self.port.read(buf);
        classify_read(&self.label, result)
    }

    fn label(&self) -> &str {
        &self.label
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

/// Whether the driver can open a port with this parity at all
pub fn parity_supported(parity: Parity) -> bool {
    to_serialport_parity(parity).is_some()
}

// ============================================================================
// Port Discovery
// ============================================================================

impl From<serialport::SerialPortInfo> for SerialPortInfo {
    fn from(p: serialport::SerialPortInfo) -> Self {
        let mut info = SerialPortInfo {
            port_name: p.port_name,
            port_type: String::new(),
            manufacturer: None,
            product: None,
            serial_number: None,
            vid: None,
            pid: None,
        };
        info.port_type = match p.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                info.manufacturer = usb.manufacturer;
                info.product = usb.product;
                info.serial_number = usb.serial_number;
                info.vid = Some(usb.vid);
                info.pid = Some(usb.pid);
                "USB"
            }
            serialport::SerialPortType::BluetoothPort => "Bluetooth",
            serialport::SerialPortType::PciPort => "PCI",
            serialport::SerialPortType::Unknown => "Unknown",
        }
        .to_string();
        info
    }
}

/// Ports the analyzer could be attached to, sorted by device name
pub fn list_serial_ports() -> Result<Vec<SerialPortInfo>, IoError> {
    let ports = serialport::available_ports()
        .map_err(|e| IoError::protocol("serial", format!("failed to enumerate ports: {}", e)))?;
    Ok(sorted_ports(ports.into_iter().map(SerialPortInfo::from).collect()))
}

fn sorted_ports(mut ports: Vec<SerialPortInfo>) -> Vec<SerialPortInfo> {
    ports.sort_by(|a, b| a.port_name.cmp(&b.port_name));
    ports.dedup_by(|a, b| a.port_name == b.port_name);
    ports
}
