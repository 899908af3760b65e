//! Serial port handling
//!
//! Thin wrappers around tokio-serial for opening the sensor link (8N1, no
//! flow control) and around serialport for enumerating candidate ports.

use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use super::ProtocolError;

/// Open the sensor link as an async stream with 8N1 framing
pub fn open_port(name: &str, baud_rate: u32) -> Result<SerialStream, ProtocolError> {
    tokio_serial::new(name, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| ProtocolError::SerialError(e.to_string()))
}

/// List available serial port names, USB serial adapters first.
/// Falls back to an empty list when enumeration is not supported.
pub fn list_ports() -> Vec<String> {
    let mut names: Vec<String> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|info| info.port_name)
        .collect();
    names.sort_by_key(|name| sort_key(name));
    names
}

// USB CDC ports (ttyACM/ttyUSB) are the likely sensor link; list them ahead
// of built-in UARTs and other devices.
fn sort_key(name: &str) -> (u8, String) {
    let base = name.rsplit('/').next().unwrap_or(name);
    let rank = if base.starts_with("ttyACM") {
        0
    } else if base.starts_with("ttyUSB") {
        1
    } else {
        2
    };
    (rank, base.to_string())
}
