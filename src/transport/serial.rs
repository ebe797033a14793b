//! Serial port transport

use anyhow::{Context, Result};
use tokio_serial::{SerialPortBuilderExt, SerialPortType, SerialStream};

/// Default baud rate for device consoles
pub const DEFAULT_BAUD: u32 = 115200;

/// A serial port found on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub usb: bool,
    pub description: Option<String>,
}

/// Enumerate serial ports, USB adapters first
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = tokio_serial::available_ports().context("Failed to enumerate serial ports")?;
    let mut ports: Vec<PortInfo> = ports
        .into_iter()
        .map(|p| match p.port_type {
            SerialPortType::UsbPort(usb) => PortInfo {
                name: p.port_name,
                usb: true,
                description: usb.product.or(usb.manufacturer),
            },
            _ => PortInfo {
                name: p.port_name,
                usb: false,
                description: None,
            },
        })
        .collect();
    ports.sort_by_key(|p| !p.usb);
    Ok(ports)
}

/// Pick the port `auto` resolves to: the first USB serial adapter
pub fn auto_port(ports: &[PortInfo]) -> Option<&PortInfo> {
    ports.iter().find(|p| p.usb)
}

/// Open a serial device
pub fn open(path: &str, baud: u32) -> Result<SerialStream> {
    tokio_serial::new(path, baud)
        .open_native_async()
        .with_context(|| format!("at {} baud", baud))
}
