use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::RelayStream;

/// Default baud rate of the relay boards.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read timeout applied to opened ports.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// How to open a serial port.
///
/// Boards speak 8 data bits, no parity, one stop bit, no flow control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortConfig {
    /// OS port name, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port_name: String,
    /// Line speed.
    pub baud_rate: u32,
    /// Upper bound on a single blocking read.
    pub read_timeout: Duration,
}

impl SerialPortConfig {
    /// Config for `port_name` with default baud rate and read timeout.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Open a serial port and wrap it as a [`RelayStream`].
pub fn open(config: &SerialPortConfig) -> Result<RelayStream> {
    let port = serialport::new(&config.port_name, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(config.read_timeout)
        .open()
        .map_err(|source| TransportError::Open {
            port: config.port_name.clone(),
            source,
        })?;

    info!(
        port = %config.port_name,
        baud = config.baud_rate,
        read_timeout = ?config.read_timeout,
        "opened serial port"
    );
    Ok(RelayStream::from_serial(port, config.port_name.clone()))
}

/// A serial port visible to the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Name to pass to [`SerialPortConfig::new`].
    pub name: String,
    /// Bus kind: `usb`, `pci`, `bluetooth` or `unknown`.
    pub kind: &'static str,
    /// Product or manufacturer string when the OS reports one.
    pub description: Option<String>,
}

/// List serial ports present on this machine.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    debug!(count = ports.len(), "enumerated serial ports");

    Ok(ports
        .into_iter()
        .map(|port| {
            let (kind, description) = match port.port_type {
                SerialPortType::UsbPort(usb) => ("usb", usb.product.or(usb.manufacturer)),
                SerialPortType::PciPort => ("pci", None),
                SerialPortType::BluetoothPort => ("bluetooth", None),
                SerialPortType::Unknown => ("unknown", None),
            };
            PortInfo {
                name: port.port_name,
                kind,
                description,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = SerialPortConfig::new("/dev/ttyUSB0");
        assert_eq!(config.port_name, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.read_timeout, Duration::from_millis(200));
    }

    #[test]
    fn open_missing_port_fails() {
        let config = SerialPortConfig::new("/dev/relaylink-does-not-exist");
        let err = open(&config).unwrap_err();
        match err {
            TransportError::Open { port, .. } => {
                assert_eq!(port, "/dev/relaylink-does-not-exist");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
