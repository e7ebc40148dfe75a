//! Byte-stream transport for relay boards.
//!
//! Provides a unified duplex stream over the links a relay board can sit on:
//! - Serial ports (RS-232/RS-485 adapters, USB CDC)
//! - Unix stream pairs (in-process loopback for simulators and tests)
//!
//! This is the lowest layer of relaylink. The frame codec and the link
//! session build on the [`RelayStream`] type provided here.

pub mod error;
pub mod serial;
pub mod stream;

pub use error::{Result, TransportError};
pub use serial::{
    available_ports, open, PortInfo, SerialPortConfig, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT,
};
pub use stream::{is_read_timeout, RelayStream};
