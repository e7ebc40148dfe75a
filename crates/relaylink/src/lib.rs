//! Frame protocol engine for addressable serial relay boards.
//!
//! relaylink drives boards with 8, 16, 24 or 32 relay circuits over a serial
//! link using fixed eight byte frames with an additive checksum.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial ports and in-process loopback streams
//! - [`frame`]: frame codec, checksum, circuit bit packing, stream reassembly
//! - [`session`]: request/response session, typed board commands, simulator
//!
//! # Example
//!
//! ```no_run
//! use relaylink::session::{BoardConfig, Session};
//!
//! let session = Session::connect(BoardConfig::new("/dev/ttyUSB0", 1, 16))?;
//! session.open_one(3)?;
//! println!("{}", session.read_status()?);
//! # Ok::<(), relaylink::session::SessionError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use relaylink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use relaylink_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use relaylink_session::*;
}

pub use relaylink_session::{BoardConfig, CircuitStatus, Session, SessionError};
