//! Link session for addressable relay boards.
//!
//! This is the "just works" layer. Open a board on a serial port, then
//! switch circuits and read their state with typed results. A background
//! thread reassembles reply frames; calls are serialized so each reply is
//! matched to the request that produced it.

pub mod commands;
pub mod config;
pub mod error;
pub mod session;
pub mod simulator;
pub mod status;

mod slot;

pub use config::BoardConfig;
pub use error::{Result, SessionError};
pub use session::{LinkState, Session};
pub use simulator::BoardSimulator;
pub use status::CircuitStatus;
