//! Function codes.
//!
//! A reply carries the same function code as the request it answers.
//! Codes 0x30-0x38 are "no-return" variants: the board applies them but
//! sends nothing back, so they can be pipelined.

/// Read the state of every circuit.
pub const READ_STATUS: u8 = 0x10;
/// Release one circuit.
pub const CLOSE_ONE: u8 = 0x11;
/// Energize one circuit.
pub const OPEN_ONE: u8 = 0x12;
/// Set every circuit from a bitmask.
pub const RUN_BITMASK: u8 = 0x13;
/// Release the circuits selected by a bitmask.
pub const CLOSE_GROUP: u8 = 0x14;
/// Energize the circuits selected by a bitmask.
pub const OPEN_GROUP: u8 = 0x15;
/// Toggle the circuits selected by a bitmask.
pub const FLIP_GROUP: u8 = 0x16;
/// Toggle one circuit.
pub const FLIP_ONE: u8 = 0x20;
/// Momentary (jog) operation.
///
/// Board documentation lists this code for both jog-open and jog-close.
/// No command wraps it until real hardware shows how the two differ.
pub const POINT: u8 = 0x21;

pub const FLIP_ONE_NO_RETURN: u8 = 0x30;
pub const CLOSE_ONE_NO_RETURN: u8 = 0x31;
pub const OPEN_ONE_NO_RETURN: u8 = 0x32;
pub const RUN_BITMASK_NO_RETURN: u8 = 0x33;
pub const CLOSE_GROUP_NO_RETURN: u8 = 0x34;
pub const OPEN_GROUP_NO_RETURN: u8 = 0x35;
pub const FLIP_GROUP_NO_RETURN: u8 = 0x36;
pub const POINT_OPEN_NO_RETURN: u8 = 0x37;
pub const POINT_CLOSE_NO_RETURN: u8 = 0x38;

/// Read the board address.
pub const READ_ADDRESS: u8 = 0x40;
/// Write the board address.
pub const WRITE_ADDRESS: u8 = 0x41;
/// Read an internal variable.
pub const READ_VARIABLE: u8 = 0x70;
/// Write an internal variable.
pub const WRITE_VARIABLE: u8 = 0x71;

/// Returns a human-readable name for a function code.
pub fn function_name(code: u8) -> &'static str {
    match code {
        READ_STATUS => "READ_STATUS",
        CLOSE_ONE => "CLOSE_ONE",
        OPEN_ONE => "OPEN_ONE",
        RUN_BITMASK => "RUN_BITMASK",
        CLOSE_GROUP => "CLOSE_GROUP",
        OPEN_GROUP => "OPEN_GROUP",
        FLIP_GROUP => "FLIP_GROUP",
        FLIP_ONE => "FLIP_ONE",
        POINT => "POINT",
        FLIP_ONE_NO_RETURN => "FLIP_ONE_NO_RETURN",
        CLOSE_ONE_NO_RETURN => "CLOSE_ONE_NO_RETURN",
        OPEN_ONE_NO_RETURN => "OPEN_ONE_NO_RETURN",
        RUN_BITMASK_NO_RETURN => "RUN_BITMASK_NO_RETURN",
        CLOSE_GROUP_NO_RETURN => "CLOSE_GROUP_NO_RETURN",
        OPEN_GROUP_NO_RETURN => "OPEN_GROUP_NO_RETURN",
        FLIP_GROUP_NO_RETURN => "FLIP_GROUP_NO_RETURN",
        POINT_OPEN_NO_RETURN => "POINT_OPEN_NO_RETURN",
        POINT_CLOSE_NO_RETURN => "POINT_CLOSE_NO_RETURN",
        READ_ADDRESS => "READ_ADDRESS",
        WRITE_ADDRESS => "WRITE_ADDRESS",
        READ_VARIABLE => "READ_VARIABLE",
        WRITE_VARIABLE => "WRITE_VARIABLE",
        _ => "UNKNOWN",
    }
}

/// The no-return twin of a reply-bearing command, if it has one.
pub fn no_return_variant(code: u8) -> Option<u8> {
    match code {
        FLIP_ONE => Some(FLIP_ONE_NO_RETURN),
        CLOSE_ONE => Some(CLOSE_ONE_NO_RETURN),
        OPEN_ONE => Some(OPEN_ONE_NO_RETURN),
        RUN_BITMASK => Some(RUN_BITMASK_NO_RETURN),
        CLOSE_GROUP => Some(CLOSE_GROUP_NO_RETURN),
        OPEN_GROUP => Some(OPEN_GROUP_NO_RETURN),
        FLIP_GROUP => Some(FLIP_GROUP_NO_RETURN),
        _ => None,
    }
}

/// Returns true if the board answers this code with a reply frame.
pub fn expects_reply(code: u8) -> bool {
    !(FLIP_ONE_NO_RETURN..=POINT_CLOSE_NO_RETURN).contains(&code)
}
