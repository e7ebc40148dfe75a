//! Mapping between payload bytes and per-circuit state.
//!
//! Circuits are grouped eight to a byte. Group 0 (circuits 1-8) lives in
//! frame byte 6, group 1 in frame byte 5, and so on; circuit 1 is bit 0 of
//! its group byte. Boards with fewer than 32 circuits leave the leading
//! payload bytes zero.
//!
//! Sequences handed to [`pack_bits`] and returned by [`unpack_bits`] are in
//! wire order: the first element is the most significant bit of the first
//! active payload byte (the highest circuit), the last element is circuit 1.

use crate::codec::{Frame, PAYLOAD_LEN};
use crate::error::{FrameError, Result};

/// Circuits per payload byte.
pub const GROUP_SIZE: u8 = 8;

/// Largest board supported by the four byte payload.
pub const MAX_CIRCUITS: u8 = 32;

/// Accept only 8, 16, 24 or 32.
pub fn validate_circuit_count(count: u8) -> Result<u8> {
    if count == 0 || count > MAX_CIRCUITS || count % GROUP_SIZE != 0 {
        return Err(FrameError::InvalidCircuitCount(count));
    }
    Ok(count)
}

/// Accept circuit indices in `1..=count`.
pub fn check_circuit(circuit: u8, count: u8) -> Result<()> {
    if circuit < 1 || circuit > count {
        return Err(FrameError::IndexOutOfRange {
            index: circuit,
            count,
        });
    }
    Ok(())
}

fn first_active_byte(count: u8) -> usize {
    PAYLOAD_LEN - usize::from(count / GROUP_SIZE)
}

/// Pack a wire-order sequence of circuit states into a payload.
pub fn pack_bits(values: &[bool], circuit_count: u8) -> Result<[u8; PAYLOAD_LEN]> {
    validate_circuit_count(circuit_count)?;
    if values.len() != usize::from(circuit_count) {
        return Err(FrameError::LengthMismatch {
            expected: usize::from(circuit_count),
            actual: values.len(),
        });
    }

    let mut payload = [0u8; PAYLOAD_LEN];
    let first = first_active_byte(circuit_count);
    for (slot, group) in payload[first..]
        .iter_mut()
        .zip(values.chunks(usize::from(GROUP_SIZE)))
    {
        *slot = group
            .iter()
            .fold(0u8, |byte, &on| (byte << 1) | u8::from(on));
    }
    Ok(payload)
}

/// Unpack the active groups of a payload into a wire-order sequence.
pub fn unpack_bits(payload: &[u8; PAYLOAD_LEN], circuit_count: u8) -> Result<Vec<bool>> {
    validate_circuit_count(circuit_count)?;
    let first = first_active_byte(circuit_count);
    Ok(payload[first..]
        .iter()
        .flat_map(|&byte| (0..GROUP_SIZE).rev().map(move |bit| byte & (1 << bit) != 0))
        .collect())
}

/// State of one circuit (1-based) as carried by a frame's payload.
pub fn bit_for_circuit(frame: &Frame, circuit: u8, circuit_count: u8) -> Result<bool> {
    validate_circuit_count(circuit_count)?;
    check_circuit(circuit, circuit_count)?;

    let zero_based = circuit - 1;
    let group = usize::from(zero_based / GROUP_SIZE);
    let byte = frame.payload()[PAYLOAD_LEN - 1 - group];
    Ok(byte & (1 << (zero_based % GROUP_SIZE)) != 0)
}

/// Payload as a mask with circuit N at bit N-1.
pub fn mask_from_payload(payload: &[u8; PAYLOAD_LEN]) -> u32 {
    u32::from_be_bytes(*payload)
}

/// Inverse of [`mask_from_payload`], clearing bits above `circuit_count`.
pub fn payload_from_mask(mask: u32, circuit_count: u8) -> Result<[u8; PAYLOAD_LEN]> {
    validate_circuit_count(circuit_count)?;
    let active = if circuit_count == MAX_CIRCUITS {
        u32::MAX
    } else {
        (1u32 << circuit_count) - 1
    };
    Ok((mask & active).to_be_bytes())
}
