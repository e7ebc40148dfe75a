use relaylink_frame::{
    mask_from_payload, pack_bits, payload_from_mask, unpack_bits, validate_circuit_count, Frame,
    MAX_CIRCUITS, PAYLOAD_LEN,
};
use serde::Serialize;

use crate::error::Result;

/// Snapshot of every circuit on a board.
///
/// Circuit N is bit N-1 of [`CircuitStatus::mask`]. A set bit means the
/// circuit is open (energized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CircuitStatus {
    circuit_count: u8,
    mask: u32,
}

impl CircuitStatus {
    /// Status with every circuit released.
    pub fn all_closed(circuit_count: u8) -> Result<Self> {
        validate_circuit_count(circuit_count)?;
        Ok(Self {
            circuit_count,
            mask: 0,
        })
    }

    /// Read the status carried by a reply payload.
    pub fn from_payload(payload: &[u8; PAYLOAD_LEN], circuit_count: u8) -> Result<Self> {
        let masked = payload_from_mask(mask_from_payload(payload), circuit_count)?;
        Ok(Self {
            circuit_count,
            mask: mask_from_payload(&masked),
        })
    }

    pub fn from_frame(frame: &Frame, circuit_count: u8) -> Result<Self> {
        Self::from_payload(&frame.payload(), circuit_count)
    }

    /// Build from a wire-order sequence (highest circuit first).
    pub fn from_wire_bits(values: &[bool], circuit_count: u8) -> Result<Self> {
        let payload = pack_bits(values, circuit_count)?;
        Self::from_payload(&payload, circuit_count)
    }

    /// Build from a mask; bits above the circuit count are cleared.
    pub fn from_mask(mask: u32, circuit_count: u8) -> Result<Self> {
        let payload = payload_from_mask(mask, circuit_count)?;
        Ok(Self {
            circuit_count,
            mask: mask_from_payload(&payload),
        })
    }

    /// Replace the whole state, clearing bits above the circuit count.
    pub(crate) fn set_mask(&mut self, mask: u32) {
        let active = if self.circuit_count >= MAX_CIRCUITS {
            u32::MAX
        } else {
            (1u32 << self.circuit_count) - 1
        };
        self.mask = mask & active;
    }

    pub fn circuit_count(&self) -> u8 {
        self.circuit_count
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Payload bytes as they travel on the wire.
    pub fn payload(&self) -> [u8; PAYLOAD_LEN] {
        self.mask.to_be_bytes()
    }

    /// State of circuit `circuit` (1-based). Out of range reads as closed.
    pub fn is_open(&self, circuit: u8) -> bool {
        circuit >= 1 && circuit <= self.circuit_count && self.mask & (1 << (circuit - 1)) != 0
    }

    /// `(circuit, open)` pairs in ascending circuit order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, bool)> + '_ {
        (1..=self.circuit_count).map(move |circuit| (circuit, self.is_open(circuit)))
    }

    /// Open circuits in ascending order.
    pub fn open_circuits(&self) -> Vec<u8> {
        self.iter()
            .filter_map(|(circuit, open)| open.then_some(circuit))
            .collect()
    }

    /// Wire-order sequence, highest circuit first.
    pub fn wire_bits(&self) -> Vec<bool> {
        // Counts are validated on construction.
        unpack_bits(&self.payload(), self.circuit_count).unwrap_or_default()
    }

    /// Circuits whose state differs from `previous`, ascending.
    pub fn changed_since(&self, previous: &Self) -> Vec<u8> {
        let diff = self.mask ^ previous.mask;
        (1..=self.circuit_count)
            .filter(|circuit| diff & (1 << (circuit - 1)) != 0)
            .collect()
    }
}

/// Wire-order `0`/`1` string, highest circuit first.
impl std::fmt::Display for CircuitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for open in self.wire_bits() {
            f.write_str(if open { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use relaylink_frame::FrameError;

    use super::*;
    use crate::error::SessionError;

    #[test]
    fn from_payload_masks_inactive_bytes() {
        let status = CircuitStatus::from_payload(&[0xFF, 0xFF, 0x01, 0x04], 16).unwrap();
        assert_eq!(status.mask(), 0x0104);
        assert_eq!(status.open_circuits(), vec![3, 9]);
        assert!(status.is_open(3));
        assert!(!status.is_open(17));
        assert!(!status.is_open(0));
    }

    #[test]
    fn wire_bits_put_highest_circuit_first() {
        let status = CircuitStatus::from_mask(0b1000_0001, 8).unwrap();
        assert_eq!(
            status.wire_bits(),
            vec![true, false, false, false, false, false, false, true]
        );
        assert_eq!(status.to_string(), "10000001");
        assert_eq!(
            CircuitStatus::from_wire_bits(&status.wire_bits(), 8).unwrap(),
            status
        );
    }

    #[test]
    fn iter_is_ascending() {
        let status = CircuitStatus::from_mask(0b10, 8).unwrap();
        let states: Vec<_> = status.iter().collect();
        assert_eq!(states.len(), 8);
        assert_eq!(states[0], (1, false));
        assert_eq!(states[1], (2, true));
    }

    #[test]
    fn changes_between_snapshots() {
        let before = CircuitStatus::from_mask(0b0011, 8).unwrap();
        let after = CircuitStatus::from_mask(0b0110, 8).unwrap();
        assert_eq!(after.changed_since(&before), vec![1, 3]);
        assert!(after.changed_since(&after).is_empty());
    }

    #[test]
    fn rejects_bad_circuit_count() {
        assert!(matches!(
            CircuitStatus::all_closed(20),
            Err(SessionError::Frame(FrameError::InvalidCircuitCount(20)))
        ));
    }

    #[test]
    fn thirty_two_circuits() {
        let status = CircuitStatus::from_payload(&[0x80, 0, 0, 0x01], 32).unwrap();
        assert_eq!(status.open_circuits(), vec![1, 32]);
        assert_eq!(status.payload(), [0x80, 0, 0, 0x01]);
    }
}
