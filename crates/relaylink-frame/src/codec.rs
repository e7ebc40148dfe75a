use std::time::Duration;

use bytes::{Buf, BytesMut};

use crate::error::{FrameError, Result};

/// Every frame is exactly this long.
pub const FRAME_LEN: usize = 8;

/// Operation-specific bytes 3..=6.
pub const PAYLOAD_LEN: usize = 4;

/// Header byte of controller-originated frames.
pub const REQUEST_HEADER: u8 = 0x55;

/// Header byte of board-originated frames.
pub const RESPONSE_HEADER: u8 = 0x22;

const ADDRESS_INDEX: usize = 1;
const FUNCTION_INDEX: usize = 2;
const PAYLOAD_START: usize = 3;
const CHECKSUM_INDEX: usize = FRAME_LEN - 1;

/// One protocol frame, request or reply.
///
/// Wire format:
/// ```text
/// ┌────────┬─────────┬──────────┬───────────────────┬──────────┐
/// │ Header │ Address │ Function │ Payload (4B)      │ Checksum │
/// │ 55/22  │ 1..255  │          │ bytes 3..=6       │ Σ[0..7]  │
/// └────────┴─────────┴──────────┴───────────────────┴──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    fn assemble(header: u8, address: u8, function: u8, payload: [u8; PAYLOAD_LEN]) -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[0] = header;
        bytes[ADDRESS_INDEX] = address;
        bytes[FUNCTION_INDEX] = function;
        bytes[PAYLOAD_START..CHECKSUM_INDEX].copy_from_slice(&payload);
        bytes[CHECKSUM_INDEX] = checksum(&bytes);
        Self { bytes }
    }

    /// Wrap raw bytes without validating them.
    pub fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        Self { bytes }
    }

    pub fn header(&self) -> u8 {
        self.bytes[0]
    }

    pub fn address(&self) -> u8 {
        self.bytes[ADDRESS_INDEX]
    }

    pub fn function(&self) -> u8 {
        self.bytes[FUNCTION_INDEX]
    }

    /// Bytes 3..=6.
    pub fn payload(&self) -> [u8; PAYLOAD_LEN] {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&self.bytes[PAYLOAD_START..CHECKSUM_INDEX]);
        payload
    }

    /// The checksum byte carried by the frame.
    pub fn checksum(&self) -> u8 {
        self.bytes[CHECKSUM_INDEX]
    }

    /// Returns true if the carried checksum matches the contents.
    pub fn has_valid_checksum(&self) -> bool {
        checksum(&self.bytes) == self.checksum()
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    pub fn into_bytes(self) -> [u8; FRAME_LEN] {
        self.bytes
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Sum of the first seven bytes, truncated to eight bits.
///
/// Shorter inputs are summed in full.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .take(CHECKSUM_INDEX)
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

/// Build a controller request frame.
pub fn build_frame(address: u8, function: u8, payload: [u8; PAYLOAD_LEN]) -> Result<Frame> {
    if address == 0 {
        return Err(FrameError::InvalidAddress);
    }
    Ok(Frame::assemble(REQUEST_HEADER, address, function, payload))
}

/// Build a board reply frame.
pub fn build_reply(address: u8, function: u8, payload: [u8; PAYLOAD_LEN]) -> Result<Frame> {
    if address == 0 {
        return Err(FrameError::InvalidAddress);
    }
    Ok(Frame::assemble(RESPONSE_HEADER, address, function, payload))
}

/// Payload addressing a single circuit.
pub fn index_payload(circuit: u8) -> [u8; PAYLOAD_LEN] {
    [0, 0, 0, circuit]
}

/// Accept `bytes` as a frame iff its checksum byte is correct.
///
/// The header byte is not inspected.
pub fn validate(bytes: [u8; FRAME_LEN]) -> Result<Frame> {
    let frame = Frame::from_bytes(bytes);
    let expected = checksum(&bytes);
    if expected != frame.checksum() {
        return Err(FrameError::ChecksumMismatch {
            expected,
            actual: frame.checksum(),
        });
    }
    Ok(frame)
}

/// Take the next frame off the front of a buffer.
///
/// Returns `Ok(None)` if fewer than eight bytes are buffered. Otherwise
/// exactly eight bytes are consumed, even when validation fails, so the next
/// call starts at the following frame boundary.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Frame>> {
    if src.len() < FRAME_LEN {
        return Ok(None);
    }

    let mut bytes = [0u8; FRAME_LEN];
    src.copy_to_slice(&mut bytes);
    validate(bytes).map(Some)
}

/// Configuration for frame readers.
#[derive(Debug, Clone, Default)]
pub struct FrameConfig {
    /// Read timeout applied to the stream. `None` keeps the stream's setting.
    pub read_timeout: Option<Duration>,
    /// Drop checksum-valid frames whose header is not [`RESPONSE_HEADER`].
    pub enforce_header: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_stamps_checksum() {
        let frame = build_frame(0x01, 0x12, [0, 0, 0, 3]).unwrap();
        assert_eq!(
            frame.as_bytes(),
            &[0x55, 0x01, 0x12, 0x00, 0x00, 0x00, 0x03, 0x6B]
        );
        assert_eq!(checksum(frame.as_bytes()), frame.checksum());
        assert!(frame.has_valid_checksum());
    }

    #[test]
    fn checksum_wraps() {
        let frame = build_frame(0xFF, 0xFF, [0xFF; PAYLOAD_LEN]).unwrap();
        // 0x55 + 6 * 0xFF = 0x64F
        assert_eq!(frame.checksum(), 0x4F);
        assert!(validate(frame.into_bytes()).is_ok());
    }

    #[test]
    fn checksum_ignores_trailing_byte() {
        assert_eq!(checksum(&[1, 2, 3, 4, 5, 6, 7, 200]), 28);
        assert_eq!(checksum(&[1, 2]), 3);
    }

    #[test]
    fn address_zero_rejected() {
        assert!(matches!(
            build_frame(0, 0x10, [0; PAYLOAD_LEN]),
            Err(FrameError::InvalidAddress)
        ));
        assert!(matches!(
            build_reply(0, 0x10, [0; PAYLOAD_LEN]),
            Err(FrameError::InvalidAddress)
        ));
    }

    #[test]
    fn reply_uses_response_header() {
        let reply = build_reply(0x01, 0x12, [0, 0, 0, 0x04]).unwrap();
        assert_eq!(reply.header(), RESPONSE_HEADER);
        assert_eq!(reply.address(), 0x01);
        assert_eq!(reply.function(), 0x12);
        assert_eq!(reply.payload(), [0, 0, 0, 0x04]);
        assert_eq!(reply.checksum(), 0x39);
    }

    #[test]
    fn validate_accepts_only_matching_checksum() {
        let good = build_frame(0x07, 0x10, [1, 2, 3, 4]).unwrap().into_bytes();
        assert!(validate(good).is_ok());

        for delta in 1..=u8::MAX {
            let mut bad = good;
            bad[7] = bad[7].wrapping_add(delta);
            assert!(matches!(
                validate(bad),
                Err(FrameError::ChecksumMismatch { .. })
            ));
        }
    }

    #[test]
    fn validate_does_not_check_header() {
        let mut bytes = [0x00, 0x01, 0x10, 0, 0, 0, 0, 0];
        bytes[7] = checksum(&bytes);
        assert!(validate(bytes).is_ok());
    }

    #[test]
    fn decode_incomplete_buffer() {
        let mut buf = BytesMut::from(&[0x22, 0x01, 0x10][..]);
        assert!(decode_frame(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn decode_consumes_corrupt_frame() {
        let good = build_reply(1, 0x10, [0, 0, 0, 1]).unwrap();
        let mut corrupt = good.into_bytes();
        corrupt[6] ^= 0x80;

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&corrupt);
        buf.extend_from_slice(good.as_bytes());

        assert!(matches!(
            decode_frame(&mut buf),
            Err(FrameError::ChecksumMismatch { .. })
        ));
        assert_eq!(decode_frame(&mut buf).unwrap(), Some(good));
        assert!(buf.is_empty());
    }

    #[test]
    fn index_payload_puts_circuit_last() {
        assert_eq!(index_payload(9), [0, 0, 0, 9]);
    }
}
