//! Fixed-size frame codec for addressable relay boards.
//!
//! Every message on the wire is exactly eight bytes:
//! - a header byte (0x55 from the controller, 0x22 from the board)
//! - the board address and a function code
//! - a four byte payload (circuit index, circuit bitmask, or zero)
//! - an additive checksum over the first seven bytes
//!
//! [`FrameReader`] slices a raw byte stream into validated frames and
//! [`FrameWriter`] puts whole frames on the wire.

pub mod bits;
pub mod codec;
pub mod error;
pub mod function;
pub mod reader;
pub mod writer;

pub use bits::{
    bit_for_circuit, check_circuit, mask_from_payload, pack_bits, payload_from_mask, unpack_bits,
    validate_circuit_count, GROUP_SIZE, MAX_CIRCUITS,
};
pub use codec::{
    build_frame, build_reply, checksum, decode_frame, index_payload, validate, Frame, FrameConfig,
    FRAME_LEN, PAYLOAD_LEN, REQUEST_HEADER, RESPONSE_HEADER,
};
pub use error::{FrameError, Result};
pub use function::{expects_reply, function_name, no_return_variant};
pub use reader::FrameReader;
pub use writer::FrameWriter;
