use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use relaylink_frame::{
    build_reply, expects_reply, function, function_name, mask_from_payload, Frame, FrameConfig,
    FrameError, FrameReader, FrameWriter, REQUEST_HEADER,
};
use relaylink_transport::{is_read_timeout, RelayStream};
use tracing::{debug, info};

use crate::error::Result;
use crate::status::CircuitStatus;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Device-side model of a relay board.
///
/// Answers reply-bearing commands with a 0x22 frame carrying the resulting
/// circuit state and applies no-return commands silently. Frames for other
/// addresses, board-originated frames and unsupported function codes are
/// ignored.
#[derive(Debug, Clone)]
pub struct BoardSimulator {
    address: u8,
    state: CircuitStatus,
    reply_delay: Duration,
    handled: u64,
}

impl BoardSimulator {
    pub fn new(address: u8, circuit_count: u8) -> Result<Self> {
        if address == 0 {
            return Err(FrameError::InvalidAddress.into());
        }
        Ok(Self {
            address,
            state: CircuitStatus::all_closed(circuit_count)?,
            reply_delay: Duration::ZERO,
            handled: 0,
        })
    }

    /// Hold every reply back by `delay`, like a slow board.
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn state(&self) -> CircuitStatus {
        self.state
    }

    /// Requests accepted so far, replied to or not.
    pub fn requests_handled(&self) -> u64 {
        self.handled
    }

    /// Apply one request and build the reply, if the command has one.
    pub fn handle(&mut self, request: &Frame) -> Option<Frame> {
        if request.header() != REQUEST_HEADER || request.address() != self.address {
            return None;
        }

        let code = request.function();
        let payload = request.payload();
        let current = self.state.mask();
        let bits = mask_from_payload(&payload);
        let single = self.circuit_bit(payload[3]);

        let next = match code {
            function::READ_STATUS => current,
            function::OPEN_ONE | function::OPEN_ONE_NO_RETURN => current | single,
            function::CLOSE_ONE | function::CLOSE_ONE_NO_RETURN => current & !single,
            function::FLIP_ONE | function::FLIP_ONE_NO_RETURN => current ^ single,
            function::RUN_BITMASK | function::RUN_BITMASK_NO_RETURN => bits,
            function::OPEN_GROUP | function::OPEN_GROUP_NO_RETURN => current | bits,
            function::CLOSE_GROUP | function::CLOSE_GROUP_NO_RETURN => current & !bits,
            function::FLIP_GROUP | function::FLIP_GROUP_NO_RETURN => current ^ bits,
            other => {
                debug!(
                    code = other,
                    function = function_name(other),
                    "simulator ignoring unsupported function"
                );
                return None;
            }
        };
        self.state.set_mask(next);
        self.handled += 1;

        if !expects_reply(code) {
            return None;
        }
        build_reply(self.address, code, self.state.payload()).ok()
    }

    /// Mask bit of `circuit`, or zero when it is not on this board.
    fn circuit_bit(&self, circuit: u8) -> u32 {
        if (1..=self.state.circuit_count()).contains(&circuit) {
            1 << (circuit - 1)
        } else {
            0
        }
    }

    /// Serve requests on `stream` until the other end closes it.
    pub fn serve(&mut self, stream: RelayStream) -> Result<()> {
        self.serve_while(stream, &AtomicBool::new(true))
    }

    /// Serve requests until the stream closes or `running` turns false.
    pub fn serve_while(&mut self, stream: RelayStream, running: &AtomicBool) -> Result<()> {
        let config = FrameConfig {
            read_timeout: Some(POLL_INTERVAL),
            enforce_header: false,
        };
        let mut reader = FrameReader::with_config_relay(stream.try_clone()?, config)?;
        let mut writer = FrameWriter::new(stream);
        info!(
            address = self.address,
            circuits = self.state.circuit_count(),
            port = reader.get_ref().name(),
            "board simulator serving"
        );

        while running.load(Ordering::Acquire) {
            let request = match reader.read_frame() {
                Ok(request) => request,
                Err(FrameError::Io(err)) if is_read_timeout(&err) => continue,
                Err(FrameError::ConnectionClosed) => break,
                Err(err) => return Err(err.into()),
            };

            if let Some(reply) = self.handle(&request) {
                if !self.reply_delay.is_zero() {
                    thread::sleep(self.reply_delay);
                }
                match writer.write_frame(&reply) {
                    Ok(()) => {}
                    Err(FrameError::ConnectionClosed) => break,
                    Err(err) => return Err(err.into()),
                }
            }
        }
        info!(handled = self.handled, "board simulator stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use relaylink_frame::{build_frame, index_payload, PAYLOAD_LEN};

    use super::*;

    fn request(code: u8, payload: [u8; PAYLOAD_LEN]) -> Frame {
        build_frame(1, code, payload).unwrap()
    }

    #[test]
    fn open_one_reports_new_state() {
        let mut board = BoardSimulator::new(1, 8).unwrap();
        let reply = board
            .handle(&request(function::OPEN_ONE, index_payload(3)))
            .expect("open-one should reply");

        assert_eq!(
            reply.as_bytes(),
            &[0x22, 0x01, 0x12, 0x00, 0x00, 0x00, 0x04, 0x39]
        );
        assert!(board.state().is_open(3));
    }

    #[test]
    fn no_return_commands_apply_silently() {
        let mut board = BoardSimulator::new(1, 16).unwrap();
        assert!(board
            .handle(&request(function::OPEN_ONE_NO_RETURN, index_payload(12)))
            .is_none());
        assert!(board
            .handle(&request(function::FLIP_GROUP_NO_RETURN, [0, 0, 0, 0b11]))
            .is_none());
        assert_eq!(board.state().open_circuits(), vec![1, 2, 12]);
        assert_eq!(board.requests_handled(), 2);
    }

    #[test]
    fn group_and_bitmask_commands() {
        let mut board = BoardSimulator::new(1, 8).unwrap();
        board.handle(&request(function::RUN_BITMASK, [0, 0, 0, 0b1010]));
        board.handle(&request(function::OPEN_GROUP, [0, 0, 0, 0b0001]));
        board.handle(&request(function::CLOSE_GROUP, [0, 0, 0, 0b1000]));
        assert_eq!(board.state().mask(), 0b0011);

        let reply = board
            .handle(&request(function::READ_STATUS, [0; PAYLOAD_LEN]))
            .unwrap();
        assert_eq!(reply.payload(), [0, 0, 0, 0b0011]);
    }

    #[test]
    fn bits_beyond_the_board_are_cleared() {
        let mut board = BoardSimulator::new(1, 8).unwrap();
        let reply = board
            .handle(&request(function::RUN_BITMASK, [0xFF; PAYLOAD_LEN]))
            .unwrap();
        assert_eq!(reply.payload(), [0, 0, 0, 0xFF]);
    }

    #[test]
    fn ignores_foreign_frames() {
        let mut board = BoardSimulator::new(2, 8).unwrap();
        assert!(board
            .handle(&request(function::OPEN_ONE, index_payload(1)))
            .is_none());

        let reply = build_reply(2, function::OPEN_ONE, index_payload(1)).unwrap();
        assert!(board.handle(&reply).is_none());

        let point = build_frame(2, function::POINT, index_payload(1)).unwrap();
        assert!(board.handle(&point).is_none());
        assert_eq!(board.requests_handled(), 0);
    }

    #[test]
    fn rejects_invalid_boards() {
        assert!(BoardSimulator::new(0, 8).is_err());
        assert!(BoardSimulator::new(1, 9).is_err());
    }
}
