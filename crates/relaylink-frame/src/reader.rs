use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use relaylink_transport::{RelayStream, TransportError};
use tracing::{trace, warn};

use crate::codec::{decode_frame, Frame, FrameConfig, FRAME_LEN, RESPONSE_HEADER};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 256;
const READ_CHUNK_SIZE: usize = 256;

/// Reassembles frames from any `Read` stream.
///
/// Bytes are buffered until eight are available, then sliced off the front
/// and validated. Frames with a bad checksum (or a foreign header, when
/// [`FrameConfig::enforce_header`] is set) are logged, counted and skipped;
/// callers only ever see valid frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    dropped: u64,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            dropped: 0,
        }
    }

    /// Read the next valid frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached and
    /// `Err(FrameError::Io(_))` for read failures, including read timeouts.
    /// Buffered bytes survive an error and are used by the next call.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.next_buffered_frame() {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            trace!(bytes = read, buffered = self.buf.len(), "read from link");
            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    fn next_buffered_frame(&mut self) -> Option<Frame> {
        loop {
            let frame = match decode_frame(&mut self.buf) {
                Ok(Some(frame)) => frame,
                Ok(None) => return None,
                Err(err) => {
                    self.record_drop(&err);
                    continue;
                }
            };

            if self.config.enforce_header && frame.header() != RESPONSE_HEADER {
                self.record_drop(&FrameError::InvalidHeader(frame.header()));
                continue;
            }

            return Some(frame);
        }
    }

    fn record_drop(&mut self, err: &FrameError) {
        self.dropped = self.dropped.saturating_add(1);
        warn!(error = %err, dropped = self.dropped, "dropping invalid frame");
    }

    /// Discard buffered bytes up to the next response header byte.
    ///
    /// Used after a lost reply to realign frame boundaries. Returns the
    /// number of bytes discarded.
    pub fn resync(&mut self) -> usize {
        let skip = self
            .buf
            .iter()
            .position(|&byte| byte == RESPONSE_HEADER)
            .unwrap_or(self.buf.len());
        self.buf.advance(skip);
        if skip > 0 {
            warn!(discarded = skip, "resynchronized frame boundary");
        }
        skip
    }

    /// Drop every buffered byte. Returns how many were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.buf.len();
        self.buf.clear();
        if discarded > 0 {
            warn!(discarded, "discarded partial frame");
        }
        discarded
    }

    /// Bytes buffered but not yet forming a whole frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if a partial frame is pending.
    pub fn has_partial_frame(&self) -> bool {
        !self.buf.is_empty() && self.buf.len() < FRAME_LEN
    }

    /// Frames dropped so far for failing validation.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<RelayStream> {
    /// Create a frame reader for `RelayStream` and apply read timeout from config.
    pub fn with_config_relay(mut inner: RelayStream, config: FrameConfig) -> Result<Self> {
        if let Some(timeout) = config.read_timeout {
            inner
                .set_read_timeout(timeout)
                .map_err(transport_to_frame_error)?;
        }
        Ok(Self::with_config(inner, config))
    }
}

fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) => FrameError::Io(io),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
