use std::io::{ErrorKind, Write};

use tracing::debug;

use crate::codec::Frame;
use crate::error::{FrameError, Result};
use crate::function::function_name;

/// Writes whole frames to any `Write` stream.
///
/// The writer keeps no buffer of its own: each frame is an eight byte value
/// owned by the caller for the duration of the write.
pub struct FrameWriter<T> {
    inner: T,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Write a complete frame and flush (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.as_bytes();
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        debug!(
            address = frame.address(),
            function = function_name(frame.function()),
            bytes = ?bytes,
            "wrote frame"
        );
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::codec::build_frame;

    #[test]
    fn write_single_frame() {
        let frame = build_frame(1, 0x12, [0, 0, 0, 3]).unwrap();
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_frame(&frame).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, vec![0x55, 0x01, 0x12, 0x00, 0x00, 0x00, 0x03, 0x6B]);
    }

    #[test]
    fn write_multiple_frames_back_to_back() {
        let first = build_frame(1, 0x32, [0, 0, 0, 1]).unwrap();
        let second = build_frame(1, 0x32, [0, 0, 0, 2]).unwrap();
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_frame(&first).unwrap();
        writer.write_frame(&second).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(&wire[..8], first.as_bytes());
        assert_eq!(&wire[8..], second.as_bytes());
    }

    #[test]
    fn short_writes_are_completed() {
        let frame = build_frame(3, 0x10, [0; 4]).unwrap();
        let mut writer = FrameWriter::new(TrickleWriter::default());
        writer.write_frame(&frame).unwrap();
        assert_eq!(writer.get_ref().bytes, frame.as_bytes().to_vec());
    }

    #[test]
    fn zero_write_reports_closed() {
        let frame = build_frame(3, 0x10, [0; 4]).unwrap();
        let mut writer = FrameWriter::new(ClosedWriter);
        assert!(matches!(
            writer.write_frame(&frame),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        let frame = build_frame(1, 0x10, [0; 4]).unwrap();
        writer.write_frame(&frame).unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[derive(Default)]
    struct TrickleWriter {
        bytes: Vec<u8>,
    }

    impl Write for TrickleWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = buf.len().min(3);
            self.bytes.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ClosedWriter;

    impl Write for ClosedWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }
}
