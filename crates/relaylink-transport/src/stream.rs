use std::io::{self, Read, Write};
use std::time::Duration;

use crate::error::{Result, TransportError};

/// A connected relay link. Implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations.
/// Hardware links wrap a serial port handle. On Unix, an in-process
/// loopback built from a socket pair is also available.
pub struct RelayStream {
    inner: RelayStreamInner,
    name: String,
}

enum RelayStreamInner {
    Serial(Box<dyn serialport::SerialPort>),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for RelayStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            RelayStreamInner::Serial(port) => port.read(buf),
            #[cfg(unix)]
            RelayStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for RelayStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            RelayStreamInner::Serial(port) => port.write(buf),
            #[cfg(unix)]
            RelayStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            RelayStreamInner::Serial(port) => port.flush(),
            #[cfg(unix)]
            RelayStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl RelayStream {
    /// Wrap an open serial port.
    pub(crate) fn from_serial(port: Box<dyn serialport::SerialPort>, name: String) -> Self {
        Self {
            inner: RelayStreamInner::Serial(port),
            name,
        }
    }

    /// Wrap a connected Unix stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: RelayStreamInner::Unix(stream),
            name: "loopback".to_string(),
        }
    }

    /// Create a connected loopback pair.
    ///
    /// Bytes written to one end are read from the other. Used to run a board
    /// simulator in-process.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Port name (or `loopback`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            RelayStreamInner::Serial(_) => "serial",
            #[cfg(unix)]
            RelayStreamInner::Unix(_) => "unix-loopback",
        }
    }

    /// Set the read timeout on the underlying stream.
    ///
    /// A read that sees no bytes within `timeout` fails with `TimedOut` or
    /// `WouldBlock` (see [`is_read_timeout`]).
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        match &mut self.inner {
            RelayStreamInner::Serial(port) => {
                port.set_timeout(timeout)
                    .map_err(|source| TransportError::Configure {
                        port: self.name.clone(),
                        source,
                    })
            }
            #[cfg(unix)]
            RelayStreamInner::Unix(stream) => {
                stream.set_read_timeout(Some(timeout)).map_err(Into::into)
            }
        }
    }

    /// Current read timeout, if any.
    pub fn read_timeout(&self) -> Option<Duration> {
        match &self.inner {
            RelayStreamInner::Serial(port) => Some(port.timeout()),
            #[cfg(unix)]
            RelayStreamInner::Unix(stream) => stream.read_timeout().ok().flatten(),
        }
    }

    /// Try to clone this stream (creates a new handle to the same link).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            RelayStreamInner::Serial(port) => {
                let cloned = port.try_clone().map_err(io::Error::from)?;
                Ok(Self::from_serial(cloned, self.name.clone()))
            }
            #[cfg(unix)]
            RelayStreamInner::Unix(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self {
                    inner: RelayStreamInner::Unix(cloned),
                    name: self.name.clone(),
                })
            }
        }
    }

    /// Shut the link down for every handle sharing it.
    ///
    /// Loopback readers wake immediately with end-of-stream. Serial ports
    /// have no shutdown primitive; their readers return at the next read
    /// timeout.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            RelayStreamInner::Serial(port) => {
                port.clear(serialport::ClearBuffer::All)
                    .map_err(|source| TransportError::Configure {
                        port: self.name.clone(),
                        source,
                    })
            }
            #[cfg(unix)]
            RelayStreamInner::Unix(stream) => match stream.shutdown(std::net::Shutdown::Both) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(err.into()),
            },
        }
    }
}

/// Returns true if a read error only means "no bytes before the timeout".
pub fn is_read_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

impl std::fmt::Debug for RelayStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayStream")
            .field("type", &self.transport_name())
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn pair_roundtrip() {
        let (mut left, mut right) = RelayStream::pair().unwrap();
        left.write_all(&[0x55, 0x01, 0x10]).unwrap();

        let mut buf = [0u8; 3];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0x55, 0x01, 0x10]);
        assert_eq!(right.transport_name(), "unix-loopback");
    }

    #[test]
    fn read_timeout_is_reported_as_timeout() {
        let (_left, mut right) = RelayStream::pair().unwrap();
        right.set_read_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(right.read_timeout(), Some(Duration::from_millis(10)));

        let mut buf = [0u8; 8];
        let err = right.read(&mut buf).unwrap_err();
        assert!(is_read_timeout(&err));
    }

    #[test]
    fn clone_shares_the_link() {
        let (left, mut right) = RelayStream::pair().unwrap();
        let mut writer = left.try_clone().unwrap();
        writer.write_all(b"ok").unwrap();

        let mut buf = [0u8; 2];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ok");
        assert_eq!(writer.name(), "loopback");
    }

    #[test]
    fn shutdown_wakes_blocked_reader() {
        let (left, _right) = RelayStream::pair().unwrap();
        let mut reader = left.try_clone().unwrap();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 8];
            reader.read(&mut buf).unwrap()
        });

        std::thread::sleep(Duration::from_millis(20));
        left.shutdown().unwrap();
        assert_eq!(handle.join().unwrap(), 0);
    }
}
