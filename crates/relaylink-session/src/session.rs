use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use relaylink_frame::{
    build_frame, function_name, Frame, FrameError, FrameReader, FrameWriter, PAYLOAD_LEN,
};
use relaylink_transport::{is_read_timeout, RelayStream, TransportError};
use tracing::{debug, info, trace, warn};

use crate::config::BoardConfig;
use crate::error::{Result, SessionError};
use crate::slot::{lock, ReplySlot};

const REASSEMBLY_THREAD_NAME: &str = "relaylink-reassembly";
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(2);
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);
const SETTLE_POLL: Duration = Duration::from_millis(5);
/// Empty read timeouts that must pass before the line counts as quiet.
const SETTLE_QUIET_READS: u64 = 2;

/// Connection state of a session's link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

impl LinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State shared between callers and the reassembly thread.
struct Shared {
    state: AtomicU8,
    shutdown: AtomicBool,
    resync: AtomicBool,
    /// Set when a request was abandoned; its reply may still be on the way.
    drain: AtomicBool,
    /// Read timeouts that ended with nothing buffered.
    quiet_reads: AtomicU64,
    slot: ReplySlot,
    dropped: AtomicU64,
    stray: AtomicU64,
}

impl Shared {
    fn state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: LinkState) -> LinkState {
        LinkState::from_u8(self.state.swap(state.as_u8(), Ordering::AcqRel))
    }

    fn dispatch(&self, frame: Frame) {
        if self.slot.deliver(frame) {
            trace!(function = frame.function(), "reply delivered");
            return;
        }
        let stray = self.stray.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            function = frame.function(),
            stray, "discarding frame with no pending request"
        );
    }

    fn mark_lost(&self, err: &FrameError) {
        if self.set_state(LinkState::Disconnected) == LinkState::Connected {
            warn!(error = %err, "relay link lost");
        }
        self.slot.disarm();
    }

    fn mark_recovered(&self) {
        if self.state() == LinkState::Disconnected && !self.shutdown.load(Ordering::Acquire) {
            self.set_state(LinkState::Connected);
            info!("relay link recovered");
        }
    }
}

/// A request/response session with one relay board.
///
/// Owns the link. A background thread reassembles inbound frames and hands
/// each valid one to the caller currently waiting for a reply. At most one
/// request is in flight: concurrent callers queue on an internal gate, so a
/// reply can only belong to the request that is waiting for it.
///
/// The session is `Send + Sync`; share it behind an `Arc` to issue commands
/// from several threads.
pub struct Session {
    config: BoardConfig,
    transport: &'static str,
    shared: Arc<Shared>,
    writer: Mutex<FrameWriter<RelayStream>>,
    gate: Mutex<()>,
    reassembly: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Open the configured serial port and start a session on it.
    pub fn connect(config: BoardConfig) -> Result<Self> {
        config.validate()?;
        let stream = relaylink_transport::open(&config.serial_config())?;
        Self::from_stream(config, stream)
    }

    /// Start a session over an already open link.
    ///
    /// The config's port name is informational here; its address, circuit
    /// count and timings apply.
    pub fn from_stream(config: BoardConfig, stream: RelayStream) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            state: AtomicU8::new(LinkState::Connecting.as_u8()),
            shutdown: AtomicBool::new(false),
            resync: AtomicBool::new(false),
            drain: AtomicBool::new(false),
            quiet_reads: AtomicU64::new(0),
            slot: ReplySlot::default(),
            dropped: AtomicU64::new(0),
            stray: AtomicU64::new(0),
        });

        let transport = stream.transport_name();
        let reader = FrameReader::with_config_relay(stream.try_clone()?, config.frame_config())?;
        let writer = FrameWriter::new(stream);

        // Connected before the reader starts so an early link failure is not
        // overwritten.
        shared.set_state(LinkState::Connected);
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(REASSEMBLY_THREAD_NAME.to_string())
            .spawn(move || reassemble(reader, thread_shared))
            .map_err(TransportError::Io)?;

        info!(
            port = %config.port,
            transport,
            address = config.address,
            circuits = config.circuit_count,
            "relay session connected"
        );

        Ok(Self {
            config,
            transport,
            shared,
            writer: Mutex::new(writer),
            gate: Mutex::new(()),
            reassembly: Mutex::new(Some(handle)),
        })
    }

    /// Send one request to this session's board and wait for its reply.
    ///
    /// The reply must answer the same function code. A reply that misses
    /// the deadline is abandoned; the next request is held back until the
    /// line goes quiet, so a late reply is discarded instead of answering it.
    pub fn send_command(&self, function: u8, payload: [u8; PAYLOAD_LEN]) -> Result<Frame> {
        let request = build_frame(self.config.address, function, payload)?;
        let _gate = lock(&self.gate);
        self.ensure_connected()?;
        self.settle()?;

        let reply_rx = self.arm_reply()?;
        if let Err(err) = self.write(&request) {
            self.shared.slot.disarm();
            return Err(err);
        }
        debug!(
            function = function_name(function),
            code = function,
            "request sent, awaiting reply"
        );

        let reply = match reply_rx.recv_timeout(self.config.reply_timeout) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => {
                self.shared.slot.disarm();
                self.shared.resync.store(true, Ordering::Release);
                self.shared.drain.store(true, Ordering::Release);
                warn!(
                    function = function_name(function),
                    timeout_ms = millis_u64(self.config.reply_timeout),
                    "no reply from board"
                );
                return Err(SessionError::Timeout(self.config.reply_timeout));
            }
            Err(RecvTimeoutError::Disconnected) => return Err(SessionError::NotConnected),
        };

        if reply.function() != function {
            return Err(SessionError::ResponseMismatch {
                expected: function,
                actual: reply.function(),
            });
        }
        Ok(reply)
    }

    /// Send a request that the board does not answer.
    ///
    /// Still waits for any in-flight request to finish first.
    pub fn send_no_return(&self, function: u8, payload: [u8; PAYLOAD_LEN]) -> Result<()> {
        let request = build_frame(self.config.address, function, payload)?;
        let _gate = lock(&self.gate);
        self.ensure_connected()?;
        self.settle()?;
        self.write(&request)
    }

    /// Arm the reply slot for the next request.
    ///
    /// The link is checked again after arming: a loss that landed between
    /// the caller's check and the arm has already emptied the slot.
    fn arm_reply(&self) -> Result<Receiver<Frame>> {
        let reply_rx = self.shared.slot.arm();
        if let Err(err) = self.ensure_connected() {
            self.shared.slot.disarm();
            return Err(err);
        }
        Ok(reply_rx)
    }

    /// After an abandoned request, wait until the reassembler has seen the
    /// line stay quiet. Frames that arrive meanwhile have no waiter and are
    /// counted as stray.
    fn settle(&self) -> Result<()> {
        if !self.shared.drain.load(Ordering::Acquire) {
            return Ok(());
        }

        let start = self.shared.quiet_reads.load(Ordering::Acquire);
        let deadline = Instant::now() + self.config.reply_timeout + self.config.read_timeout * 3;
        loop {
            self.ensure_connected()?;
            if self.shared.quiet_reads.load(Ordering::Acquire) >= start + SETTLE_QUIET_READS {
                self.shared.drain.store(false, Ordering::Release);
                debug!(stray = self.stray_frames(), "line settled after abandoned request");
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!("line still busy after abandoned request");
                return Err(SessionError::Timeout(self.config.reply_timeout));
            }
            thread::sleep(SETTLE_POLL);
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.shared.shutdown.load(Ordering::Acquire)
            || self.shared.state() != LinkState::Connected
        {
            return Err(SessionError::NotConnected);
        }
        Ok(())
    }

    fn write(&self, frame: &Frame) -> Result<()> {
        lock(&self.writer)
            .write_frame(frame)
            .map_err(|err| match err {
                FrameError::Io(io) => SessionError::Transport(TransportError::Io(io)),
                FrameError::ConnectionClosed => SessionError::Transport(TransportError::Shutdown),
                other => SessionError::Frame(other),
            })
    }

    /// Stop the reassembly thread and release the link.
    ///
    /// Idempotent. A caller blocked waiting for a reply is woken with
    /// [`SessionError::NotConnected`].
    pub fn close(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.set_state(LinkState::Disconnected);
        self.shared.slot.disarm();

        if let Err(err) = lock(&self.writer).get_ref().shutdown() {
            debug!(error = %err, "link shutdown failed");
        }
        if let Some(handle) = lock(&self.reassembly).take() {
            if handle.join().is_err() {
                warn!("reassembly thread panicked");
            }
        }
        info!(port = %self.config.port, "relay session closed");
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn address(&self) -> u8 {
        self.config.address
    }

    pub fn circuit_count(&self) -> u8 {
        self.config.circuit_count
    }

    /// Transport the session runs on (`serial` or `unix-loopback`).
    pub fn transport_name(&self) -> &'static str {
        self.transport
    }

    /// Inbound frames dropped for failing validation.
    pub fn dropped_frames(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Valid inbound frames discarded because no request was waiting.
    pub fn stray_frames(&self) -> u64 {
        self.shared.stray.load(Ordering::Relaxed)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("port", &self.config.port)
            .field("address", &self.config.address)
            .field("circuits", &self.config.circuit_count)
            .field("state", &self.state())
            .finish()
    }
}

fn reassemble(mut reader: FrameReader<RelayStream>, shared: Arc<Shared>) {
    let mut backoff = INITIAL_BACKOFF;

    while !shared.shutdown.load(Ordering::Acquire) {
        if shared.resync.swap(false, Ordering::AcqRel) {
            reader.resync();
        }

        let result = reader.read_frame();
        shared
            .dropped
            .store(reader.dropped_frames(), Ordering::Relaxed);

        match result {
            Ok(frame) => {
                backoff = INITIAL_BACKOFF;
                shared.mark_recovered();
                shared.dispatch(frame);
            }
            Err(FrameError::Io(err)) if is_read_timeout(&err) => {
                backoff = INITIAL_BACKOFF;
                // A fragment left over a quiet read while draining belongs to
                // no request.
                if shared.drain.load(Ordering::Acquire) {
                    reader.clear();
                }
                if reader.buffered() == 0 {
                    shared.quiet_reads.fetch_add(1, Ordering::AcqRel);
                }
                shared.mark_recovered();
            }
            Err(err) => {
                if shared.shutdown.load(Ordering::Acquire) {
                    break;
                }
                shared.mark_lost(&err);
                pause(&shared, backoff);
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
    debug!("reassembly thread exiting");
}

fn millis_u64(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn pause(shared: &Shared, total: Duration) {
    let mut remaining = total;
    while !remaining.is_zero() && !shared.shutdown.load(Ordering::Acquire) {
        let step = remaining.min(SHUTDOWN_POLL);
        thread::sleep(step);
        remaining -= step;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};

    use relaylink_frame::{build_reply, function, FRAME_LEN};

    use super::*;

    fn config() -> BoardConfig {
        BoardConfig {
            read_timeout: Duration::from_millis(20),
            reply_timeout: Duration::from_millis(300),
            ..BoardConfig::new("loopback", 1, 8)
        }
    }

    fn read_request(device: &mut RelayStream) -> [u8; FRAME_LEN] {
        let mut buf = [0u8; FRAME_LEN];
        device
            .read_exact(&mut buf)
            .expect("device should receive a request");
        buf
    }

    #[test]
    fn link_state_roundtrip() {
        for state in [
            LinkState::Disconnected,
            LinkState::Connecting,
            LinkState::Connected,
        ] {
            assert_eq!(LinkState::from_u8(state.as_u8()), state);
        }
        assert_eq!(LinkState::Connected.to_string(), "connected");
    }

    #[test]
    fn command_gets_matching_reply() {
        let (host, mut device) = RelayStream::pair().expect("pair should open");
        let session = Session::from_stream(config(), host).expect("session should start");
        assert!(session.is_connected());
        assert_eq!(session.transport_name(), "unix-loopback");

        let board = thread::spawn(move || {
            let request = read_request(&mut device);
            assert_eq!(request[2], function::READ_STATUS);
            let reply = build_reply(1, function::READ_STATUS, [0, 0, 0, 0x05]).unwrap();
            device.write_all(reply.as_bytes()).unwrap();
            device
        });

        let reply = session
            .send_command(function::READ_STATUS, [0; PAYLOAD_LEN])
            .expect("command should succeed");
        assert_eq!(reply.payload(), [0, 0, 0, 0x05]);
        let _device = board.join().unwrap();
    }

    #[test]
    fn mismatched_function_is_reported() {
        let (host, mut device) = RelayStream::pair().expect("pair should open");
        let session = Session::from_stream(config(), host).expect("session should start");

        let board = thread::spawn(move || {
            read_request(&mut device);
            let reply = build_reply(1, function::CLOSE_ONE, [0; PAYLOAD_LEN]).unwrap();
            device.write_all(reply.as_bytes()).unwrap();
            device
        });

        let err = session
            .send_command(function::OPEN_ONE, [0, 0, 0, 1])
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::ResponseMismatch {
                expected: 0x12,
                actual: 0x11
            }
        ));
        let _device = board.join().unwrap();
    }

    #[test]
    fn close_is_idempotent_and_rejects_commands() {
        let (host, _device) = RelayStream::pair().expect("pair should open");
        let session = Session::from_stream(config(), host).expect("session should start");

        session.close();
        session.close();
        assert_eq!(session.state(), LinkState::Disconnected);
        assert!(matches!(
            session.send_command(function::READ_STATUS, [0; PAYLOAD_LEN]),
            Err(SessionError::NotConnected)
        ));
        assert!(matches!(
            session.send_no_return(function::OPEN_ONE_NO_RETURN, [0, 0, 0, 1]),
            Err(SessionError::NotConnected)
        ));
    }

    #[test]
    fn link_loss_before_arming_fails_fast() {
        let (host, _device) = RelayStream::pair().expect("pair should open");
        let config = BoardConfig {
            read_timeout: Duration::from_secs(5),
            ..config()
        };
        let session = Session::from_stream(config, host).expect("session should start");

        // The link drops after the caller's first state check.
        session.shared.set_state(LinkState::Disconnected);
        assert!(matches!(
            session.arm_reply(),
            Err(SessionError::NotConnected)
        ));

        let late = build_reply(1, function::READ_STATUS, [0; PAYLOAD_LEN]).unwrap();
        assert!(!session.shared.slot.deliver(late));
    }

    #[test]
    fn timeout_millis_saturate() {
        assert_eq!(millis_u64(Duration::from_millis(150)), 150);
        assert_eq!(millis_u64(Duration::MAX), u64::MAX);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (host, _device) = RelayStream::pair().expect("pair should open");
        let err = Session::from_stream(BoardConfig::new("loopback", 1, 10), host).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame(FrameError::InvalidCircuitCount(10))
        ));
    }
}
