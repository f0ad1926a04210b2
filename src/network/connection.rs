//! Connection Handler
//!
//! Owns a single TCP socket, writes framed requests, reads framed replies,
//! and correlates replies to their originating request.
//!
//! ## Architecture
//! - One writer thread drains the bounded submission queue and owns all
//!   socket writes
//! - One reader thread length-frames the inbound stream and completes the
//!   in-flight table
//! - Producers interact only through channels; the bounded queue yields
//!   backpressure when full
//!
//! State machine: `Connecting → Ready → Draining → Closed`, with
//! `Failed → Closed` on any transport or decode error. A failure completes
//! every in-flight request with the failure cause.

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown as SocketShutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};

use crate::config::Config;
use crate::error::{DecodeError, EncodeError, MongoError, Result};
use crate::rope::ByteRope;
use crate::wire::{encode_message, next_request_id, op_code, Message, MsgHeader, Reply, HEADER_SIZE};

use super::Endpoint;

/// Depth of the bounded submission queue; a full queue blocks submitters
const SUBMIT_QUEUE_DEPTH: usize = 64;

/// Socket read timeout; bounds how quickly the reader observes state changes
const READ_POLL: Duration = Duration::from_millis(200);

/// Writer wake-up interval for state checks while the queue is idle
const WRITE_POLL: Duration = Duration::from_millis(100);

/// Drain grace applied when the last handle is dropped without a supervisor
const DETACHED_DRAIN_GRACE: Duration = Duration::from_secs(5);

static CONN_SEQ: AtomicU64 = AtomicU64::new(1);

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Ready,
    Draining,
    Failed,
    Closed,
}

/// Emitted to the supervisor when a connection reaches Closed
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnEvent {
    pub id: u64,
    pub failed: bool,
}

struct Submission {
    message: Message,
    responder: Option<Sender<Result<Reply>>>,
}

/// Completion handle for a submitted request.
///
/// Dropping the future orphans the in-flight slot: a reply that arrives later
/// is discarded without disturbing the connection.
#[derive(Debug)]
pub struct ReplyFuture {
    rx: Receiver<Result<Reply>>,
}

impl ReplyFuture {
    /// Block until the reply or a connection failure arrives
    pub fn wait(self) -> Result<Reply> {
        match self.rx.recv() {
            Ok(result) => result,
            Err(_) => Err(MongoError::Cancelled),
        }
    }

    /// Block up to `timeout`, failing with `Timeout` afterwards
    pub fn wait_timeout(self, timeout: Duration) -> Result<Reply> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(MongoError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(MongoError::Cancelled),
        }
    }
}

#[derive(Debug)]
struct Shared {
    id: u64,
    peer: SocketAddr,
    max_frame_bytes: usize,
    state: Mutex<ConnectionState>,
    state_changed: Condvar,
    in_flight: Mutex<HashMap<i32, Sender<Result<Reply>>>>,
    pending: AtomicUsize,
    drain_deadline: Mutex<Option<Instant>>,
    /// Control clone of the socket, used only to force close
    socket: TcpStream,
    events: Option<Sender<ConnEvent>>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn begin_drain(&self, grace: Duration) {
        {
            let mut state = self.state.lock();
            if !matches!(
                *state,
                ConnectionState::Connecting | ConnectionState::Ready
            ) {
                return;
            }
            *state = ConnectionState::Draining;
            self.state_changed.notify_all();
        }
        *self.drain_deadline.lock() = Some(Instant::now() + grace);
        tracing::debug!(conn = self.id, "draining connection");
    }

    /// Fatal error: complete every in-flight request with the cause and close
    fn fail(&self, err: MongoError) {
        {
            let mut state = self.state.lock();
            if matches!(*state, ConnectionState::Closed | ConnectionState::Failed) {
                return;
            }
            *state = ConnectionState::Failed;
            self.state_changed.notify_all();
        }
        tracing::warn!(conn = self.id, peer = %self.peer, error = %err, "connection failed");

        let waiters: Vec<_> = self.in_flight.lock().drain().collect();
        self.pending.store(0, Ordering::Relaxed);
        for (_, responder) in waiters {
            let cause = std::io::Error::new(ErrorKind::Other, err.to_string());
            let _ = responder.send(Err(MongoError::Io(cause)));
        }
        self.terminate(true);
    }

    /// Final transition to Closed; idempotent
    fn terminate(&self, failed: bool) {
        {
            let mut state = self.state.lock();
            if *state == ConnectionState::Closed {
                return;
            }
            *state = ConnectionState::Closed;
            self.state_changed.notify_all();
        }
        let _ = self.socket.shutdown(SocketShutdown::Both);
        if let Some(events) = &self.events {
            let _ = events.send(ConnEvent {
                id: self.id,
                failed,
            });
        }
        tracing::debug!(conn = self.id, failed, "connection closed");
    }

    /// Drain ran out of time or requests: complete leftovers and close
    fn finish_drain(&self) {
        let waiters: Vec<_> = self.in_flight.lock().drain().collect();
        self.pending.store(0, Ordering::Relaxed);
        for (_, responder) in waiters {
            let _ = responder.send(Err(MongoError::Shutdown));
        }
        self.terminate(false);
    }
}

/// Handle to a pooled connection. Cloning shares the underlying socket and
/// in-flight table.
#[derive(Clone, Debug)]
pub struct Connection {
    shared: Arc<Shared>,
    submit_tx: Sender<Submission>,
}

impl Connection {
    /// Open a TCP connection to the endpoint and spawn its reader and writer
    /// threads
    pub fn connect(endpoint: &Endpoint, config: &Config) -> Result<Connection> {
        Self::connect_with_events(endpoint, config, None)
    }

    pub(crate) fn connect_with_events(
        endpoint: &Endpoint,
        config: &Config,
        events: Option<Sender<ConnEvent>>,
    ) -> Result<Connection> {
        let id = CONN_SEQ.fetch_add(1, Ordering::Relaxed);

        let addrs = endpoint.resolve()?;
        let addr = addrs
            .first()
            .ok_or_else(|| MongoError::InvalidEndpoint(endpoint.to_string()))?;

        let socket = TcpStream::connect_timeout(
            addr,
            Duration::from_millis(config.connect_timeout_ms),
        )
        .map_err(|e| {
            if e.kind() == ErrorKind::ConnectionRefused {
                MongoError::ConnectRefused(endpoint.to_string())
            } else {
                MongoError::Io(e)
            }
        })?;
        socket.set_nodelay(true)?;

        let write_stream = socket.try_clone()?;
        let read_stream = socket.try_clone()?;
        read_stream.set_read_timeout(Some(READ_POLL))?;

        let shared = Arc::new(Shared {
            id,
            peer: *addr,
            max_frame_bytes: config.max_frame_bytes,
            state: Mutex::new(ConnectionState::Connecting),
            state_changed: Condvar::new(),
            in_flight: Mutex::new(HashMap::new()),
            pending: AtomicUsize::new(0),
            drain_deadline: Mutex::new(None),
            socket,
            events,
        });

        let (submit_tx, submit_rx) = bounded::<Submission>(SUBMIT_QUEUE_DEPTH);

        let writer_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name(format!("mongowire-writer-{}", id))
            .spawn(move || writer_loop(writer_shared, write_stream, submit_rx))?;

        let reader_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name(format!("mongowire-reader-{}", id))
            .spawn(move || reader_loop(reader_shared, read_stream))?;

        *shared.state.lock() = ConnectionState::Ready;
        shared.state_changed.notify_all();
        tracing::debug!(conn = id, peer = %addr, "connection established");

        Ok(Connection { shared, submit_tx })
    }

    /// Submit a request and receive a completion handle for its reply.
    ///
    /// Blocks when the submission queue is full (backpressure). Requests are
    /// written to the socket in submission order.
    pub fn submit(&self, message: Message) -> Result<ReplyFuture> {
        self.check_accepting()?;
        let (tx, rx) = bounded(1);
        self.submit_tx
            .send(Submission {
                message,
                responder: Some(tx),
            })
            .map_err(|_| MongoError::NotReady)?;
        Ok(ReplyFuture { rx })
    }

    /// Submit a request that never receives a reply (KILL_CURSORS). Never
    /// blocks; a full queue is reported as a failure for the caller to log.
    pub fn fire_and_forget(&self, message: Message) -> Result<()> {
        self.check_accepting()?;
        match self.submit_tx.try_send(Submission {
            message,
            responder: None,
        }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                Err(MongoError::WriteFailed("submission queue full".to_string()))
            }
            Err(TrySendError::Disconnected(_)) => Err(MongoError::NotReady),
        }
    }

    fn check_accepting(&self) -> Result<()> {
        match self.shared.state() {
            ConnectionState::Connecting | ConnectionState::Ready => Ok(()),
            ConnectionState::Draining
            | ConnectionState::Failed
            | ConnectionState::Closed => Err(MongoError::NotReady),
        }
    }

    /// Stop accepting requests and close once in-flight replies have arrived
    /// or the grace period expires
    pub fn begin_drain(&self, grace: Duration) {
        self.shared.begin_drain(grace);
    }

    /// Force-close, completing any in-flight requests with `Shutdown`
    pub(crate) fn abort(&self) {
        self.shared.finish_drain();
    }

    /// Block until the connection reaches Closed or the deadline passes
    pub fn wait_closed(&self, deadline: Instant) -> bool {
        let mut state = self.shared.state.lock();
        while *state != ConnectionState::Closed {
            if self
                .shared
                .state_changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return *state == ConnectionState::Closed;
            }
        }
        true
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Number of requests awaiting replies
    pub fn pending_count(&self) -> usize {
        self.shared.pending.load(Ordering::Relaxed)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.shared.peer
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }
}

// =============================================================================
// Writer Thread
// =============================================================================

fn writer_loop(shared: Arc<Shared>, mut stream: TcpStream, submit_rx: Receiver<Submission>) {
    tracing::debug!(conn = shared.id, "writer started");

    loop {
        match submit_rx.recv_timeout(WRITE_POLL) {
            Ok(submission) => {
                let state = shared.state();
                if !matches!(
                    state,
                    ConnectionState::Connecting | ConnectionState::Ready
                ) {
                    if let Some(responder) = submission.responder {
                        let _ = responder.send(Err(MongoError::NotReady));
                    }
                    continue;
                }

                let request_id = next_request_id();
                let frame =
                    match encode_message(&submission.message, request_id, shared.max_frame_bytes) {
                        Ok(frame) => frame,
                        Err(e) => {
                            // encode failures never touch the connection
                            if let Some(responder) = submission.responder {
                                let _ = responder.send(Err(e.into()));
                            }
                            continue;
                        }
                    };

                if let Some(responder) = submission.responder {
                    shared.in_flight.lock().insert(request_id, responder);
                    shared.pending.fetch_add(1, Ordering::Relaxed);
                }

                if let Err(e) = write_frame(&mut stream, &frame) {
                    shared.fail(MongoError::WriteFailed(e.to_string()));
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if matches!(
                    shared.state(),
                    ConnectionState::Failed | ConnectionState::Closed
                ) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                // every handle is gone; let outstanding replies drain, then close
                shared.begin_drain(DETACHED_DRAIN_GRACE);
                break;
            }
        }
    }

    tracing::debug!(conn = shared.id, "writer stopped");
}

/// Write every chunk of the frame in order. `write_all` retries partial
/// writes without reordering.
fn write_frame(stream: &mut TcpStream, frame: &ByteRope) -> std::io::Result<()> {
    for chunk in frame.chunk_slices() {
        stream.write_all(chunk)?;
    }
    stream.flush()
}

// =============================================================================
// Reader Thread
// =============================================================================

fn reader_loop(shared: Arc<Shared>, mut stream: TcpStream) {
    tracing::debug!(conn = shared.id, "reader started");

    loop {
        match read_frame(&shared, &mut stream) {
            Ok(Some(frame)) => {
                if let Err(e) = handle_frame(&shared, frame) {
                    shared.fail(e);
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                shared.fail(e);
                break;
            }
        }
    }

    tracing::debug!(conn = shared.id, "reader stopped");
}

/// Read one length-prefixed frame. Returns None when the connection reached a
/// terminal state while waiting at a frame boundary.
fn read_frame(shared: &Shared, stream: &mut TcpStream) -> Result<Option<ByteRope>> {
    let mut len_buf = [0u8; 4];
    if !read_exact_polled(shared, stream, &mut len_buf, true)? {
        return Ok(None);
    }

    let message_length = i32::from_le_bytes(len_buf);
    if message_length < HEADER_SIZE as i32 {
        return Err(MongoError::Decode(DecodeError::LengthMismatch {
            declared: message_length,
            available: HEADER_SIZE,
        }));
    }
    if message_length as usize > shared.max_frame_bytes {
        return Err(MongoError::Encode(EncodeError::FrameTooLarge {
            size: message_length as usize,
            max: shared.max_frame_bytes,
        }));
    }

    let mut rest = vec![0u8; message_length as usize - 4];
    if !read_exact_polled(shared, stream, &mut rest, false)? {
        return Ok(None);
    }

    let mut frame = Vec::with_capacity(message_length as usize);
    frame.extend_from_slice(&len_buf);
    frame.extend_from_slice(&rest);
    Ok(Some(ByteRope::from_vec(frame)))
}

/// `read_exact` that re-checks connection state on every poll tick, so drain
/// deadlines and forced closes interrupt a blocked read without corrupting
/// the framing.
fn read_exact_polled(
    shared: &Shared,
    stream: &mut TcpStream,
    buf: &mut [u8],
    at_frame_boundary: bool,
) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match shared.state() {
            ConnectionState::Failed | ConnectionState::Closed => return Ok(false),
            ConnectionState::Draining => {
                let idle = shared.in_flight.lock().is_empty();
                let expired = shared
                    .drain_deadline
                    .lock()
                    .is_some_and(|deadline| Instant::now() >= deadline);
                if (idle && at_frame_boundary && filled == 0) || expired {
                    shared.finish_drain();
                    return Ok(false);
                }
            }
            _ => {}
        }

        match stream.read(&mut buf[filled..]) {
            Ok(0) => {
                let draining_idle = shared.state() == ConnectionState::Draining
                    && shared.in_flight.lock().is_empty();
                if at_frame_boundary && filled == 0 && draining_idle {
                    shared.finish_drain();
                    return Ok(false);
                }
                return Err(MongoError::ReadFailed(
                    "connection closed by peer".to_string(),
                ));
            }
            Ok(n) => filled += n,
            Err(e)
                if e.kind() == ErrorKind::WouldBlock
                    || e.kind() == ErrorKind::TimedOut
                    || e.kind() == ErrorKind::Interrupted =>
            {
                continue;
            }
            Err(e) => return Err(MongoError::Io(e)),
        }
    }
    Ok(true)
}

/// Decode a frame and deliver the reply to its waiting requester
fn handle_frame(shared: &Shared, frame: ByteRope) -> Result<()> {
    let mut reader = frame.reader();
    let header = MsgHeader::decode(&mut reader)?;

    if header.op_code != op_code::REPLY {
        return Err(MongoError::ReadFailed(format!(
            "unexpected op code {} from server",
            header.op_code
        )));
    }

    let body = frame.slice(HEADER_SIZE, frame.len())?;
    let reply = Reply::decode(&body)?;

    let responder = shared.in_flight.lock().remove(&header.response_to);
    match responder {
        Some(responder) => {
            shared.pending.fetch_sub(1, Ordering::Relaxed);
            if responder.send(Ok(reply)).is_err() {
                tracing::debug!(
                    conn = shared.id,
                    response_to = header.response_to,
                    "discarding reply for an abandoned request"
                );
            }
        }
        None => {
            tracing::warn!(
                conn = shared.id,
                response_to = header.response_to,
                "discarding reply with no matching request"
            );
        }
    }
    Ok(())
}
