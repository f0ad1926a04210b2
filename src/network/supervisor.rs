//! Supervisor / Pool
//!
//! Per-endpoint pool of connections with lifecycle supervision.
//!
//! ## Responsibilities
//! - Hand out the least-loaded Ready connection, spawning up to the
//!   configured maximum and blocking when saturated
//! - Replace failed connections after an exponential, jittered backoff
//! - Mark the endpoint unreachable after repeated consecutive failures
//! - Drain and close every child within the shutdown grace period

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, Sender};
use crossbeam::select;
use parking_lot::{Condvar, Mutex};
use rand::Rng;

use crate::config::Config;
use crate::cursor::CursorStream;
use crate::error::{MongoError, Result};
use crate::wire::Message;

use super::connection::{ConnEvent, Connection, ConnectionState, ReplyFuture};
use super::Endpoint;

/// Control messages accepted by the maintenance thread
enum Command {
    Shutdown,
}

struct SupervisorInner {
    endpoint: Endpoint,
    config: Config,
    pool: Mutex<Vec<Connection>>,
    pool_changed: Condvar,
    shutdown: AtomicBool,
    unreachable: AtomicBool,
    consecutive_failures: AtomicU32,
    event_tx: Sender<ConnEvent>,
}

impl SupervisorInner {
    /// Open a connection, updating the failure accounting either way
    fn open_connection(&self) -> Result<Connection> {
        match Connection::connect_with_events(
            &self.endpoint,
            &self.config,
            Some(self.event_tx.clone()),
        ) {
            Ok(conn) => {
                self.consecutive_failures.store(0, Ordering::Release);
                self.unreachable.store(false, Ordering::Release);
                let mut pool = self.pool.lock();
                pool.push(conn.clone());
                tracing::info!(
                    endpoint = %self.endpoint,
                    connections = pool.len(),
                    "opened connection"
                );
                drop(pool);
                self.pool_changed.notify_all();
                Ok(conn)
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.config.max_consecutive_failures
                    && !self.unreachable.swap(true, Ordering::AcqRel)
                {
                    tracing::warn!(
                        endpoint = %self.endpoint,
                        failures,
                        "endpoint marked unreachable"
                    );
                    // wake the maintenance thread so it keeps probing
                    let _ = self.event_tx.send(ConnEvent { id: 0, failed: true });
                }
                Err(e)
            }
        }
    }

    /// Exponential backoff from the consecutive-failure count, jittered
    fn backoff_delay(&self) -> Duration {
        let failures = self.consecutive_failures.load(Ordering::Acquire).min(10);
        let base = self.config.reconnect_base_ms.max(1);
        let raw = base.saturating_mul(1u64 << failures);
        let capped = raw.min(self.config.reconnect_cap_ms.max(base));
        let jitter = self.config.reconnect_jitter.clamp(0.0, 1.0);
        let roll: f64 = rand::thread_rng().gen();
        let factor = 1.0 + jitter * (2.0 * roll - 1.0);
        Duration::from_millis((capped as f64 * factor).max(1.0) as u64)
    }
}

/// Supervises the connection pool for one endpoint.
///
/// Dropping the supervisor shuts it down; `shutdown` is idempotent.
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
    maintenance: Mutex<Option<JoinHandle<()>>>,
    cmd_tx: Sender<Command>,
}

impl Supervisor {
    /// Spawn the supervisor for an endpoint. Connections are opened on
    /// demand, so a supervisor for a down endpoint is created successfully
    /// and fails at `acquire` time.
    pub fn start(endpoint: Endpoint, config: Config) -> Result<Supervisor> {
        let (cmd_tx, cmd_rx) = bounded::<Command>(8);
        let (event_tx, event_rx) = bounded::<ConnEvent>(64);

        let inner = Arc::new(SupervisorInner {
            endpoint: endpoint.clone(),
            config,
            pool: Mutex::new(Vec::new()),
            pool_changed: Condvar::new(),
            shutdown: AtomicBool::new(false),
            unreachable: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
            event_tx,
        });

        let maintenance_inner = Arc::clone(&inner);
        let handle = thread::Builder::new()
            .name(format!("mongowire-supervisor-{}", endpoint))
            .spawn(move || maintenance_loop(maintenance_inner, cmd_rx, event_rx))?;

        tracing::info!(endpoint = %inner.endpoint, "supervisor started");

        Ok(Supervisor {
            inner,
            maintenance: Mutex::new(Some(handle)),
            cmd_tx,
        })
    }

    /// Pick the least-loaded Ready connection, opening a new one while below
    /// the pool limit. Blocks while the pool is saturated.
    pub fn acquire(&self) -> Result<Connection> {
        let deadline =
            Instant::now() + Duration::from_millis(self.inner.config.connect_timeout_ms);
        loop {
            if self.inner.shutdown.load(Ordering::Acquire) {
                return Err(MongoError::Shutdown);
            }
            if self.inner.unreachable.load(Ordering::Acquire) {
                return Err(MongoError::Unreachable);
            }

            let mut pool = self.inner.pool.lock();
            pool.retain(|conn| {
                matches!(
                    conn.state(),
                    ConnectionState::Connecting | ConnectionState::Ready
                )
            });

            let best = pool
                .iter()
                .filter(|conn| conn.state() == ConnectionState::Ready)
                .min_by_key(|conn| conn.pending_count())
                .cloned();
            let size = pool.len();

            if let Some(conn) = &best {
                if conn.pending_count() == 0
                    || size >= self.inner.config.max_connections_per_endpoint
                {
                    return Ok(conn.clone());
                }
            }

            if size < self.inner.config.max_connections_per_endpoint {
                drop(pool);
                match self.inner.open_connection() {
                    Ok(conn) => return Ok(conn),
                    Err(e) => {
                        // a loaded but live connection beats a failed dial
                        if let Some(conn) = best {
                            return Ok(conn);
                        }
                        return Err(e);
                    }
                }
            }

            if self
                .inner
                .pool_changed
                .wait_until(&mut pool, deadline)
                .timed_out()
            {
                return Err(MongoError::Timeout);
            }
        }
    }

    /// Submit a request on a pooled connection
    pub fn send(&self, message: Message) -> Result<ReplyFuture> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(MongoError::Shutdown);
        }
        let conn = self.acquire()?;
        conn.submit(message)
    }

    /// Issue a QUERY and expose its result set as a demand-driven stream.
    ///
    /// # Panics
    /// Panics when handed anything but `Message::Query`.
    pub fn query(&self, message: Message) -> Result<CursorStream> {
        let full_collection_name = match &message {
            Message::Query {
                full_collection_name,
                ..
            } => full_collection_name.clone(),
            _ => panic!("query() requires Message::Query"),
        };
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(MongoError::Shutdown);
        }
        let conn = self.acquire()?;
        let first_reply = conn.submit(message)?;
        Ok(CursorStream::new(
            conn,
            full_collection_name,
            first_reply,
            self.inner.config.cursor_batch_size,
            Duration::from_millis(self.inner.config.request_timeout_ms),
        ))
    }

    /// Drain and close every connection, then stop the maintenance thread.
    /// Idempotent; bounded by `shutdown_timeout_ms`.
    pub fn shutdown(&self) {
        if self.inner.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(endpoint = %self.inner.endpoint, "supervisor shutting down");

        let _ = self.cmd_tx.send(Command::Shutdown);

        let grace = Duration::from_millis(self.inner.config.shutdown_timeout_ms);
        let deadline = Instant::now() + grace;
        let conns: Vec<Connection> = self.inner.pool.lock().drain(..).collect();
        for conn in &conns {
            conn.begin_drain(grace);
        }
        for conn in &conns {
            if !conn.wait_closed(deadline) {
                tracing::warn!(
                    conn = conn.id(),
                    "connection missed the shutdown deadline, forcing close"
                );
                conn.abort();
            }
        }
        self.inner.pool_changed.notify_all();

        if let Some(handle) = self.maintenance.lock().take() {
            let _ = handle.join();
        }
        tracing::info!(endpoint = %self.inner.endpoint, "supervisor shutdown complete");
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Live connections currently pooled
    pub fn connection_count(&self) -> usize {
        self.inner.pool.lock().len()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// Maintenance Thread
// =============================================================================

/// Prunes closed connections and replaces failed ones after a backoff.
/// The channel timeout doubles as the backoff timer, so a shutdown command
/// interrupts a pending reconnect immediately.
fn maintenance_loop(
    inner: Arc<SupervisorInner>,
    cmd_rx: Receiver<Command>,
    event_rx: Receiver<ConnEvent>,
) {
    let mut reconnect_due: Option<Instant> = None;

    loop {
        let tick = match reconnect_due {
            Some(due) => due.saturating_duration_since(Instant::now()),
            None => Duration::from_millis(500),
        };

        select! {
            recv(cmd_rx) -> cmd => match cmd {
                Ok(Command::Shutdown) | Err(_) => break,
            },
            recv(event_rx) -> event => match event {
                Ok(event) => {
                    if event.id != 0 {
                        let mut pool = inner.pool.lock();
                        pool.retain(|conn| conn.id() != event.id);
                        drop(pool);
                        inner.pool_changed.notify_all();
                    }
                    if event.failed && !inner.shutdown.load(Ordering::Acquire) {
                        let delay = inner.backoff_delay();
                        let due = Instant::now() + delay;
                        reconnect_due = Some(reconnect_due.map_or(due, |prev| prev.min(due)));
                        tracing::info!(
                            endpoint = %inner.endpoint,
                            delay_ms = delay.as_millis() as u64,
                            "scheduling reconnect"
                        );
                    }
                }
                Err(_) => break,
            },
            default(tick) => {
                if !reconnect_due.is_some_and(|due| Instant::now() >= due) {
                    continue;
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    reconnect_due = None;
                    continue;
                }
                match inner.open_connection() {
                    Ok(_) => {
                        reconnect_due = None;
                    }
                    Err(e) => {
                        let delay = inner.backoff_delay();
                        tracing::warn!(
                            endpoint = %inner.endpoint,
                            error = %e,
                            retry_ms = delay.as_millis() as u64,
                            "reconnect attempt failed"
                        );
                        reconnect_due = Some(Instant::now() + delay);
                    }
                }
            }
        }
    }

    tracing::debug!(endpoint = %inner.endpoint, "supervisor maintenance stopped");
}
