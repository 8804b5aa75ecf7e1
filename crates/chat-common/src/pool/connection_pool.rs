//! Generic connection pool
//!
//! A fixed number of connections of one [`Connector`] kind. Checkout waits
//! for an idle connection; a background task probes idle connections and
//! reopens discarded or failed slots.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Pool errors
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Failed to connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("Health check failed: {0}")]
    HealthCheck(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("Pool size must be at least 1")]
    EmptyPool,
}

/// Opens and probes connections of one kind
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Human readable target used in logs
    fn target(&self) -> String;

    async fn connect(&self) -> Result<Self::Connection, PoolError>;

    /// Trivial liveness probe (`PING`, `SELECT 1`, heartbeat)
    async fn ping(&self, conn: &mut Self::Connection) -> Result<(), PoolError>;
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub size: usize,
    pub health_check_interval: Duration,
    /// Bound on each connect and ping issued by the pool itself
    pub probe_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 4,
            health_check_interval: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

struct PoolEntry<T> {
    conn: T,
    last_health_check: Instant,
}

struct Shared<C: Connector> {
    connector: C,
    config: PoolConfig,
    idle: Mutex<VecDeque<PoolEntry<C::Connection>>>,
    /// Connections in existence, idle or checked out
    live: AtomicUsize,
    stopped: AtomicBool,
    available: Notify,
    /// Woken when a slot is discarded so it is reopened without waiting
    /// for the next tick
    replenish: Notify,
    shutdown: Notify,
}

impl<C: Connector> Shared<C> {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn return_connection(&self, entry: PoolEntry<C::Connection>) {
        {
            // `close` sets `stopped` under this lock before clearing `idle`
            let mut idle = self.idle.lock();
            if !self.is_stopped() {
                idle.push_back(entry);
                drop(idle);
                self.available.notify_one();
                return;
            }
        }
        self.live.fetch_sub(1, Ordering::AcqRel);
    }

    fn forget(&self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }

    /// Stop the pool and drop idle connections. `false` if already stopped.
    fn stop(&self) -> bool {
        let dropped = {
            let mut idle = self.idle.lock();
            if self.stopped.swap(true, Ordering::AcqRel) {
                return false;
            }
            let n = idle.len();
            idle.clear();
            n
        };
        self.live.fetch_sub(dropped, Ordering::AcqRel);
        self.available.notify_waiters();
        self.shutdown.notify_one();
        true
    }

    async fn connect_bounded(&self) -> Result<C::Connection, PoolError> {
        match tokio::time::timeout(self.config.probe_timeout, self.connector.connect()).await {
            Ok(result) => result,
            Err(_) => Err(PoolError::Timeout(format!(
                "connect to {}",
                self.connector.target()
            ))),
        }
    }

    async fn ping_bounded(&self, conn: &mut C::Connection) -> Result<(), PoolError> {
        match tokio::time::timeout(self.config.probe_timeout, self.connector.ping(conn)).await {
            Ok(result) => result,
            Err(_) => Err(PoolError::Timeout(format!("ping of {}", self.connector.target()))),
        }
    }
}

/// Fixed-size pool of live connections with a background health check
///
/// [`get_connection`](Self::get_connection) waits until a connection is idle
/// and returns `None` once the pool is closed. Dropping the returned guard
/// returns the connection.
pub struct ConnectionPool<C: Connector> {
    shared: Arc<Shared<C>>,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Connector> ConnectionPool<C> {
    /// Open `config.size` connections and start the health-check task
    pub async fn connect(connector: C, config: PoolConfig) -> Result<Self, PoolError> {
        if config.size == 0 {
            return Err(PoolError::EmptyPool);
        }

        let now = Instant::now();
        let mut idle = VecDeque::with_capacity(config.size);
        for _ in 0..config.size {
            idle.push_back(PoolEntry {
                conn: connector.connect().await?,
                last_health_check: now,
            });
        }

        info!(
            pool = %connector.target(),
            size = config.size,
            "Connection pool ready"
        );

        let shared = Arc::new(Shared {
            connector,
            live: AtomicUsize::new(config.size),
            config,
            idle: Mutex::new(idle),
            stopped: AtomicBool::new(false),
            available: Notify::new(),
            replenish: Notify::new(),
            shutdown: Notify::new(),
        });

        let health_task = tokio::spawn(health_loop(shared.clone()));

        Ok(Self {
            shared,
            health_task: Mutex::new(Some(health_task)),
        })
    }

    /// Wait for an idle connection. `None` once the pool is closed.
    pub async fn get_connection(&self) -> Option<PooledConnection<C>> {
        loop {
            let notified = self.shared.available.notified();
            tokio::pin!(notified);
            // Register before checking so a return between the check and the
            // await is not missed.
            notified.as_mut().enable();

            if self.shared.is_stopped() {
                return None;
            }
            let entry = self.shared.idle.lock().pop_front();
            if let Some(entry) = entry {
                return Some(PooledConnection {
                    entry: Some(entry),
                    shared: self.shared.clone(),
                });
            }

            notified.await;
        }
    }

    /// Stop the pool: wake every waiter, drop idle connections and join the
    /// health-check task. Idempotent.
    pub async fn close(&self) {
        if !self.shared.stop() {
            return;
        }

        let task = self.health_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!(pool = %self.shared.connector.target(), "Connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_stopped()
    }

    pub fn size(&self) -> usize {
        self.shared.config.size
    }

    pub fn idle_count(&self) -> usize {
        self.shared.idle.lock().len()
    }

    /// Connections currently open, idle or checked out
    pub fn live_count(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }

    pub fn connector(&self) -> &C {
        &self.shared.connector
    }
}

impl<C: Connector> Drop for ConnectionPool<C> {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

/// A checked-out connection; returned to the pool on drop
pub struct PooledConnection<C: Connector> {
    entry: Option<PoolEntry<C::Connection>>,
    shared: Arc<Shared<C>>,
}

impl<C: Connector> PooledConnection<C> {
    /// Drop the connection instead of returning it. The health-check task
    /// opens a replacement right away.
    pub fn discard(mut self) {
        if self.entry.take().is_some() {
            self.shared.forget();
            self.shared.replenish.notify_one();
        }
    }

    pub fn last_health_check(&self) -> Option<Instant> {
        self.entry.as_ref().map(|e| e.last_health_check)
    }
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        match &self.entry {
            Some(entry) => &entry.conn,
            None => unreachable!("connection used after discard"),
        }
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.entry {
            Some(entry) => &mut entry.conn,
            None => unreachable!("connection used after discard"),
        }
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            self.shared.return_connection(entry);
        }
    }
}

async fn health_loop<C: Connector>(shared: Arc<Shared<C>>) {
    let mut ticker = tokio::time::interval(shared.config.health_check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        let check = tokio::select! {
            _ = ticker.tick() => true,
            () = shared.replenish.notified() => false,
            () = shared.shutdown.notified() => break,
        };
        if shared.is_stopped() {
            break;
        }
        if check {
            check_idle(&shared).await;
        }
        refill(&shared).await;
    }
    debug!(pool = %shared.connector.target(), "Health check task stopped");
}

/// Ping the idle connections one at a time; drop the ones that fail
///
/// Only the entry being probed is out of the queue, so checkouts keep
/// working while a slow probe runs.
async fn check_idle<C: Connector>(shared: &Shared<C>) {
    let started = Instant::now();
    let queued = shared.idle.lock().len();

    for _ in 0..queued {
        let entry = {
            let mut idle = shared.idle.lock();
            // Entries probed in this pass went to the back; stop on reaching one
            match idle.front() {
                Some(entry) if entry.last_health_check < started => idle.pop_front(),
                _ => None,
            }
        };
        let Some(mut entry) = entry else { break };

        match shared.ping_bounded(&mut entry.conn).await {
            Ok(()) => {
                entry.last_health_check = Instant::now();
                shared.return_connection(entry);
            }
            Err(e) => {
                warn!(
                    pool = %shared.connector.target(),
                    error = %e,
                    "Idle connection failed health check, discarding"
                );
                shared.forget();
            }
        }
    }
}

/// Open connections until the pool is back at its configured size
async fn refill<C: Connector>(shared: &Shared<C>) {
    while !shared.is_stopped() && shared.live.load(Ordering::Acquire) < shared.config.size {
        match shared.connect_bounded().await {
            Ok(conn) => {
                shared.live.fetch_add(1, Ordering::AcqRel);
                shared.return_connection(PoolEntry {
                    conn,
                    last_health_check: Instant::now(),
                });
                debug!(pool = %shared.connector.target(), "Reconnected pool slot");
            }
            Err(e) => {
                warn!(
                    pool = %shared.connector.target(),
                    error = %e,
                    "Reconnect failed, retrying on next health check"
                );
                break;
            }
        }
    }
}
