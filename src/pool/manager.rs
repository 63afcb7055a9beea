use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use deadpool::managed::{Manager, Metrics, RecycleError, RecycleResult};
use tokio::time::Instant;

use crate::backend::Backend;
use crate::error::DriverError;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        ConnectionId(raw)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A native connection as stored inside the pool.
///
/// `anchor` lives exactly as long as the physical connection; everything outside the pool
/// only ever holds `Weak` references to it.
pub(crate) struct PhysicalConnection<B: Backend> {
    pub(crate) id: ConnectionId,
    anchor: Arc<()>,
    idle: Arc<IdleClock>,
    pub(crate) backend: Arc<B>,
    pub(crate) raw: B::Connection,
}

impl<B: Backend> PhysicalConnection<B> {
    fn new(backend: Arc<B>, raw: B::Connection) -> Self {
        Self {
            id: ConnectionId::next(),
            anchor: Arc::new(()),
            idle: Arc::new(IdleClock::new()),
            backend,
            raw,
        }
    }

    pub(crate) fn anchor(&self) -> Weak<()> {
        Arc::downgrade(&self.anchor)
    }

    pub(crate) fn idle_clock(&self) -> Arc<IdleClock> {
        Arc::clone(&self.idle)
    }

    /// Time since the connection was last returned to the pool.
    pub(crate) fn idle_for(&self) -> Duration {
        self.idle.elapsed()
    }
}

/// Records when a connection last went back to the pool.
///
/// Stored as milliseconds since `origin` so it can be stamped from any thread without a lock.
#[derive(Debug)]
pub(crate) struct IdleClock {
    origin: Instant,
    returned_at_ms: AtomicU64,
}

impl IdleClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            returned_at_ms: AtomicU64::new(0),
        }
    }

    pub(crate) fn touch(&self) {
        let now = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.returned_at_ms.fetch_max(now, Ordering::Relaxed);
    }

    pub(crate) fn elapsed(&self) -> Duration {
        let returned_at =
            self.origin + Duration::from_millis(self.returned_at_ms.load(Ordering::Relaxed));
        Instant::now().saturating_duration_since(returned_at)
    }
}

impl<B: Backend> Drop for PhysicalConnection<B> {
    fn drop(&mut self) {
        tracing::debug!(
            backend = self.backend.name(),
            connection = %self.id,
            "physical connection closed"
        );
    }
}

/// deadpool manager that opens and health-checks connections through a [`Backend`].
pub(crate) struct BackendManager<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> BackendManager<B> {
    pub(crate) fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }
}

impl<B: Backend> Manager for BackendManager<B> {
    type Type = PhysicalConnection<B>;
    type Error = DriverError;

    #[allow(clippy::manual_async_fn)]
    fn create(&self) -> impl Future<Output = Result<Self::Type, Self::Error>> + Send {
        let backend = Arc::clone(&self.backend);
        async move {
            let raw = backend.connect().await?;
            let conn = PhysicalConnection::new(backend, raw);
            tracing::debug!(
                backend = conn.backend.name(),
                connection = %conn.id,
                "physical connection opened"
            );
            Ok(conn)
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn recycle(
        &self,
        conn: &mut Self::Type,
        _metrics: &Metrics,
    ) -> impl Future<Output = RecycleResult<Self::Error>> + Send {
        async move {
            if conn.backend.is_broken(&conn.raw) {
                return Err(RecycleError::Backend(DriverError::acquisition(format!(
                    "{} was closed by the server",
                    conn.id
                ))));
            }
            let PhysicalConnection { backend, raw, .. } = conn;
            backend.ping(raw).await.map_err(RecycleError::Backend)
        }
    }
}
