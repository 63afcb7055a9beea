use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use deadpool::Runtime;
use deadpool::managed::{Object, Pool, PoolError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::manager::{BackendManager, ConnectionId, IdleClock};
use super::{NativeLease, NativePool, PoolFactory, PoolStatus};
use crate::backend::Backend;
use crate::config::PoolConfig;
use crate::error::DriverError;
use crate::results::QueryResult;
use crate::types::CompiledQuery;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(20);
const MIN_REAP_INTERVAL: Duration = Duration::from_millis(50);

pub(crate) struct BackendPoolFactory<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> BackendPoolFactory<B> {
    pub(crate) fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }
}

impl<B: Backend> PoolFactory for BackendPoolFactory<B> {
    fn name(&self) -> &'static str {
        self.backend.name()
    }

    fn build_pool(&self, config: &PoolConfig) -> Result<Arc<dyn NativePool>, DriverError> {
        let timeout = config.connection_timeout();
        let pool = Pool::builder(BackendManager::new(Arc::clone(&self.backend)))
            .max_size(config.max_connections)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| {
                DriverError::ConfigError(format!(
                    "failed to build {} pool: {e}",
                    self.backend.name()
                ))
            })?;

        let reaper = CancellationToken::new();
        if let Some(idle) = config.idle_timeout() {
            spawn_idle_reaper(pool.clone(), idle, reaper.clone());
        }

        tracing::info!(
            backend = self.backend.name(),
            max_connections = config.max_connections,
            connection_timeout_ms = config.connection_timeout_millis,
            idle_timeout_ms = config.idle_timeout_millis,
            "connection pool created"
        );

        Ok(Arc::new(DeadpoolAdapter {
            pool,
            name: self.backend.name(),
            connection_timeout: timeout,
            reaper,
        }))
    }
}

/// Closes connections that have sat in the pool longer than `idle` since they were returned.
fn spawn_idle_reaper<B: Backend>(
    pool: Pool<BackendManager<B>>,
    idle: Duration,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval((idle / 2).max(MIN_REAP_INTERVAL));
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let _ = pool.retain(|conn, _| conn.idle_for() < idle);
                }
            }
        }
    });
}

struct DeadpoolAdapter<B: Backend> {
    pool: Pool<BackendManager<B>>,
    name: &'static str,
    connection_timeout: Duration,
    reaper: CancellationToken,
}

impl<B: Backend> Drop for DeadpoolAdapter<B> {
    fn drop(&mut self) {
        self.reaper.cancel();
    }
}

#[async_trait]
impl<B: Backend> NativePool for DeadpoolAdapter<B> {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn checkout(&self) -> Result<Box<dyn NativeLease>, DriverError> {
        match tokio::time::timeout(self.connection_timeout, self.pool.get()).await {
            Ok(Ok(conn)) => Ok(Box::new(PooledLease::new(conn))),
            Ok(Err(err)) => Err(map_pool_error(self.name, err)),
            Err(_) => Err(DriverError::acquisition(format!(
                "timed out after {}ms waiting for a {} connection",
                self.connection_timeout.as_millis(),
                self.name
            ))),
        }
    }

    async fn drain(&self, timeout: Duration) -> bool {
        self.reaper.cancel();
        // idle connections are dropped here; checked-out ones are closed when they come back
        self.pool.close();

        let deadline = Instant::now() + timeout;
        loop {
            if self.pool.status().size == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }

    fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            max_connections: status.max_size,
            size: status.size,
            idle: usize::try_from(status.available).unwrap_or(0),
        }
    }
}

fn map_pool_error(name: &str, err: PoolError<DriverError>) -> DriverError {
    match err {
        PoolError::Backend(inner) => {
            inner.into_acquisition(&format!("failed to open a {name} connection"))
        }
        PoolError::Timeout(kind) => {
            DriverError::acquisition(format!("{name} pool timed out ({kind:?})"))
        }
        PoolError::Closed => DriverError::acquisition(format!("{name} pool is closed")),
        other => DriverError::acquisition(format!("{name} pool error: {other}")),
    }
}

/// Stamps the connection's idle clock when the lease goes back to the pool.
struct ReturnStamp(Arc<IdleClock>);

impl Drop for ReturnStamp {
    fn drop(&mut self) {
        self.0.touch();
    }
}

struct PooledLease<B: Backend> {
    // dropped before `object`, so the stamp is in place when the pool sees the connection
    stamp: ReturnStamp,
    object: Object<BackendManager<B>>,
}

impl<B: Backend> PooledLease<B> {
    fn new(object: Object<BackendManager<B>>) -> Self {
        Self {
            stamp: ReturnStamp(object.idle_clock()),
            object,
        }
    }
}

#[async_trait]
impl<B: Backend> NativeLease for PooledLease<B> {
    fn id(&self) -> ConnectionId {
        self.object.id
    }

    fn anchor(&self) -> Weak<()> {
        self.object.anchor()
    }

    async fn execute(&mut self, query: &CompiledQuery) -> Result<QueryResult, DriverError> {
        let conn = &mut *self.object;
        conn.backend.execute(&mut conn.raw, query).await
    }

    fn discard(self: Box<Self>) {
        let PooledLease { stamp, object } = *self;
        drop(Object::take(object));
        drop(stamp);
    }
}
