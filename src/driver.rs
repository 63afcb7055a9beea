//! The driver lifecycle: `init`, any number of `acquire`/`release`, then `destroy`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{BackendLoader, CompiledBackends};
use crate::config::{CreateConnectionHook, DriverConfig};
use crate::connection::{ConnectionHandle, DriverConnection, ReleaseKey};
use crate::error::DriverError;
use crate::identity::IdentityCache;
use crate::pool::{NativePool, PoolStatus};

static NEXT_DRIVER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Driver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DriverId(u64);

impl DriverId {
    fn next() -> Self {
        DriverId(NEXT_DRIVER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for DriverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "driver-{}", self.0)
    }
}

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    Destroyed,
}

enum DriverState {
    Uninitialized,
    /// `init` is resolving the backend; no pool yet.
    Initializing,
    Initialized(Arc<dyn NativePool>),
    Destroyed,
}

/// A pooled database driver.
///
/// The driver owns the backend pool exclusively. Everything else only sees
/// [`ConnectionHandle`]s.
///
/// ```no_run
/// use sql_pool_driver::prelude::*;
///
/// # async fn run() -> Result<(), DriverError> {
/// let driver = Driver::new(DriverConfig::sqlite("app.db"));
/// driver.init().await?;
///
/// let mut conn = driver.acquire().await?;
/// let result = conn
///     .execute_query(&CompiledQuery::new(
///         "UPDATE users SET active = ?1 WHERE id = ?2",
///         vec![RowValues::Bool(true), RowValues::Int(7)],
///     ))
///     .await?;
/// assert!(result.num_updated_or_deleted_rows().is_some());
/// driver.release(conn)?;
///
/// driver.destroy().await;
/// # Ok(())
/// # }
/// ```
pub struct Driver {
    id: DriverId,
    config: DriverConfig,
    loader: Arc<dyn BackendLoader>,
    state: Mutex<DriverState>,
    connections: IdentityCache<DriverConnection>,
    release_key: ReleaseKey,
}

impl Driver {
    /// Driver using the backends compiled into this build.
    #[must_use]
    pub fn new(config: DriverConfig) -> Self {
        Self::with_loader(config, CompiledBackends)
    }

    /// Driver that resolves its backend through `loader` during `init`.
    #[must_use]
    pub fn with_loader(config: DriverConfig, loader: impl BackendLoader + 'static) -> Self {
        let id = DriverId::next();
        Self {
            id,
            config,
            loader: Arc::new(loader),
            state: Mutex::new(DriverState::Uninitialized),
            connections: IdentityCache::new(),
            release_key: ReleaseKey::new(id),
        }
    }

    #[must_use]
    pub fn id(&self) -> DriverId {
        self.id
    }

    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Default port of the configured backend, `None` for file-based databases.
    #[must_use]
    pub fn default_port(&self) -> Option<u16> {
        self.config.database_type.default_port()
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        match &*self.lock_state() {
            DriverState::Uninitialized | DriverState::Initializing => LifecycleState::Uninitialized,
            DriverState::Initialized(_) => LifecycleState::Initialized,
            DriverState::Destroyed => LifecycleState::Destroyed,
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state() == LifecycleState::Initialized
    }

    /// Resolve the backend and build the pool.
    ///
    /// Physical connections are opened lazily, so an unreachable server only shows up on the
    /// first `acquire`.
    ///
    /// # Errors
    /// - [`DriverError::InvalidState`] when called a second time or after `destroy`.
    /// - [`DriverError::ConfigError`] for an invalid configuration.
    /// - [`DriverError::MissingDependency`] when the backend client is unavailable.
    ///
    /// On error the driver stays uninitialized.
    pub async fn init(&self) -> Result<(), DriverError> {
        {
            let mut state = self.lock_state();
            match *state {
                DriverState::Uninitialized => *state = DriverState::Initializing,
                DriverState::Initializing | DriverState::Initialized(_) => {
                    return Err(DriverError::InvalidState(format!(
                        "{} is already initialized",
                        self.id
                    )));
                }
                DriverState::Destroyed => {
                    return Err(DriverError::InvalidState(format!(
                        "{} has been destroyed",
                        self.id
                    )));
                }
            }
        }

        let pool = match self.build_pool() {
            Ok(pool) => pool,
            Err(err) => {
                let mut state = self.lock_state();
                if matches!(*state, DriverState::Initializing) {
                    *state = DriverState::Uninitialized;
                }
                tracing::error!(driver = %self.id, error = %err, "driver initialization failed");
                return Err(err);
            }
        };

        let raced_destroy = {
            let mut state = self.lock_state();
            if matches!(*state, DriverState::Initializing) {
                *state = DriverState::Initialized(Arc::clone(&pool));
                false
            } else {
                true
            }
        };
        if raced_destroy {
            pool.drain(std::time::Duration::ZERO).await;
            return Err(DriverError::InvalidState(format!(
                "{} was destroyed during initialization",
                self.id
            )));
        }

        tracing::info!(
            driver = %self.id,
            backend = pool.name(),
            database = self.config.database.as_deref().unwrap_or_default(),
            "driver initialized"
        );
        Ok(())
    }

    fn build_pool(&self) -> Result<Arc<dyn NativePool>, DriverError> {
        self.config.validate()?;
        let backend = self.loader.load(&self.config)?;
        backend.build_pool(&self.config.pool)
    }

    /// Check out a connection, waiting up to the connection timeout for one to free up.
    ///
    /// The creation hook runs before this returns, the first time a physical connection is
    /// handed out.
    ///
    /// # Errors
    /// - [`DriverError::InvalidState`] outside `init`..`destroy`.
    /// - [`DriverError::ConnectionAcquisition`] when the pool times out, the connection cannot
    ///   be opened, or the creation hook fails. The hook's error is kept as the source.
    pub async fn acquire(&self) -> Result<ConnectionHandle, DriverError> {
        let pool = self.pool()?;

        let lease = match pool.checkout().await {
            Ok(lease) => lease,
            Err(err) => {
                if self.state() == LifecycleState::Destroyed {
                    return Err(DriverError::InvalidState(format!(
                        "{} was destroyed while waiting for a connection",
                        self.id
                    )));
                }
                tracing::warn!(driver = %self.id, error = %err, "connection acquisition failed");
                return Err(err);
            }
        };

        let id = lease.id();
        let anchor = lease.anchor();
        let (connection, created) = self.connections.resolve(id, &anchor, || {
            DriverConnection::new(id, self.id, pool.name(), anchor.clone())
        });
        let checkouts = connection.record_checkout();
        let mut handle = ConnectionHandle::new(connection, lease);

        if created {
            tracing::debug!(
                driver = %self.id,
                connection = %id,
                "new physical connection observed"
            );
            if let Some(hook) = self.config.pool.on_create_connection.clone() {
                let pending = PendingConnection {
                    connections: &self.connections,
                    handle: Some(handle),
                };
                handle = match pending.run_hook(&hook).await {
                    Ok(handle) => handle,
                    Err(err) => {
                        tracing::warn!(
                            driver = %self.id,
                            connection = %id,
                            error = %err,
                            "connection creation hook failed"
                        );
                        return Err(err.into_acquisition("connection creation hook failed"));
                    }
                };
            }
        }

        tracing::trace!(driver = %self.id, connection = %id, checkouts, "connection acquired");
        Ok(handle)
    }

    /// Return a connection to the pool.
    ///
    /// A release that arrives after `destroy` has started is accepted; the connection is
    /// closed instead of pooled.
    ///
    /// # Errors
    /// - [`DriverError::InvalidConnection`] when the handle came from another driver. That
    ///   handle goes back to its own pool.
    /// - [`DriverError::InvalidState`] when the driver was never initialized.
    pub fn release(&self, handle: ConnectionHandle) -> Result<(), DriverError> {
        let id = handle.id();
        let lease = handle.into_lease(&self.release_key)?;

        match self.state() {
            LifecycleState::Initialized => {
                drop(lease);
                tracing::trace!(driver = %self.id, connection = %id, "connection released");
                Ok(())
            }
            LifecycleState::Destroyed => {
                lease.discard();
                tracing::debug!(
                    driver = %self.id,
                    connection = %id,
                    "connection released after destroy; closed"
                );
                Ok(())
            }
            LifecycleState::Uninitialized => Err(DriverError::InvalidState(format!(
                "{} is not initialized",
                self.id
            ))),
        }
    }

    /// Close the pool and wait for it to drain.
    ///
    /// Idle connections close immediately; checked-out ones close as they are released. Waits
    /// up to the drain timeout. A no-op before `init` and after the first `destroy`.
    pub async fn destroy(&self) {
        let pool = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut *state, DriverState::Destroyed) {
                DriverState::Initialized(pool) => pool,
                DriverState::Initializing => return,
                DriverState::Uninitialized => {
                    *state = DriverState::Uninitialized;
                    return;
                }
                DriverState::Destroyed => return,
            }
        };

        let timeout = self.config.pool.drain_timeout();
        tracing::info!(driver = %self.id, backend = pool.name(), "destroying driver");
        if !pool.drain(timeout).await {
            let status = pool.status();
            tracing::warn!(
                driver = %self.id,
                outstanding = status.size,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "pool did not drain in time; outstanding connections close when released"
            );
        }
        self.connections.clear();
    }

    /// Current pool counters.
    ///
    /// # Errors
    /// [`DriverError::InvalidState`] when the driver is not initialized.
    pub fn status(&self) -> Result<PoolStatus, DriverError> {
        Ok(self.pool()?.status())
    }

    /// Number of physical connections the driver currently knows a wrapper for.
    #[must_use]
    pub fn tracked_connections(&self) -> usize {
        self.connections.len()
    }

    fn pool(&self) -> Result<Arc<dyn NativePool>, DriverError> {
        match &*self.lock_state() {
            DriverState::Initialized(pool) => Ok(Arc::clone(pool)),
            DriverState::Uninitialized | DriverState::Initializing => Err(
                DriverError::InvalidState(format!("{} is not initialized", self.id)),
            ),
            DriverState::Destroyed => Err(DriverError::InvalidState(format!(
                "{} has been destroyed",
                self.id
            ))),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A new connection whose creation hook has not completed yet.
///
/// Until the hook succeeds the connection is not handed out. Dropping this, either on hook
/// failure or because the `acquire` future was cancelled mid-hook, forgets the wrapper and
/// closes the physical connection, so a half-initialized session never reaches the pool.
struct PendingConnection<'a> {
    connections: &'a IdentityCache<DriverConnection>,
    handle: Option<ConnectionHandle>,
}

impl PendingConnection<'_> {
    async fn run_hook(
        mut self,
        hook: &CreateConnectionHook,
    ) -> Result<ConnectionHandle, DriverError> {
        if let Some(handle) = self.handle.as_mut() {
            hook(handle).await?;
        }
        self.handle.take().ok_or_else(|| {
            DriverError::InvalidConnection("connection lost during creation hook".into())
        })
    }
}

impl Drop for PendingConnection<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.connections.forget(handle.id());
            handle.discard();
        }
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("id", &self.id)
            .field("database_type", &self.config.database_type)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
