use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};

use crate::command::CommandKind;
use crate::driver::DriverId;
use crate::error::DriverError;
use crate::pool::{ConnectionId, NativeLease};
use crate::results::QueryResult;
use crate::types::CompiledQuery;

/// The driver's wrapper around one physical connection.
///
/// Exactly one `DriverConnection` exists per physical connection for as long as the pool keeps
/// it open, so `Arc::ptr_eq` on two wrappers tells whether two checkouts landed on the same
/// connection.
#[derive(Debug)]
pub struct DriverConnection {
    id: ConnectionId,
    driver_id: DriverId,
    backend: &'static str,
    created_at: DateTime<Utc>,
    checkouts: AtomicU64,
    anchor: Weak<()>,
}

impl DriverConnection {
    pub(crate) fn new(
        id: ConnectionId,
        driver_id: DriverId,
        backend: &'static str,
        anchor: Weak<()>,
    ) -> Self {
        Self {
            id,
            driver_id,
            backend,
            created_at: Utc::now(),
            checkouts: AtomicU64::new(0),
            anchor,
        }
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// When the driver first observed this physical connection.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// How many times this connection has been handed out by `acquire`.
    #[must_use]
    pub fn checkouts(&self) -> u64 {
        self.checkouts.load(Ordering::Relaxed)
    }

    /// Whether the pool still keeps the physical connection open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.anchor.strong_count() > 0
    }

    pub(crate) fn record_checkout(&self) -> u64 {
        self.checkouts.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Capability needed to hand a connection back to the pool. Only the issuing driver has one.
#[derive(Debug)]
pub(crate) struct ReleaseKey {
    driver_id: DriverId,
}

impl ReleaseKey {
    pub(crate) fn new(driver_id: DriverId) -> Self {
        Self { driver_id }
    }
}

/// A checked-out connection, returned by `Driver::acquire`.
///
/// Hand it back with `Driver::release`. A handle that is simply dropped also returns its
/// connection to the pool.
pub struct ConnectionHandle {
    connection: Arc<DriverConnection>,
    lease: Box<dyn NativeLease>,
}

impl ConnectionHandle {
    pub(crate) fn new(connection: Arc<DriverConnection>, lease: Box<dyn NativeLease>) -> Self {
        Self { connection, lease }
    }

    /// The wrapper for the underlying physical connection.
    #[must_use]
    pub fn connection(&self) -> &Arc<DriverConnection> {
        &self.connection
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.connection.id
    }

    /// Run one compiled statement on this connection.
    ///
    /// `bindings` are bound positionally, in the order of the placeholders in `sql`. The
    /// affected-row count is only reported for `UPDATE` and `DELETE`.
    ///
    /// # Errors
    /// Returns [`DriverError::QueryExecution`] carrying the backend's error when the
    /// statement fails. Nothing is retried.
    pub async fn execute_query(
        &mut self,
        query: &CompiledQuery,
    ) -> Result<QueryResult, DriverError> {
        let kind = CommandKind::classify(&query.sql);
        tracing::debug!(
            connection = %self.connection.id,
            ?kind,
            params = query.bindings.len(),
            "executing query"
        );
        match self.lease.execute(query).await {
            Ok(result) => Ok(result),
            Err(err) => {
                tracing::debug!(connection = %self.connection.id, error = %err, "query failed");
                Err(err)
            }
        }
    }

    /// Give up the lease. Fails when `key` belongs to a different driver.
    pub(crate) fn into_lease(self, key: &ReleaseKey) -> Result<Box<dyn NativeLease>, DriverError> {
        if self.connection.driver_id != key.driver_id {
            return Err(DriverError::InvalidConnection(format!(
                "{} was acquired from {}, not {}",
                self.connection.id, self.connection.driver_id, key.driver_id
            )));
        }
        Ok(self.lease)
    }

    /// Close the physical connection instead of returning it to the pool.
    pub(crate) fn discard(self) {
        self.lease.discard();
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.connection.id)
            .field("backend", &self.connection.backend)
            .field("checkouts", &self.connection.checkouts())
            .finish_non_exhaustive()
    }
}
