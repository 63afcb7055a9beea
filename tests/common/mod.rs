#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sql_pool_driver::prelude::*;
use sql_pool_driver::{CommandKind, QueryResultBuilder};

/// Counters shared between a test and the connections its mock backend opened.
#[derive(Debug, Default)]
pub struct MockStats {
    pub loads: AtomicUsize,
    pub connects: AtomicUsize,
    pub pings: AtomicUsize,
    pub open: AtomicUsize,
    pub peak_open: AtomicUsize,
    pub failing_connects: AtomicUsize,
}

impl MockStats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn peak_open(&self) -> usize {
        self.peak_open.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

pub struct MockConnection {
    pub serial: usize,
    broken: AtomicBool,
    stats: Arc<MockStats>,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.stats.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-process backend: every statement echoes back which connection ran it.
///
/// `BREAK` marks the connection broken; `FAIL ...` returns a query error. The affected-row
/// count reported to the driver is the number of bindings.
pub struct MockBackend {
    stats: Arc<MockStats>,
    connect_delay: Duration,
}

#[async_trait]
impl Backend for MockBackend {
    type Connection = MockConnection;

    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self) -> Result<MockConnection, DriverError> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        let remaining_failures = self.stats.failing_connects.load(Ordering::SeqCst);
        if remaining_failures > 0 {
            self.stats.failing_connects.fetch_sub(1, Ordering::SeqCst);
            return Err(DriverError::acquisition("mock: connection refused"));
        }
        let serial = self.stats.connects.fetch_add(1, Ordering::SeqCst) + 1;
        let open = self.stats.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak_open.fetch_max(open, Ordering::SeqCst);
        Ok(MockConnection {
            serial,
            broken: AtomicBool::new(false),
            stats: Arc::clone(&self.stats),
        })
    }

    async fn ping(&self, _conn: &mut MockConnection) -> Result<(), DriverError> {
        self.stats.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn execute(
        &self,
        conn: &mut MockConnection,
        query: &CompiledQuery,
    ) -> Result<QueryResult, DriverError> {
        if query.sql == "BREAK" {
            conn.broken.store(true, Ordering::SeqCst);
            return Ok(QueryResult::default());
        }
        if query.sql.starts_with("FAIL") {
            return Err(DriverError::execution(format!("mock: {}", query.sql)));
        }
        let kind = CommandKind::classify(&query.sql);
        let mut builder = QueryResultBuilder::new(vec!["serial".into(), "sql".into()], 1);
        builder.push_row(vec![
            RowValues::Int(i64::try_from(conn.serial).unwrap()),
            RowValues::Text(query.sql.clone()),
        ]);
        Ok(builder.finish(kind, Some(query.bindings.len() as u64), None))
    }

    fn is_broken(&self, conn: &MockConnection) -> bool {
        conn.broken.load(Ordering::SeqCst)
    }
}

pub fn mock_driver(pool: PoolConfig) -> (Driver, Arc<MockStats>) {
    mock_driver_with_delay(pool, Duration::ZERO)
}

pub fn mock_driver_with_delay(
    pool: PoolConfig,
    connect_delay: Duration,
) -> (Driver, Arc<MockStats>) {
    let stats = Arc::new(MockStats::default());
    let loader_stats = Arc::clone(&stats);
    let config = DriverConfig::sqlite("mock.db").with_pool(pool);
    let driver = Driver::with_loader(
        config,
        move |_config: &DriverConfig| -> Result<LoadedBackend, DriverError> {
            loader_stats.loads.fetch_add(1, Ordering::SeqCst);
            Ok(LoadedBackend::new(MockBackend {
                stats: Arc::clone(&loader_stats),
                connect_delay,
            }))
        },
    );
    (driver, stats)
}

/// Pool settings with short timeouts so failing tests fail fast.
pub fn fast_pool(max_connections: usize) -> PoolConfig {
    PoolConfig::default()
        .with_max_connections(max_connections)
        .with_connection_timeout(Duration::from_millis(500))
        .with_idle_timeout(Duration::ZERO)
}

/// Hook that counts its invocations.
pub fn counting_hook(pool: PoolConfig, calls: Arc<AtomicUsize>) -> PoolConfig {
    pool.on_create_connection(move |_conn| {
        let calls = Arc::clone(&calls);
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<(), DriverError>(())
        })
    })
}

pub fn serial_of(result: &QueryResult) -> i64 {
    *result.rows()[0].get("serial").unwrap().as_int().unwrap()
}
