mod common;

use common::{fast_pool, mock_driver};
use sql_pool_driver::backend::missing_dependency;
use sql_pool_driver::prelude::*;

#[tokio::test]
async fn destroy_before_init_is_a_noop() {
    let (driver, stats) = mock_driver(fast_pool(2));
    driver.destroy().await;
    driver.destroy().await;
    assert_eq!(driver.state(), LifecycleState::Uninitialized);
    assert_eq!(stats.loads(), 0);

    // still usable afterwards
    driver.init().await.unwrap();
    assert!(driver.is_initialized());
}

#[tokio::test]
async fn destroy_twice_is_a_noop() {
    let (driver, _stats) = mock_driver(fast_pool(2));
    driver.init().await.unwrap();
    driver.destroy().await;
    driver.destroy().await;
    assert_eq!(driver.state(), LifecycleState::Destroyed);
}

#[tokio::test]
async fn init_twice_is_invalid_state_and_builds_one_pool() {
    let (driver, stats) = mock_driver(fast_pool(2));
    driver.init().await.unwrap();
    let err = driver.init().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(stats.loads(), 1);
    assert!(driver.is_initialized());
}

#[tokio::test]
async fn init_after_destroy_is_invalid_state() {
    let (driver, stats) = mock_driver(fast_pool(2));
    driver.init().await.unwrap();
    driver.destroy().await;
    let err = driver.init().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(stats.loads(), 1);
}

#[tokio::test]
async fn acquire_outside_lifecycle_window_is_invalid_state() {
    let (driver, _stats) = mock_driver(fast_pool(2));
    let err = driver.acquire().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    driver.init().await.unwrap();
    let conn = driver.acquire().await.unwrap();
    driver.release(conn).unwrap();

    driver.destroy().await;
    let err = driver.acquire().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(driver.status().unwrap_err().kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn missing_backend_fails_init_with_actionable_message() {
    let config = DriverConfig::postgres("localhost", "app").with_user("app");
    let driver = Driver::with_loader(
        config,
        |config: &DriverConfig| -> Result<LoadedBackend, DriverError> {
            Err(missing_dependency(config.database_type))
        },
    );

    let err = driver.init().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingDependency);
    assert!(err.to_string().contains("tokio-postgres"));
    assert!(err.to_string().contains("`postgres` feature"));
    assert_eq!(driver.state(), LifecycleState::Uninitialized);
}

#[tokio::test]
async fn invalid_pool_config_fails_init() {
    let (driver, stats) = mock_driver(fast_pool(0));
    let err = driver.init().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(stats.loads(), 0);
}

#[test]
fn default_port_per_backend() {
    let pg = Driver::new(DriverConfig::postgres("localhost", "app").with_user("app"));
    assert_eq!(pg.default_port(), Some(5432));
    let lite = Driver::new(DriverConfig::sqlite("app.db"));
    assert_eq!(lite.default_port(), None);
}

#[tokio::test]
async fn affected_rows_only_for_update_and_delete() {
    let (driver, _stats) = mock_driver(fast_pool(1));
    driver.init().await.unwrap();
    let mut conn = driver.acquire().await.unwrap();

    let update = conn
        .execute_query(&CompiledQuery::new(
            "UPDATE t SET a = $1 WHERE b = $2",
            vec![RowValues::Int(1), RowValues::Int(2)],
        ))
        .await
        .unwrap();
    assert_eq!(update.num_updated_or_deleted_rows(), Some(2));

    let delete = conn
        .execute_query(&CompiledQuery::new(
            "WITH old AS (SELECT id FROM t) DELETE FROM t WHERE id IN (SELECT id FROM old) AND a = $1",
            vec![RowValues::Int(1)],
        ))
        .await
        .unwrap();
    assert_eq!(delete.num_updated_or_deleted_rows(), Some(1));

    let select = conn
        .execute_query(&CompiledQuery::new(
            "SELECT * FROM t WHERE a = $1",
            vec![RowValues::Int(1)],
        ))
        .await
        .unwrap();
    assert_eq!(select.num_updated_or_deleted_rows(), None);
    assert_eq!(select.len(), 1);
    assert_eq!(
        select.rows()[0].get("sql").and_then(RowValues::as_text),
        Some("SELECT * FROM t WHERE a = $1")
    );

    driver.release(conn).unwrap();
    driver.destroy().await;
}

#[tokio::test]
async fn query_errors_surface_as_execution_errors() {
    let (driver, _stats) = mock_driver(fast_pool(1));
    driver.init().await.unwrap();
    let mut conn = driver.acquire().await.unwrap();
    let err = conn
        .execute_query(&CompiledQuery::new_without_params("FAIL syntax"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryExecution);
    assert!(err.to_string().contains("FAIL syntax"));

    // the connection stays usable after a failed statement
    conn.execute_query(&CompiledQuery::new_without_params("SELECT 1"))
        .await
        .unwrap();
    driver.release(conn).unwrap();
}
