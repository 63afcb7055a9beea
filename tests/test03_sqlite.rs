#![cfg(feature = "sqlite")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sql_pool_driver::prelude::*;
use tempfile::TempDir;

fn sqlite_config(dir: &TempDir, pool: PoolConfig) -> DriverConfig {
    let path = dir.path().join("driver.db");
    DriverConfig::sqlite(path.to_string_lossy()).with_pool(pool)
}

async fn create_schema(driver: &Driver) {
    let mut conn = driver.acquire().await.unwrap();
    conn.execute_query(&CompiledQuery::new_without_params(
        "CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE, score REAL, active INTEGER, seen TEXT)",
    ))
    .await
    .unwrap();
    driver.release(conn).unwrap();
}

#[tokio::test]
async fn sqlite_insert_update_select_delete() {
    let dir = TempDir::new().unwrap();
    let driver = Driver::new(sqlite_config(&dir, PoolConfig::default().with_max_connections(2)));
    driver.init().await.unwrap();
    create_schema(&driver).await;

    let mut conn = driver.acquire().await.unwrap();
    let seen = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(3, 4, 5)
        .unwrap();
    for (name, score) in [("ada", 9.5), ("bob", 7.0), ("cy", 3.25)] {
        let inserted = conn
            .execute_query(&CompiledQuery::new(
                "INSERT INTO person (name, score, active, seen) VALUES (?1, ?2, ?3, ?4)",
                vec![
                    RowValues::Text(name.into()),
                    RowValues::Float(score),
                    RowValues::Bool(true),
                    RowValues::Timestamp(seen),
                ],
            ))
            .await
            .unwrap();
        assert!(matches!(inserted.inserted_primary_key(), Some(RowValues::Int(_))));
        assert_eq!(inserted.num_updated_or_deleted_rows(), None);
    }

    let updated = conn
        .execute_query(&CompiledQuery::new(
            "UPDATE person SET active = ?1 WHERE score < ?2",
            vec![RowValues::Bool(false), RowValues::Float(8.0)],
        ))
        .await
        .unwrap();
    assert_eq!(updated.num_updated_or_deleted_rows(), Some(2));

    let selected = conn
        .execute_query(&CompiledQuery::new(
            "SELECT name, active, seen FROM person WHERE score > ?1 ORDER BY score DESC",
            vec![RowValues::Float(1.0)],
        ))
        .await
        .unwrap();
    assert_eq!(selected.num_updated_or_deleted_rows(), None);
    let names: Vec<&str> = selected
        .rows()
        .iter()
        .filter_map(|row| row.get("name").and_then(RowValues::as_text))
        .collect();
    assert_eq!(names, ["ada", "bob", "cy"]);
    assert_eq!(selected.rows()[0].get("active").and_then(RowValues::as_bool), Some(&true));
    assert_eq!(selected.rows()[0].get("seen").and_then(RowValues::as_timestamp), Some(seen));

    let deleted = conn
        .execute_query(&CompiledQuery::new(
            "DELETE FROM person WHERE name = ?1",
            vec![RowValues::Text("cy".into())],
        ))
        .await
        .unwrap();
    assert_eq!(deleted.num_updated_or_deleted_rows(), Some(1));

    driver.release(conn).unwrap();
    driver.destroy().await;
}

#[tokio::test]
async fn sqlite_constraint_violation_is_execution_error() {
    let dir = TempDir::new().unwrap();
    let driver = Driver::new(sqlite_config(&dir, PoolConfig::default()));
    driver.init().await.unwrap();
    create_schema(&driver).await;

    let mut conn = driver.acquire().await.unwrap();
    let insert = CompiledQuery::new(
        "INSERT INTO person (name) VALUES (?1)",
        vec![RowValues::Text("dup".into())],
    );
    conn.execute_query(&insert).await.unwrap();
    let err = conn.execute_query(&insert).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryExecution);
    assert!(err.to_string().contains("UNIQUE constraint failed"));

    let err = conn
        .execute_query(&CompiledQuery::new_without_params("SELEC nonsense"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryExecution);

    driver.release(conn).unwrap();
    driver.destroy().await;
}

#[tokio::test]
async fn sqlite_hook_runs_once_per_physical_connection() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let hook_calls = Arc::clone(&calls);
    let pool = PoolConfig::default()
        .with_max_connections(1)
        .on_create_connection(move |conn| {
            let calls = Arc::clone(&hook_calls);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                conn.execute_query(&CompiledQuery::new_without_params("PRAGMA foreign_keys = ON"))
                    .await?;
                Ok(())
            })
        });
    let driver = Driver::new(sqlite_config(&dir, pool));
    driver.init().await.unwrap();

    for _ in 0..3 {
        let mut conn = driver.acquire().await.unwrap();
        let result = conn
            .execute_query(&CompiledQuery::new_without_params("PRAGMA foreign_keys"))
            .await
            .unwrap();
        assert_eq!(result.rows()[0].get_by_index(0), Some(&RowValues::Int(1)));
        driver.release(conn).unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    driver.destroy().await;
}

#[tokio::test]
async fn sqlite_connections_share_the_file() {
    let dir = TempDir::new().unwrap();
    let driver = Driver::new(sqlite_config(
        &dir,
        PoolConfig::default()
            .with_max_connections(2)
            .with_connection_timeout(Duration::from_secs(5)),
    ));
    driver.init().await.unwrap();
    create_schema(&driver).await;

    let mut writer = driver.acquire().await.unwrap();
    let mut reader = driver.acquire().await.unwrap();
    assert_ne!(writer.id(), reader.id());

    writer
        .execute_query(&CompiledQuery::new(
            "INSERT INTO person (name) VALUES (?1)",
            vec![RowValues::Text("eve".into())],
        ))
        .await
        .unwrap();
    let rows = reader
        .execute_query(&CompiledQuery::new_without_params("SELECT count(*) AS n FROM person"))
        .await
        .unwrap();
    assert_eq!(rows.rows()[0].get("n"), Some(&RowValues::Int(1)));

    driver.release(writer).unwrap();
    driver.release(reader).unwrap();
    let status = driver.status().unwrap();
    assert_eq!(status.size, 2);
    assert_eq!(status.idle, 2);
    driver.destroy().await;
}
