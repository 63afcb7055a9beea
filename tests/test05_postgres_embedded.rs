#![cfg(feature = "test-utils")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sql_pool_driver::prelude::*;
use sql_pool_driver::test_utils::{setup_postgres_embedded, stop_postgres_embedded};

#[tokio::test]
async fn embedded_postgres_round_trip() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let calls = Arc::new(AtomicUsize::new(0));
    let hook_calls = Arc::clone(&calls);
    let pool = PoolConfig::default()
        .with_max_connections(2)
        .on_create_connection(move |conn| {
            let calls = Arc::clone(&hook_calls);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                conn.execute_query(&CompiledQuery::new_without_params("SET TIME ZONE 'UTC'"))
                    .await?;
                Ok(())
            })
        });
    let postgres = setup_postgres_embedded("driver_test", PoolConfig::default()).await?;

    let driver = Driver::new(postgres.config.clone().with_pool(pool));
    driver.init().await?;

    let mut conn = driver.acquire().await?;
    conn.execute_query(&CompiledQuery::new_without_params(
        "CREATE TABLE IF NOT EXISTS item (id BIGSERIAL PRIMARY KEY, name TEXT NOT NULL, qty INT4, price FLOAT4, meta JSONB)",
    ))
    .await?;

    for (name, qty) in [("bolt", 10), ("nut", 20), ("gear", 3)] {
        let inserted = conn
            .execute_query(&CompiledQuery::new(
                "INSERT INTO item (name, qty, price, meta) VALUES ($1, $2, $3, $4)",
                vec![
                    RowValues::Text(name.into()),
                    RowValues::Int(qty),
                    RowValues::Float(1.5),
                    RowValues::JSON(serde_json::json!({ "bin": name })),
                ],
            ))
            .await?;
        assert_eq!(inserted.num_updated_or_deleted_rows(), None);
    }

    let updated = conn
        .execute_query(&CompiledQuery::new(
            "UPDATE item SET qty = qty + 1 WHERE qty > $1",
            vec![RowValues::Int(5)],
        ))
        .await?;
    assert_eq!(updated.num_updated_or_deleted_rows(), Some(2));

    let selected = conn
        .execute_query(&CompiledQuery::new(
            "SELECT name, qty, price, meta FROM item WHERE qty > $1 ORDER BY qty",
            vec![RowValues::Int(0)],
        ))
        .await?;
    assert_eq!(selected.num_updated_or_deleted_rows(), None);
    assert_eq!(selected.len(), 3);
    assert_eq!(selected.rows()[0].get("name"), Some(&RowValues::Text("gear".into())));
    assert_eq!(selected.rows()[2].get("qty"), Some(&RowValues::Int(21)));
    assert_eq!(selected.rows()[0].get("price"), Some(&RowValues::Float(1.5)));

    let repriced = conn
        .execute_query(&CompiledQuery::new(
            "UPDATE item SET price = $1 WHERE name = $2",
            vec![RowValues::Int(2), RowValues::Text("gear".into())],
        ))
        .await?;
    assert_eq!(repriced.num_updated_or_deleted_rows(), Some(1));
    let price = conn
        .execute_query(&CompiledQuery::new(
            "SELECT price FROM item WHERE name = $1",
            vec![RowValues::Text("gear".into())],
        ))
        .await?;
    assert_eq!(price.rows()[0].get("price"), Some(&RowValues::Float(2.0)));

    let err = conn
        .execute_query(&CompiledQuery::new(
            "UPDATE item SET name = $1 WHERE qty > 0",
            vec![RowValues::Bool(true)],
        ))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryExecution);

    let err = conn
        .execute_query(&CompiledQuery::new_without_params("SELECT * FROM missing_table"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryExecution);
    assert!(err.to_string().contains("42P01"));

    let wrapper = Arc::clone(conn.connection());
    driver.release(conn)?;
    let conn = driver.acquire().await?;
    assert!(Arc::ptr_eq(&wrapper, conn.connection()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    driver.release(conn)?;

    driver.destroy().await;
    stop_postgres_embedded(postgres).await;
    Ok(())
}
