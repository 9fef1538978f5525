mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{attrs, setup, Customer};
use emporium_orm::{
    transaction, transaction_default, ConnectionConfig, ConnectionInterface, ConnectionPool, ModelContext, ModelError,
    ModelQueries, PoolError, TransactionConfig, Value,
};

#[tokio::test]
async fn test_transaction_commits_on_success() {
    let db = setup().await;
    let ctx = db.ctx.clone();

    let id = transaction_default(&db.conn, |tx| {
        let ctx = ctx.with_connection(tx);
        async move {
            let customer = Customer::create(&ctx, attrs(vec![("name", "Ann".into())])).await?;
            Ok(customer.key())
        }
    })
    .await
    .unwrap();

    assert!(!db.conn.in_transaction());
    assert!(Customer::find(&db.ctx, id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_transaction_rolls_back_on_error() {
    let db = setup().await;
    let ctx = db.ctx.clone();

    let result: Result<(), ModelError> = transaction_default(&db.conn, |tx| {
        let ctx = ctx.with_connection(tx);
        async move {
            Customer::create(&ctx, attrs(vec![("name", "Ann".into())])).await?;
            Err(ModelError::Validation("card declined".to_string()))
        }
    })
    .await;

    assert_eq!(result, Err(ModelError::Validation("card declined".to_string())));
    assert!(!db.conn.in_transaction());
    assert_eq!(Customer::query(&db.ctx).unwrap().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_commit_rolls_back_and_frees_the_connection() {
    let db = setup().await;
    db.conn.unprepared("PRAGMA foreign_keys = ON").await.unwrap();
    db.conn
        .unprepared(
            "CREATE TABLE refunds (
                 id INTEGER PRIMARY KEY,
                 order_id INTEGER REFERENCES orders(id) DEFERRABLE INITIALLY DEFERRED
             )",
        )
        .await
        .unwrap();

    let result: Result<(), ModelError> = transaction_default(&db.conn, |tx| async move {
        tx.execute("INSERT INTO refunds (order_id) VALUES (?)", &[Value::Int(404)]).await?;
        Ok(())
    })
    .await;

    assert!(matches!(result, Err(ModelError::Transaction(_))));
    assert!(!db.conn.in_transaction());
    let rows = db.conn.query("SELECT COUNT(*) AS n FROM refunds", &[]).await.unwrap();
    assert_eq!(rows.first().and_then(|r| r.get("n")).and_then(Value::as_i64), Some(0));

    assert!(db.conn.begin_transaction().await.unwrap());
    db.conn.rollback().await.unwrap();
}

#[tokio::test]
async fn test_nested_transaction_joins_the_outer_one() {
    let db = setup().await;
    let ctx = db.ctx.clone();

    let result: Result<(), ModelError> = transaction_default(&db.conn, |tx| {
        let ctx = ctx.with_connection(tx.clone());
        async move {
            transaction_default(&tx, |inner| {
                let ctx = ctx.with_connection(inner);
                async move {
                    Customer::create(&ctx, attrs(vec![("name", "Ann".into())])).await?;
                    Ok(())
                }
            })
            .await?;
            Err(ModelError::Query("outer failure".to_string()))
        }
    })
    .await;

    assert!(result.is_err());
    // the inner scope did not commit on its own
    assert_eq!(Customer::query(&db.ctx).unwrap().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_retries_stop_on_ordinary_errors() {
    let db = setup().await;
    let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));

    let counter = attempts.clone();
    let result: Result<(), ModelError> = transaction(&db.conn, TransactionConfig::default().with_attempts(3), |_tx| {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        async { Err(ModelError::Validation("bad input".to_string())) }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
}

fn pool_config(path: &str) -> ConnectionConfig {
    ConnectionConfig::sqlite(path).with_pool(2).with_acquire_timeout_ms(200)
}

#[tokio::test]
async fn test_pool_serves_concurrent_saves() {
    let db = setup().await;
    let pool: Arc<dyn ConnectionInterface> = Arc::new(ConnectionPool::new("pool", pool_config(&db.path)).unwrap());
    let ctx = ModelContext::new(pool.clone());

    let (first, second) = tokio::join!(
        Customer::create(&ctx, attrs(vec![("name", "Ann".into())])),
        Customer::create(&ctx, attrs(vec![("name", "Bob".into())])),
    );
    let mut keys = vec![first.unwrap().key(), second.unwrap().key()];
    keys.sort_by_key(|k| k.as_i64());
    assert_eq!(keys, vec![1.into(), 2.into()]);

    assert_eq!(Customer::query(&db.ctx).unwrap().count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_exhausted_pool_times_out_until_a_lease_returns() {
    let db = setup().await;
    let pool = ConnectionPool::new("pool", pool_config(&db.path)).unwrap();

    let first = pool.acquire().await.unwrap();
    let _second = pool.acquire().await.unwrap();
    assert_eq!(pool.stats().active_connections, 2);

    let started = std::time::Instant::now();
    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, PoolError::ConnectionTimeout { timeout_ms: 200 }));
    assert!(started.elapsed() >= Duration::from_millis(200));

    drop(first);
    let third = pool.acquire().await.unwrap();
    assert!(third.query("SELECT 1 AS one", &[]).await.is_ok());

    let stats = pool.stats();
    assert_eq!(stats.acquire_errors, 1);
    assert_eq!(stats.total_connections, 2);
}

#[tokio::test]
async fn test_waiting_caller_gets_the_released_connection() {
    let db = setup().await;
    let pool = ConnectionPool::new("pool", pool_config(&db.path).with_acquire_timeout_ms(2_000)).unwrap();

    let first = pool.acquire().await.unwrap();
    let _second = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(first);

    assert!(waiter.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_pool_refuses_transactions_outside_a_lease() {
    let db = setup().await;
    let pool = ConnectionPool::new("pool", pool_config(&db.path)).unwrap();
    assert!(matches!(pool.begin_transaction().await, Err(ModelError::Transaction(_))));

    // transaction() leases a connection for the whole scope
    let pool: Arc<dyn ConnectionInterface> = Arc::new(pool);
    let ctx = db.ctx.clone();
    transaction_default(&pool, |tx| {
        let ctx = ctx.with_connection(tx);
        async move {
            Customer::create(&ctx, attrs(vec![("name", "Ann".into())])).await?;
            Ok(())
        }
    })
    .await
    .unwrap();
    assert_eq!(Customer::query(&db.ctx).unwrap().count().await.unwrap(), 1);
}
