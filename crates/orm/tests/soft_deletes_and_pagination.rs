mod common;

use std::sync::Arc;

use common::{attrs, setup, Customer, EventTracker, Order};
use emporium_orm::{ModelError, ModelQueries, Value};

#[tokio::test]
async fn test_soft_delete_hides_row_until_restored() {
    let db = setup().await;
    let tracker = EventTracker::default();
    db.ctx.events().observe("Order", Arc::new(tracker.clone()));

    let mut order = Order::create(&db.ctx, attrs(vec![("status", "paid".into())])).await.unwrap();
    let id = order.key();

    assert_eq!(order.delete().await.unwrap(), Some(true));
    assert!(order.trashed());
    assert!(order.exists());
    assert!(order.is_clean(None));

    assert!(Order::find(&db.ctx, id.clone()).await.unwrap().is_none());
    assert!(Order::query(&db.ctx).unwrap().with_trashed().find(id.clone()).await.unwrap().is_some());
    assert_eq!(Order::query(&db.ctx).unwrap().only_trashed().count().await.unwrap(), 1);

    // the row is still in the table
    let raw = db.conn.query("SELECT deleted_at FROM orders WHERE id = ?", &[id.clone()]).await.unwrap();
    assert!(!raw.first().unwrap().get("deleted_at").unwrap().is_null());

    assert!(order.restore().await.unwrap());
    assert!(!order.trashed());
    assert!(Order::find(&db.ctx, id).await.unwrap().is_some());

    let seen = tracker.seen();
    let tail: Vec<&str> = seen.iter().skip(4).map(String::as_str).collect();
    assert_eq!(
        tail,
        vec![
            "Order.deleting",
            "Order.saving",
            "Order.updating",
            "Order.updated",
            "Order.saved",
            "Order.deleted",
            "Order.restoring",
            "Order.saving",
            "Order.updating",
            "Order.updated",
            "Order.saved",
            "Order.restored",
        ]
    );
}

#[tokio::test]
async fn test_soft_delete_writes_pending_changes() {
    let db = setup().await;
    let mut order = Order::create(&db.ctx, attrs(vec![("status", "pending".into())])).await.unwrap();
    let id = order.key();

    order.set_attribute("status", "cancelled");
    assert_eq!(order.delete().await.unwrap(), Some(true));
    assert!(order.is_clean(None));

    let stored = Order::query(&db.ctx).unwrap().with_trashed().find(id).await.unwrap().unwrap();
    assert_eq!(stored.get_attribute("status"), Value::from("cancelled"));
    assert!(stored.trashed());
}

#[tokio::test]
async fn test_force_delete_removes_the_row() {
    let db = setup().await;
    let mut order = Order::create(&db.ctx, attrs(vec![("status", "paid".into())])).await.unwrap();
    let id = order.key();

    assert_eq!(order.force_delete().await.unwrap(), Some(true));
    assert!(!order.exists());
    assert!(Order::query(&db.ctx).unwrap().with_trashed().find(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_builder_soft_delete_and_restore() {
    let db = setup().await;
    for status in ["paid", "paid", "pending"] {
        Order::create(&db.ctx, attrs(vec![("status", status.into())])).await.unwrap();
    }

    let trashed = Order::query(&db.ctx).unwrap().where_("status", "paid").delete().await.unwrap();
    assert_eq!(trashed, 2);
    assert_eq!(Order::query(&db.ctx).unwrap().count().await.unwrap(), 1);
    assert_eq!(Order::query(&db.ctx).unwrap().with_trashed().count().await.unwrap(), 3);

    let restored = Order::query(&db.ctx).unwrap().restore().await.unwrap();
    assert_eq!(restored, 2);
    assert_eq!(Order::query(&db.ctx).unwrap().count().await.unwrap(), 3);

    let removed = Order::query(&db.ctx).unwrap().where_("status", "pending").force_delete().await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(Order::query(&db.ctx).unwrap().with_trashed().count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_restore_requires_soft_deletes() {
    let db = setup().await;
    let mut customer = Customer::create(&db.ctx, attrs(vec![("name", "Ann".into())])).await.unwrap();
    assert!(matches!(customer.restore().await, Err(ModelError::Validation(_))));
    assert!(matches!(
        Customer::query(&db.ctx).unwrap().restore().await,
        Err(ModelError::Validation(_))
    ));
}

async fn seed_customers(count: i64) -> common::TestDb {
    let db = setup().await;
    let rows: Vec<Vec<(String, Value)>> = (1..=count)
        .map(|i| vec![("name".to_string(), Value::from(format!("customer {}", i)))])
        .collect();
    Customer::query(&db.ctx)
        .unwrap()
        .query()
        .insert_many(rows)
        .await
        .unwrap();
    db
}

#[tokio::test]
async fn test_pagination_over_95_rows() {
    let db = seed_customers(95).await;
    let query = Customer::query(&db.ctx).unwrap().oldest("id");

    let page = query.paginate(20, 1).await.unwrap();
    assert_eq!(page.total(), 95);
    assert_eq!(page.last_page(), 5);
    assert_eq!(page.items().len(), 20);
    assert_eq!(page.items()[0].key(), Value::Int(1));
    assert_eq!(page.items()[19].key(), Value::Int(20));
    assert!(page.has_more_pages());

    let last = query.paginate(20, 5).await.unwrap();
    assert_eq!(last.items().len(), 15);
    assert_eq!(last.items()[0].key(), Value::Int(81));
    assert_eq!(last.items()[14].key(), Value::Int(95));
    assert_eq!((last.from(), last.to()), (Some(81), Some(95)));
    assert!(!last.has_more_pages());

    let beyond = query.paginate(20, 6).await.unwrap();
    assert!(beyond.items().is_empty());
    assert_eq!(beyond.total(), 95);
    assert_eq!(beyond.from(), None);
}

#[tokio::test]
async fn test_paginator_json_shape() {
    let db = seed_customers(45).await;
    let page = Customer::query(&db.ctx)
        .unwrap()
        .oldest("id")
        .paginate(20, 2)
        .await
        .unwrap()
        .with_path("/customers");

    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["current_page"], 2);
    assert_eq!(json["last_page"], 3);
    assert_eq!(json["total"], 45);
    assert_eq!(json["data"].as_array().unwrap().len(), 20);
    assert_eq!(json["data"][0]["name"], "customer 21");
    assert_eq!(json["next_page_url"], "/customers?page=3");
    assert_eq!(json["prev_page_url"], "/customers?page=1");
}

#[tokio::test]
async fn test_chunk_walks_every_row_once() {
    let db = seed_customers(23).await;

    let seen = std::sync::Mutex::new(Vec::new());
    Customer::query(&db.ctx)
        .unwrap()
        .chunk(10, |batch| {
            seen.lock().unwrap().push(batch.len());
            async { Ok(true) }
        })
        .await
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![10, 10, 3]);
}
