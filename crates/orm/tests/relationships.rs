mod common;

use common::{attrs, setup, Comment, Customer, Order, OrderItem, Product, Tag, TestDb};
use emporium_orm::{Model, ModelError, ModelQueries, Related, Value};

/// Three customers: Ann with two orders, Bob with one, Cy with none
async fn seed_orders(db: &TestDb) {
    for name in ["Ann", "Bob", "Cy"] {
        Customer::create(&db.ctx, attrs(vec![("name", name.into())])).await.unwrap();
    }
    for (customer, total) in [(1, 10.0), (1, 25.5), (2, 7.25)] {
        Order::create(&db.ctx, attrs(vec![("customer_id", customer.into()), ("total", total.into())]))
            .await
            .unwrap();
    }
    Product::create(&db.ctx, attrs(vec![("name", "Lamp".into()), ("price", 20.into())]))
        .await
        .unwrap();
    for (order, quantity) in [(1, 1), (1, 2), (2, 5)] {
        OrderItem::create(
            &db.ctx,
            attrs(vec![("order_id", order.into()), ("product_id", 1.into()), ("quantity", quantity.into())]),
        )
        .await
        .unwrap();
    }
    db.take_log();
}

fn order_ids(customer: &Model) -> Vec<Value> {
    customer
        .get_relation("orders")
        .map(|r| r.models().iter().map(|m| m.key()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_eager_loading_issues_one_query_per_relation() {
    let db = setup().await;
    seed_orders(&db).await;

    let customers = Customer::with(&db.ctx, &["orders"]).unwrap().get().await.unwrap();

    let log = db.take_log();
    assert_eq!(log.len(), 2, "{:#?}", log);
    assert!(log[1].contains("\"orders\".\"customer_id\" IN (?, ?, ?)"));

    assert_eq!(customers.len(), 3);
    assert_eq!(order_ids(&customers.all()[0]), vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(order_ids(&customers.all()[1]), vec![Value::Int(3)]);
    // loaded, and empty
    assert!(customers.all()[2].relation_loaded("orders"));
    assert!(order_ids(&customers.all()[2]).is_empty());
}

#[tokio::test]
async fn test_eager_and_lazy_loading_agree() {
    let db = setup().await;
    seed_orders(&db).await;

    let eager = Customer::with(&db.ctx, &["orders"]).unwrap().get().await.unwrap();
    let mut lazy = Customer::all(&db.ctx).await.unwrap();

    for (eager, lazy) in eager.iter().zip(lazy.iter_mut()) {
        assert!(!lazy.relation_loaded("orders"));
        let lazy_ids: Vec<Value> = lazy.related("orders").await.unwrap().models().iter().map(|m| m.key()).collect();
        assert_eq!(order_ids(eager), lazy_ids);
    }
}

#[tokio::test]
async fn test_nested_eager_loading() {
    let db = setup().await;
    seed_orders(&db).await;

    let customers = Customer::with(&db.ctx, &["orders.items.product"]).unwrap().get().await.unwrap();
    assert_eq!(db.take_log().len(), 4);

    let ann = &customers.all()[0];
    let orders = ann.get_relation("orders").unwrap().as_collection().unwrap();
    let items = orders.all()[0].get_relation("items").unwrap();
    assert_eq!(items.len(), 2);
    let product = items.models()[0].get_relation("product").and_then(Related::as_model).unwrap();
    assert_eq!(product.get_attribute("name"), Value::from("Lamp"));
}

#[tokio::test]
async fn test_constrained_eager_load() {
    let db = setup().await;
    seed_orders(&db).await;

    let customers = Customer::query(&db.ctx)
        .unwrap()
        .with_constraint("orders", |q| q.where_op("total", ">", 20))
        .get()
        .await
        .unwrap();
    assert_eq!(order_ids(&customers.all()[0]), vec![Value::Int(2)]);
    assert!(order_ids(&customers.all()[1]).is_empty());
}

#[tokio::test]
async fn test_belongs_to_and_has_one() {
    let db = setup().await;
    seed_orders(&db).await;

    let orders = Order::with(&db.ctx, &["customer"]).unwrap().get().await.unwrap();
    let owners: Vec<Value> = orders
        .iter()
        .map(|o| o.get_relation("customer").and_then(Related::as_model).unwrap().get_attribute("name"))
        .collect();
    assert_eq!(owners, vec![Value::from("Ann"), Value::from("Ann"), Value::from("Bob")]);

    let mut cy = Customer::find_or_fail(&db.ctx, 3).await.unwrap();
    assert!(matches!(cy.related("latest_session").await.unwrap(), Related::Empty));
}

#[tokio::test]
async fn test_unknown_relation_in_with_fails() {
    let db = setup().await;
    seed_orders(&db).await;

    let err = Customer::with(&db.ctx, &["invoices"]).unwrap().get().await.unwrap_err();
    assert!(matches!(err, ModelError::RelationshipContract(msg) if msg.contains("[invoices]")));
}

#[tokio::test]
async fn test_many_to_many_attach_sync_detach() {
    let db = setup().await;
    let product = Product::create(&db.ctx, attrs(vec![("name", "Lamp".into())])).await.unwrap();
    for name in ["new", "sale", "eco"] {
        Tag::create(&db.ctx, attrs(vec![("name", name.into())])).await.unwrap();
    }

    let tags = product.relation("tags").unwrap();
    let attached = tags
        .attach(vec![1, 2], attrs(vec![("position", 1.into())]))
        .await
        .unwrap();
    assert_eq!(attached, 2);

    let mut loaded = Product::with(&db.ctx, &["tags"]).unwrap().first_or_fail().await.unwrap();
    let names: Vec<Value> = loaded
        .get_relation("tags")
        .unwrap()
        .models()
        .iter()
        .map(|t| t.get_attribute("name"))
        .collect();
    assert_eq!(names, vec![Value::from("new"), Value::from("sale")]);
    let first = &loaded.get_relation("tags").unwrap().models()[0].clone();
    let pivot = first.pivot().unwrap();
    assert_eq!(pivot.get("product_id"), Some(&Value::Int(1)));
    assert_eq!(pivot.get("position"), Some(&Value::Int(1)));
    assert!(!first.has_attribute("pivot_position"));

    let changes = tags.sync(vec![2, 3]).await.unwrap();
    assert_eq!(changes.attached, vec![Value::Int(3)]);
    assert_eq!(changes.detached, vec![Value::Int(1)]);

    loaded.unset_relation("tags");
    let ids: Vec<Value> = loaded.related("tags").await.unwrap().models().iter().map(|t| t.key()).collect();
    assert_eq!(ids, vec![Value::Int(2), Value::Int(3)]);

    assert_eq!(tags.detach(None).await.unwrap(), 2);
    assert!(tags.get().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_polymorphic_relations() {
    let db = setup().await;
    seed_orders(&db).await;

    for (body, kind, id) in [("late", "Order", 1), ("great lamp", "Product", 1), ("gift wrap", "Order", 1)] {
        Comment::create(
            &db.ctx,
            attrs(vec![
                ("body", body.into()),
                ("commentable_type", kind.into()),
                ("commentable_id", id.into()),
            ]),
        )
        .await
        .unwrap();
    }
    db.take_log();

    let mut order = Order::find_or_fail(&db.ctx, 1).await.unwrap();
    assert_eq!(order.related("comments").await.unwrap().len(), 2);

    let mut lamp = Product::find_or_fail(&db.ctx, 1).await.unwrap();
    let first = lamp.related("first_comment").await.unwrap().as_model().unwrap().clone();
    assert_eq!(first.get_attribute("body"), Value::from("great lamp"));

    db.take_log();
    let comments = Comment::with(&db.ctx, &["commentable"]).unwrap().get().await.unwrap();
    // comments, then one query per owner type
    assert_eq!(db.take_log().len(), 3);
    let owners: Vec<&str> = comments
        .iter()
        .map(|c| c.get_relation("commentable").and_then(Related::as_model).unwrap().class())
        .collect();
    assert_eq!(owners, vec!["Order", "Product", "Order"]);
}

#[tokio::test]
async fn test_collection_load_after_the_fact() {
    let db = setup().await;
    seed_orders(&db).await;

    let mut customers = Customer::all(&db.ctx).await.unwrap();
    db.take_log();
    customers.load(&["orders"]).await.unwrap();
    assert_eq!(db.take_log().len(), 1);
    assert_eq!(order_ids(&customers.all()[1]), vec![Value::Int(3)]);

    let json = customers.to_json();
    assert_eq!(json[0]["orders"][1]["total"], serde_json::json!(25.5));
}
