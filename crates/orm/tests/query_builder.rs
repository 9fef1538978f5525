mod common;

use common::{setup, TestDb};
use emporium_orm::{ModelError, QueryBuilder, Value};

async fn seed_items(db: &TestDb) -> QueryBuilder {
    let items = QueryBuilder::table(db.conn.clone(), "order_items");
    let rows = [(1, 1, 2), (1, 2, 5), (2, 1, 1), (3, 3, 8), (3, 2, 4)]
        .into_iter()
        .map(|(order, product, quantity)| {
            vec![
                ("order_id".to_string(), Value::from(order)),
                ("product_id".to_string(), Value::from(product)),
                ("quantity".to_string(), Value::from(quantity)),
            ]
        })
        .collect();
    items.insert_many(rows).await.unwrap();
    db.take_log();
    items
}

#[tokio::test]
async fn test_bindings_follow_placeholder_order() {
    let db = setup().await;
    let items = seed_items(&db).await;

    let query = items
        .clone()
        .select(&["id"])
        .where_op("quantity", ">", 1)
        .where_nested(|q| q.where_("order_id", 3).or_where_in("product_id", vec![1]))
        .where_not_in("id", vec![2])
        .order_by("id", "asc");

    let (sql, bindings) = query.to_sql_with_bindings().unwrap();
    assert_eq!(
        sql,
        "SELECT \"id\" FROM \"order_items\" WHERE \"quantity\" > ? AND (\"order_id\" = ? OR \"product_id\" IN (?)) \
         AND \"id\" NOT IN (?) ORDER BY \"id\" ASC"
    );
    assert_eq!(bindings, vec![Value::Int(1), Value::Int(3), Value::Int(1), Value::Int(2)]);

    let ids = query.pluck("id").await.unwrap();
    assert_eq!(ids, vec![Value::Int(1), Value::Int(4), Value::Int(5)]);
}

#[tokio::test]
async fn test_empty_where_in_matches_nothing() {
    let db = setup().await;
    let items = seed_items(&db).await;

    let none = items.clone().where_in("id", Vec::<i64>::new());
    assert!(none.to_sql().unwrap().contains("0 = 1"));
    assert!(none.get().await.unwrap().is_empty());
    assert_eq!(none.count("*").await.unwrap(), 0);

    let all = items.clone().where_not_in("id", Vec::<i64>::new());
    assert_eq!(all.count("*").await.unwrap(), 5);
}

#[tokio::test]
async fn test_identifiers_are_validated_before_execution() {
    let db = setup().await;
    let items = seed_items(&db).await;

    let injected = items.clone().where_("quantity; DROP TABLE order_items; --", 1);
    assert!(matches!(injected.get().await, Err(ModelError::Validation(_))));

    let bad_order = items.clone().order_by("id desc, (SELECT 1)", "asc");
    assert!(matches!(bad_order.to_sql(), Err(ModelError::Validation(_))));

    let bad_operator = items.clone().where_op("quantity", "<> 0 OR 1 =", 1);
    assert!(matches!(bad_operator.to_sql(), Err(ModelError::Validation(_))));

    // values travel as bindings, so hostile text is just data
    let hostile = items.clone().where_("quantity", "1 OR 1 = 1");
    assert!(hostile.get().await.unwrap().is_empty());

    assert!(db.take_log().iter().all(|sql| !sql.contains("DROP")));
    assert_eq!(items.count("*").await.unwrap(), 5);
}

#[tokio::test]
async fn test_aggregates_and_helpers() {
    let db = setup().await;
    let items = seed_items(&db).await;

    assert_eq!(items.count("*").await.unwrap(), 5);
    assert_eq!(items.sum("quantity").await.unwrap(), Value::Int(20));
    assert_eq!(items.max("quantity").await.unwrap(), Value::Int(8));
    assert_eq!(items.min("quantity").await.unwrap(), Value::Int(1));
    assert_eq!(items.avg("quantity").await.unwrap(), Some(4.0));
    assert!(items.clone().where_("order_id", 99).sum("quantity").await.unwrap().is_null());

    assert!(items.clone().where_("order_id", 2).exists().await.unwrap());
    assert!(items.clone().where_("order_id", 99).doesnt_exist().await.unwrap());

    let per_order = items
        .clone()
        .select(&["order_id"])
        .group_by(&["order_id"])
        .having("order_id", ">", 1)
        .pluck("order_id")
        .await
        .unwrap();
    assert_eq!(per_order, vec![Value::Int(2), Value::Int(3)]);
}

#[tokio::test]
async fn test_grouped_aggregates_run_over_groups() {
    let db = setup().await;
    let items = seed_items(&db).await;
    let per_order = items.clone().group_by(&["order_id"]);

    assert_eq!(per_order.count("*").await.unwrap(), 3);
    assert_eq!(per_order.sum("quantity").await.unwrap(), Value::Int(20));
    assert_eq!(per_order.max("quantity").await.unwrap(), Value::Int(8));
    assert_eq!(per_order.min("quantity").await.unwrap(), Value::Int(1));

    let later_orders = per_order.clone().having("order_id", ">", 1);
    assert_eq!(later_orders.sum("quantity").await.unwrap(), Value::Int(13));
    assert_eq!(later_orders.count("*").await.unwrap(), 2);
}

#[tokio::test]
async fn test_placeholders_line_up_with_filters_and_having() {
    let db = setup().await;
    let items = seed_items(&db).await;

    let query = items
        .clone()
        .select(&["order_id"])
        .where_op("quantity", ">", 0)
        .where_in("product_id", vec![1, 2, 3])
        .where_between("quantity", 2, 8)
        .group_by(&["order_id"])
        .having("order_id", "<", 3);

    let (sql, bindings) = query.to_sql_with_bindings().unwrap();
    assert_eq!(sql.matches('?').count(), bindings.len());
    assert_eq!(
        bindings,
        vec![Value::Int(0), Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(2), Value::Int(8), Value::Int(3)]
    );

    assert_eq!(query.pluck("order_id").await.unwrap(), vec![Value::Int(1)]);
}

#[tokio::test]
async fn test_update_increment_and_delete() {
    let db = setup().await;
    let items = seed_items(&db).await;

    let bumped = items.clone().where_("order_id", 1).increment("quantity", 10).await.unwrap();
    assert_eq!(bumped, 2);
    assert_eq!(items.clone().where_("order_id", 1).sum("quantity").await.unwrap(), Value::Int(27));

    items.clone().where_("id", 3).decrement("quantity", 1).await.unwrap();
    assert_eq!(items.clone().where_("id", 3).value("quantity").await.unwrap(), Value::Int(0));

    let updated = items.clone().where_("product_id", 2).update([("quantity", 9)]).await.unwrap();
    assert_eq!(updated, 2);

    let removed = items.clone().where_op("quantity", ">=", 9).delete().await.unwrap();
    assert_eq!(removed, 3);
    assert_eq!(items.count("*").await.unwrap(), 2);
}

#[tokio::test]
async fn test_joins_are_rejected_in_update() {
    let db = setup().await;
    let items = seed_items(&db).await;

    let joined = items
        .clone()
        .join("products", "products.id", "=", "order_items.product_id")
        .where_("products.name", "Lamp");
    assert!(matches!(joined.update([("quantity", 0)]).await, Err(ModelError::Validation(_))));
    assert!(matches!(joined.delete().await, Err(ModelError::Validation(_))));
}

#[tokio::test]
async fn test_insert_get_id_and_first() {
    let db = setup().await;
    let products = QueryBuilder::table(db.conn.clone(), "products");

    let id = products
        .insert_get_id([("name", Value::from("Lamp")), ("price", Value::from(19.5))], "id")
        .await
        .unwrap();
    assert_eq!(id, Some(1));

    let row = products.find("id", 1).await.unwrap().unwrap();
    assert_eq!(row.get("name"), Some(&Value::from("Lamp")));
    assert_eq!(row.get("active"), Some(&Value::Bool(true)));
}
