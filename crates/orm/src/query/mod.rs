//! Query Builder Module - fluent SQL builder over a [`ConnectionInterface`]
//!
//! [`ConnectionInterface`]: crate::connection::ConnectionInterface

pub mod builder;
pub mod dml;
pub mod execution;
pub mod joins;
pub mod ordering;
pub mod pagination;
pub mod sql_generation;
pub mod types;
pub mod where_clause;

pub use builder::QueryBuilder;
pub use types::{Boolean, JoinType, OrderDirection, QueryOperator, SelectColumn, WhereClause};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, ConnectionConfig, ConnectionInterface};
    use crate::error::ModelError;
    use crate::value::Value;
    use std::sync::Arc;

    fn conn(driver: &str) -> Arc<dyn ConnectionInterface> {
        let config = ConnectionConfig::new(driver, "shop");
        Arc::new(Connection::new("test", config).unwrap())
    }

    fn table(driver: &str, name: &str) -> QueryBuilder {
        QueryBuilder::table(conn(driver), name)
    }

    #[test]
    fn test_select_with_wheres_and_bindings_in_order() {
        let (sql, bindings) = table("mysql", "orders")
            .select(&["id", "total"])
            .where_("status", "paid")
            .where_between("total", 10, 100)
            .or_where_in("customer_id", vec![1, 2])
            .order_by("id", "desc")
            .limit(5)
            .offset(10)
            .to_sql_with_bindings()
            .unwrap();

        assert_eq!(
            sql,
            "SELECT `id`, `total` FROM `orders` WHERE `status` = ? AND `total` BETWEEN ? AND ? \
             OR `customer_id` IN (?, ?) ORDER BY `id` DESC LIMIT 5 OFFSET 10"
        );
        assert_eq!(
            bindings,
            vec![Value::from("paid"), Value::Int(10), Value::Int(100), Value::Int(1), Value::Int(2)]
        );
    }

    #[test]
    fn test_postgres_placeholders_number_across_raw_and_nested() {
        let (sql, bindings) = table("pgsql", "products")
            .where_("active", true)
            .where_nested(|q| q.where_op("price", ">", 5).or_where_raw("stock > ?", vec![Value::Int(0)]))
            .having_raw("COUNT(*) > ?", vec![Value::Int(1)])
            .group_by(&["category_id"])
            .to_sql_with_bindings()
            .unwrap();

        assert_eq!(
            sql,
            "SELECT * FROM \"products\" WHERE \"active\" = $1 AND (\"price\" > $2 OR stock > $3) \
             GROUP BY \"category_id\" HAVING COUNT(*) > $4"
        );
        assert_eq!(bindings.len(), 4);
    }

    #[test]
    fn test_empty_in_lists() {
        let sql = table("sqlite", "users").where_in("id", Vec::<i64>::new()).to_sql().unwrap();
        assert_eq!(sql, "SELECT * FROM \"users\" WHERE 0 = 1");

        let sql = table("sqlite", "users").where_not_in("id", Vec::<i64>::new()).to_sql().unwrap();
        assert_eq!(sql, "SELECT * FROM \"users\" WHERE 1 = 1");
    }

    #[test]
    fn test_null_comparisons_become_is_null() {
        let sql = table("sqlite", "users")
            .where_("deleted_at", Value::Null)
            .where_op("email", "<>", Value::Null)
            .to_sql()
            .unwrap();
        assert_eq!(sql, "SELECT * FROM \"users\" WHERE \"deleted_at\" IS NULL AND \"email\" IS NOT NULL");
    }

    #[test]
    fn test_offset_without_limit() {
        assert_eq!(table("sqlite", "t").offset(3).to_sql().unwrap(), "SELECT * FROM \"t\" LIMIT -1 OFFSET 3");
        assert_eq!(table("pgsql", "t").offset(3).to_sql().unwrap(), "SELECT * FROM \"t\" OFFSET 3");
        assert_eq!(
            table("mysql", "t").skip(3).to_sql().unwrap(),
            "SELECT * FROM `t` LIMIT 18446744073709551615 OFFSET 3"
        );
    }

    #[test]
    fn test_joins_and_aliases() {
        let sql = table("mysql", "orders as o")
            .select(&["o.*", "c.name as customer"])
            .left_join("customers as c", "c.id", "=", "o.customer_id")
            .to_sql()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT `o`.*, `c`.`name` AS `customer` FROM `orders` AS `o` \
             LEFT JOIN `customers` AS `c` ON `c`.`id` = `o`.`customer_id`"
        );
    }

    #[test]
    fn test_invalid_identifiers_and_operators_are_rejected() {
        let err = table("mysql", "users").where_("id; DROP TABLE users", 1).to_sql().unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));

        let err = table("mysql", "users").order_by("name", "sideways").to_sql().unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));

        let err = table("mysql", "users").where_op("id", "= 1 OR", 1).to_sql().unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));

        let err = table("mysql", "users where 1=1").to_sql().unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));
    }

    #[test]
    fn test_compile_dml() {
        let builder = table("pgsql", "users").where_("id", 7);
        let (sql, bindings) = builder
            .compile_update(&[("name".to_string(), types::Assignment::Set(Value::from("Ann")))])
            .unwrap();
        assert_eq!(sql, "UPDATE \"users\" SET \"name\" = $1 WHERE \"id\" = $2");
        assert_eq!(bindings, vec![Value::from("Ann"), Value::Int(7)]);

        let (sql, _) = builder.compile_delete().unwrap();
        assert_eq!(sql, "DELETE FROM \"users\" WHERE \"id\" = $1");

        let (sql, _) = table("pgsql", "users")
            .compile_insert(&[vec![("name".to_string(), Value::from("Ann"))]], Some("id"))
            .unwrap();
        assert_eq!(sql, "INSERT INTO \"users\" (\"name\") VALUES ($1) RETURNING \"id\"");

        let (sql, _) = table("mysql", "users").compile_insert(&[Vec::new()], Some("id")).unwrap();
        assert_eq!(sql, "INSERT INTO `users` () VALUES ()");
    }

    #[test]
    fn test_aggregate_compilation() {
        let (sql, _) = table("sqlite", "orders")
            .where_("status", "paid")
            .order_by("id", "asc")
            .limit(10)
            .compile_aggregate("COUNT", "*")
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) AS aggregate FROM \"orders\" WHERE \"status\" = ?");

        let (sql, _) = table("sqlite", "orders")
            .group_by(&["customer_id"])
            .compile_aggregate("COUNT", "*")
            .unwrap();
        assert_eq!(
            sql,
            "SELECT COUNT(*) AS aggregate FROM (SELECT \"customer_id\" FROM \"orders\" GROUP BY \"customer_id\") AS \"aggregate_table\""
        );
    }

    #[test]
    fn test_grouped_aggregate_over_a_column() {
        let (sql, bindings) = table("sqlite", "order_items")
            .group_by(&["order_id"])
            .having("order_id", ">", 1)
            .compile_aggregate("SUM", "quantity")
            .unwrap();
        assert_eq!(
            sql,
            "SELECT SUM(\"aggregate_value\") AS aggregate FROM (SELECT \"order_id\", SUM(\"quantity\") AS \"aggregate_value\" \
             FROM \"order_items\" GROUP BY \"order_id\" HAVING \"order_id\" > ?) AS \"aggregate_table\""
        );
        assert_eq!(bindings, vec![Value::Int(1)]);
    }

    #[test]
    fn test_placeholders_match_bindings_with_having() {
        let build = |driver: &str| {
            table(driver, "order_items")
                .select(&["order_id"])
                .where_("product_id", 3)
                .where_in("order_id", vec![1, 2, 5])
                .where_between("quantity", 2, 10)
                .group_by(&["order_id"])
                .having("order_id", ">", 1)
                .to_sql_with_bindings()
                .unwrap()
        };
        let expected = vec![
            Value::Int(3),
            Value::Int(1),
            Value::Int(2),
            Value::Int(5),
            Value::Int(2),
            Value::Int(10),
            Value::Int(1),
        ];

        let (sql, bindings) = build("mysql");
        assert_eq!(
            sql,
            "SELECT `order_id` FROM `order_items` WHERE `product_id` = ? AND `order_id` IN (?, ?, ?) \
             AND `quantity` BETWEEN ? AND ? GROUP BY `order_id` HAVING `order_id` > ?"
        );
        assert_eq!(sql.matches('?').count(), bindings.len());
        assert_eq!(bindings, expected);

        let (sql, bindings) = build("pgsql");
        assert!(sql.ends_with("HAVING \"order_id\" > $7"));
        assert!(!sql.contains("$8"));
        assert_eq!(bindings, expected);
    }

    #[test]
    fn test_for_page_saturates_on_huge_pages() {
        let sql = table("pgsql", "orders").for_page(u64::MAX, 20).to_sql().unwrap();
        assert_eq!(sql, format!("SELECT * FROM \"orders\" LIMIT 20 OFFSET {}", u64::MAX));

        let sql = table("pgsql", "orders").for_page(3, 20).to_sql().unwrap();
        assert_eq!(sql, "SELECT * FROM \"orders\" LIMIT 20 OFFSET 40");
    }

    #[test]
    fn test_raw_binding_count_mismatch() {
        let err = table("sqlite", "t").where_raw("a = ? AND b = ?", vec![Value::Int(1)]).to_sql().unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));
    }
}
