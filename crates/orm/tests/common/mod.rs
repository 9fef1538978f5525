//! Shared SQLite fixture for the integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use emporium_orm::{
    Connection, ConnectionConfig, ConnectionInterface, EventError, Model, ModelContext, ModelDefinition,
    ModelObserver, MorphMap, OrmResult, Relation, Value,
};
use tempfile::TempDir;

pub const SCHEMA: &[&str] = &[
    "CREATE TABLE customers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT,
        created_at TEXT,
        updated_at TEXT
    )",
    "CREATE TABLE orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id INTEGER,
        status TEXT NOT NULL DEFAULT 'pending',
        total REAL,
        created_at TEXT,
        updated_at TEXT,
        deleted_at TEXT
    )",
    "CREATE TABLE order_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL,
        product_id INTEGER NOT NULL,
        quantity INTEGER NOT NULL,
        created_at TEXT,
        updated_at TEXT
    )",
    "CREATE TABLE products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        price REAL,
        active BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT,
        updated_at TEXT
    )",
    "CREATE TABLE tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    )",
    "CREATE TABLE product_tag (
        product_id INTEGER NOT NULL,
        tag_id INTEGER NOT NULL,
        position INTEGER
    )",
    "CREATE TABLE comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        body TEXT NOT NULL,
        commentable_type TEXT,
        commentable_id INTEGER,
        created_at TEXT,
        updated_at TEXT
    )",
    "CREATE TABLE coupons (
        code TEXT PRIMARY KEY,
        percent INTEGER NOT NULL
    )",
    "CREATE TABLE sessions (
        id TEXT PRIMARY KEY,
        customer_id INTEGER,
        created_at TEXT,
        updated_at TEXT
    )",
];

pub struct Customer;

impl ModelDefinition for Customer {
    const CLASS: &'static str = "Customer";

    fn relation(parent: &Model, name: &str) -> Option<OrmResult<Relation>> {
        match name {
            "orders" => Some(parent.has_many::<Order>(None, None)),
            "latest_session" => Some(parent.has_one::<Session>(None, None)),
            _ => None,
        }
    }
}

pub struct Order;

impl ModelDefinition for Order {
    const CLASS: &'static str = "Order";

    fn casts() -> &'static [(&'static str, &'static str)] {
        &[("total", "decimal:2")]
    }

    fn soft_delete_column() -> Option<&'static str> {
        Some("deleted_at")
    }

    fn relation(parent: &Model, name: &str) -> Option<OrmResult<Relation>> {
        match name {
            "customer" => Some(parent.belongs_to::<Customer>("customer", None, None)),
            "items" => Some(parent.has_many::<OrderItem>(None, None)),
            "comments" => Some(parent.morph_many::<Comment>("commentable")),
            _ => None,
        }
    }
}

pub struct OrderItem;

impl ModelDefinition for OrderItem {
    const CLASS: &'static str = "OrderItem";

    fn relation(parent: &Model, name: &str) -> Option<OrmResult<Relation>> {
        match name {
            "product" => Some(parent.belongs_to::<Product>("product", None, None)),
            _ => None,
        }
    }
}

pub struct Product;

impl ModelDefinition for Product {
    const CLASS: &'static str = "Product";

    fn fillable() -> &'static [&'static str] {
        &["name", "price", "active"]
    }

    fn relation(parent: &Model, name: &str) -> Option<OrmResult<Relation>> {
        match name {
            "tags" => Some(parent.belongs_to_many_with_pivot::<Tag>(None, None, None, &["position"])),
            "comments" => Some(parent.morph_many::<Comment>("commentable")),
            "first_comment" => Some(parent.morph_one::<Comment>("commentable")),
            _ => None,
        }
    }
}

pub struct Tag;

impl ModelDefinition for Tag {
    const CLASS: &'static str = "Tag";

    fn timestamps() -> bool {
        false
    }

    fn relation(parent: &Model, name: &str) -> Option<OrmResult<Relation>> {
        match name {
            "products" => Some(parent.belongs_to_many::<Product>(None, None, None)),
            _ => None,
        }
    }
}

pub struct Comment;

impl ModelDefinition for Comment {
    const CLASS: &'static str = "Comment";

    fn relation(parent: &Model, name: &str) -> Option<OrmResult<Relation>> {
        match name {
            "commentable" => Some(parent.morph_to("commentable")),
            _ => None,
        }
    }
}

/// String key supplied by the caller
pub struct Coupon;

impl ModelDefinition for Coupon {
    const CLASS: &'static str = "Coupon";

    fn primary_key() -> &'static str {
        "code"
    }

    fn key_type() -> emporium_orm::KeyType {
        emporium_orm::KeyType::String
    }

    fn incrementing() -> bool {
        false
    }

    fn timestamps() -> bool {
        false
    }
}

/// UUID key generated on insert
pub struct Session;

impl ModelDefinition for Session {
    const CLASS: &'static str = "Session";

    fn key_type() -> emporium_orm::KeyType {
        emporium_orm::KeyType::Uuid
    }

    fn incrementing() -> bool {
        false
    }
}

pub struct TestDb {
    pub dir: TempDir,
    pub path: String,
    pub conn: Arc<dyn ConnectionInterface>,
    pub ctx: ModelContext,
}

impl TestDb {
    /// Statements recorded since the last call
    pub fn take_log(&self) -> Vec<String> {
        self.conn.flush_query_log().into_iter().map(|entry| entry.sql).collect()
    }
}

pub async fn create_schema(conn: &Arc<dyn ConnectionInterface>) {
    for statement in SCHEMA {
        conn.execute(statement, &[]).await.expect("schema statement");
    }
}

pub fn morph_map() -> MorphMap {
    MorphMap::new().register::<Order>().register::<Product>()
}

/// Fresh database file with the schema applied and the query log enabled
pub async fn setup() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("shop.db").to_string_lossy().into_owned();
    let conn: Arc<dyn ConnectionInterface> =
        Arc::new(Connection::new("sqlite", ConnectionConfig::sqlite(path.clone())).expect("connection"));
    create_schema(&conn).await;
    conn.enable_query_log();
    conn.flush_query_log();

    let ctx = ModelContext::new(conn.clone()).with_morph_map(morph_map());
    TestDb { dir, path, conn, ctx }
}

/// Records every event it sees as `"{class}.{event}"`
#[derive(Default, Clone)]
pub struct EventTracker {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl EventTracker {
    pub fn seen(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, model: &Model, event: &str) {
        self.events.lock().unwrap().push(format!("{}.{}", model.class(), event));
    }
}

#[async_trait]
impl ModelObserver for EventTracker {
    async fn saving(&self, model: &mut Model) -> Result<(), EventError> {
        self.push(model, "saving");
        Ok(())
    }

    async fn saved(&self, model: &Model) -> Result<(), EventError> {
        self.push(model, "saved");
        Ok(())
    }

    async fn creating(&self, model: &mut Model) -> Result<(), EventError> {
        self.push(model, "creating");
        Ok(())
    }

    async fn created(&self, model: &Model) -> Result<(), EventError> {
        self.push(model, "created");
        Ok(())
    }

    async fn updating(&self, model: &mut Model) -> Result<(), EventError> {
        self.push(model, "updating");
        Ok(())
    }

    async fn updated(&self, model: &Model) -> Result<(), EventError> {
        self.push(model, "updated");
        Ok(())
    }

    async fn deleting(&self, model: &mut Model) -> Result<(), EventError> {
        self.push(model, "deleting");
        Ok(())
    }

    async fn deleted(&self, model: &Model) -> Result<(), EventError> {
        self.push(model, "deleted");
        Ok(())
    }

    async fn restoring(&self, model: &mut Model) -> Result<(), EventError> {
        self.push(model, "restoring");
        Ok(())
    }

    async fn restored(&self, model: &Model) -> Result<(), EventError> {
        self.push(model, "restored");
        Ok(())
    }
}

pub fn attrs(pairs: Vec<(&str, Value)>) -> Vec<(String, Value)> {
    emporium_orm::attributes(pairs)
}
