//! Database module
//!
//! This module provides the relational side of the data access layer:
//! - Model definitions for shops, customers and bills
//! - The [`DataStore`] trait every component talks to
//! - A SQLite implementation ([`Repository`]) with schema migrations

pub mod models;
pub mod repository;
pub mod schema;

pub use models::*;
pub use repository::Repository;
pub use schema::initialize_database;

use crate::error::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Create/read/update/delete access to the three collections.
///
/// Implementations own ordering: shops and customers by name, bills by
/// completion flag ascending then creation time descending. Operations on
/// an id the store no longer has fail with `AppError::NotFound`.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn list_shops(&self) -> Result<Vec<Shop>>;
    async fn get_shop(&self, id: &str) -> Result<Shop>;
    async fn insert_shop(&self, name: &str) -> Result<Shop>;
    async fn update_shop(&self, id: &str, name: &str) -> Result<Shop>;
    async fn delete_shop(&self, id: &str) -> Result<()>;

    /// Customers of one shop, or of every shop when `shop_id` is `None`
    async fn list_customers(&self, shop_id: Option<&str>) -> Result<Vec<Customer>>;
    async fn get_customer(&self, id: &str) -> Result<Customer>;
    async fn insert_customer(&self, req: &CreateCustomerRequest) -> Result<Customer>;
    async fn update_customer(&self, id: &str, req: &UpdateCustomerRequest) -> Result<Customer>;
    async fn delete_customer(&self, id: &str) -> Result<()>;

    async fn list_bills(&self, query: &BillQuery) -> Result<Vec<Bill>>;
    async fn get_bill(&self, id: &str) -> Result<Bill>;
    async fn insert_bill(&self, req: &CreateBillRequest) -> Result<Bill>;
    async fn update_bill(&self, id: &str, patch: &BillPatch) -> Result<Bill>;
    async fn delete_bill(&self, id: &str) -> Result<()>;

    /// Every non-null `image_url` currently held by a bill
    async fn list_photo_refs(&self) -> Result<Vec<String>>;
}

/// Build connection options shared by migration and application connections.
///
/// `foreign_keys` is per connection in SQLite. Deleting a shop cascades to
/// its customers and bills only on connections that have it on.
fn connect_options(db_path: &Path) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display())).map(
        |opts| {
            opts.create_if_missing(true)
                .busy_timeout(Duration::from_secs(5))
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
        },
    )
}

/// Create and initialize a database connection pool.
///
/// Migrations run on a dedicated single-connection pool that is closed
/// before the application pool is created, so every pooled connection sees
/// the final shop/customer/bill schema.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Creating database connection pool at: {:?}", db_path);

    // The data directory may not exist yet on first run
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Phase 1: migrate on one connection. Every PRAGMA and every CREATE TABLE
    // runs on that same connection.
    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path)?)
        .await?;

    initialize_database(&migration_pool).await?;
    migration_pool.close().await;

    // Phase 2: the application pool. Its connections open after migrations
    // have committed.
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options(db_path)?)
        .await?;

    tracing::info!("Database pool created successfully");

    Ok(pool)
}
