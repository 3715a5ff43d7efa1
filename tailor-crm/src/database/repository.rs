//! SQLite implementation of [`DataStore`]
//!
//! Backs the local mode of the application and the test suite.

use super::models::*;
use super::DataStore;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataStore for Repository {
    async fn list_shops(&self) -> Result<Vec<Shop>> {
        let shops = sqlx::query_as::<_, Shop>("SELECT * FROM shops ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(shops)
    }

    async fn get_shop(&self, id: &str) -> Result<Shop> {
        sqlx::query_as::<_, Shop>("SELECT * FROM shops WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Shop", id))
    }

    async fn insert_shop(&self, name: &str) -> Result<Shop> {
        let id = Uuid::new_v4().to_string();

        let shop = sqlx::query_as::<_, Shop>(
            r#"
            INSERT INTO shops (id, name, created_at)
            VALUES (?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created shop: {}", id);
        Ok(shop)
    }

    async fn update_shop(&self, id: &str, name: &str) -> Result<Shop> {
        let rows = sqlx::query("UPDATE shops SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Shop", id));
        }

        tracing::debug!("Renamed shop: {}", id);
        self.get_shop(id).await
    }

    async fn delete_shop(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM shops WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Shop", id));
        }

        tracing::debug!("Deleted shop: {}", id);
        Ok(())
    }

    async fn list_customers(&self, shop_id: Option<&str>) -> Result<Vec<Customer>> {
        let customers = match shop_id {
            Some(shop_id) => {
                sqlx::query_as::<_, Customer>(
                    "SELECT * FROM customers WHERE shop_id = ? ORDER BY name ASC",
                )
                .bind(shop_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Customer>("SELECT * FROM customers ORDER BY name ASC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(customers)
    }

    async fn get_customer(&self, id: &str) -> Result<Customer> {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Customer", id))
    }

    async fn insert_customer(&self, req: &CreateCustomerRequest) -> Result<Customer> {
        let id = Uuid::new_v4().to_string();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (id, shop_id, name, address, phone, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&req.shop_id)
        .bind(&req.name)
        .bind(&req.address)
        .bind(&req.phone)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created customer: {} for shop: {}", id, req.shop_id);
        Ok(customer)
    }

    async fn update_customer(&self, id: &str, req: &UpdateCustomerRequest) -> Result<Customer> {
        let rows = sqlx::query("UPDATE customers SET name = ?, address = ?, phone = ? WHERE id = ?")
            .bind(&req.name)
            .bind(&req.address)
            .bind(&req.phone)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Customer", id));
        }

        tracing::debug!("Updated customer: {}", id);
        self.get_customer(id).await
    }

    async fn delete_customer(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM customers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Customer", id));
        }

        tracing::debug!("Deleted customer: {}", id);
        Ok(())
    }

    async fn list_bills(&self, query: &BillQuery) -> Result<Vec<Bill>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM bills WHERE 1 = 1");

        if let Some(shop_id) = &query.shop_id {
            builder.push(" AND shop_id = ").push_bind(shop_id.clone());
        }

        builder.push(" ORDER BY is_completed ASC, created_at DESC");

        let bills = builder
            .build_query_as::<Bill>()
            .fetch_all(&self.pool)
            .await?;

        Ok(bills)
    }

    async fn get_bill(&self, id: &str) -> Result<Bill> {
        sqlx::query_as::<_, Bill>("SELECT * FROM bills WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Bill", id))
    }

    async fn insert_bill(&self, req: &CreateBillRequest) -> Result<Bill> {
        let id = Uuid::new_v4().to_string();

        let bill = sqlx::query_as::<_, Bill>(
            r#"
            INSERT INTO bills (
                id, shop_id, customer_id, stitching_amount, balance_amount,
                status, image_url, is_completed, completion_reason, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, NULL, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&req.shop_id)
        .bind(&req.customer_id)
        .bind(req.stitching_amount)
        .bind(req.balance_amount)
        .bind(req.status)
        .bind(&req.image_url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created bill: {} for customer: {}", id, req.customer_id);
        Ok(bill)
    }

    async fn update_bill(&self, id: &str, patch: &BillPatch) -> Result<Bill> {
        if patch.is_empty() {
            return self.get_bill(id).await;
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE bills SET ");
        {
            let mut fields = builder.separated(", ");
            if let Some(amount) = patch.stitching_amount {
                fields.push("stitching_amount = ").push_bind_unseparated(amount);
            }
            if let Some(amount) = patch.balance_amount {
                fields.push("balance_amount = ").push_bind_unseparated(amount);
            }
            if let Some(status) = patch.status {
                fields.push("status = ").push_bind_unseparated(status);
            }
            if let Some(image_url) = &patch.image_url {
                fields.push("image_url = ").push_bind_unseparated(image_url.clone());
            }
            if let Some(completed) = patch.is_completed {
                fields.push("is_completed = ").push_bind_unseparated(completed);
            }
            if let Some(reason) = &patch.completion_reason {
                fields
                    .push("completion_reason = ")
                    .push_bind_unseparated(reason.clone());
            }
        }
        builder.push(" WHERE id = ").push_bind(id.to_string());

        let rows = builder
            .build()
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Bill", id));
        }

        tracing::debug!("Updated bill: {}", id);
        self.get_bill(id).await
    }

    async fn delete_bill(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM bills WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Bill", id));
        }

        tracing::debug!("Deleted bill: {}", id);
        Ok(())
    }

    async fn list_photo_refs(&self) -> Result<Vec<String>> {
        let refs: Vec<String> =
            sqlx::query_scalar("SELECT image_url FROM bills WHERE image_url IS NOT NULL")
                .fetch_all(&self.pool)
                .await?;

        Ok(refs)
    }
}
