//! Database schema and migrations
//!
//! This module handles database initialization and schema migrations.
//! Uses SQLite with WAL mode and enforced foreign keys so that deleting a
//! shop or customer cascades the same way the hosted backend does.

use crate::error::Result;
use sqlx::{sqlite::SqlitePool, Row};

/// Initialize database with schema
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Initializing database schema");

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    // Cascading deletes depend on this
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current_version: i32 = sqlx::query("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?
        .get(0);

    tracing::info!("Current database version: {}", current_version);

    let applied = apply_migrations(pool, current_version).await?;

    tracing::info!(
        "Database initialization complete ({} migrations applied)",
        applied
    );
    Ok(())
}

/// Apply every migration newer than `current_version`, each in its own
/// transaction. Returns how many were applied.
async fn apply_migrations(pool: &SqlitePool, current_version: i32) -> Result<usize> {
    let mut applied = 0;

    for (version, sql) in get_migrations() {
        if version <= current_version {
            continue;
        }

        tracing::info!("Applying migration version {}", version);

        let mut tx = pool.begin().await?;

        // Migration files hold plain DDL; no statement contains a `;` of its own
        for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query("INSERT INTO migrations (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        applied += 1;

        tracing::info!("Migration version {} applied successfully", version);
    }

    Ok(applied)
}

fn get_migrations() -> Vec<(i32, &'static str)> {
    vec![(1, include_str!("migrations/001_initial_schema.sql"))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_database() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();

        let version: i32 = sqlx::query_scalar("SELECT MAX(version) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(version, 1);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('shops', 'customers', 'bills') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, vec!["bills", "customers", "shops"]);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();
        initialize_database(&pool).await.unwrap();
        assert_eq!(apply_migrations(&pool, 1).await.unwrap(), 0);

        let count: i32 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();

        let foreign_keys: i32 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(foreign_keys, 1);
    }
}
