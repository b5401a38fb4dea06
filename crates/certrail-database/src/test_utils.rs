//! Test utilities for database integration tests
//!
//! Each `TestDatabase` is a private in-memory SQLite database with the
//! certrail schema applied, so tests never share rows.

use crate::DbConnection;
use certrail_migrations::Migrator;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseBackend, Statement};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;

/// Test database setup
pub struct TestDatabase {
    pub db: Arc<DbConnection>,
}

impl TestDatabase {
    /// Create an empty in-memory database without running migrations
    pub async fn new() -> anyhow::Result<Self> {
        // A single connection keeps every query on the same in-memory database
        let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
        opt.max_connections(1).min_connections(1).sqlx_logging(false);

        let db = Database::connect(opt).await?;
        let test_db = TestDatabase { db: Arc::new(db) };

        test_db
            .test_connection()
            .await
            .map_err(|e| anyhow::anyhow!("Initial connection test failed: {}", e))?;

        Ok(test_db)
    }

    /// Create a test database and run migrations
    pub async fn with_migrations() -> anyhow::Result<Self> {
        let test_db = Self::new().await?;

        Migrator::up(test_db.db.as_ref(), None)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

        Ok(test_db)
    }

    async fn test_connection(&self) -> anyhow::Result<()> {
        self.db
            .query_one(Statement::from_string(
                DatabaseBackend::Sqlite,
                "SELECT 1".to_owned(),
            ))
            .await?;
        Ok(())
    }
}
