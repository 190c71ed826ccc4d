//! Native SQLite Database Adapter
//!
//! Implements the `DatabaseAdapter` trait using `sqlx` with the native SQLite driver.
//! This implementation is used on native platforms (desktop, iOS, Android).
//!
//! ## Features
//!
//! - Connection pooling with configurable limits
//! - WAL mode for better concurrency
//! - Embedded migrations (`core-library/migrations`)
//! - Prepared statement caching
//! - Foreign key enforcement

use async_trait::async_trait;
use bridge_traits::database::{DatabaseAdapter, DatabaseConfig, QueryRow, QueryValue};
use bridge_traits::error::{BridgeError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Column, Pool, Row, Sqlite};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Native SQLite implementation of DatabaseAdapter
///
/// This adapter wraps a `sqlx::Pool<Sqlite>` and implements all database
/// operations using the native SQLite driver.
pub struct SqliteAdapter {
    pool: Pool<Sqlite>,
}

impl SqliteAdapter {
    /// Create a new SqliteAdapter with the given configuration
    ///
    /// This will establish the connection pool and configure SQLite options,
    /// but will NOT run migrations. Call `initialize()` to run migrations.
    ///
    /// # Arguments
    ///
    /// * `config` - Database configuration
    ///
    /// # Returns
    ///
    /// A new SqliteAdapter instance
    ///
    /// # Errors
    ///
    /// Returns error if connection pool creation fails
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        info!(
            database_url = %config.database_url,
            min_connections = config.min_connections,
            max_connections = config.max_connections,
            "Creating SQLite database adapter"
        );

        // Parse the database URL and configure SQLite options
        let mut connect_options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| BridgeError::DatabaseError(format!("Invalid database URL: {}", e)))?;

        // Configure SQLite connection options
        connect_options = connect_options
            .journal_mode(SqliteJournalMode::Wal)
            // NORMAL synchronous mode for good balance of safety and speed
            .synchronous(SqliteSynchronous::Normal)
            // Enable foreign key constraints
            .foreign_keys(true)
            // Create database if it doesn't exist
            .create_if_missing(true)
            // 16MB page cache; the schema is a single small table
            .pragma("cache_size", "-16000");

        // Apply statement caching if enabled
        if config.enable_cache {
            connect_options = connect_options.statement_cache_capacity(config.cache_capacity);
        }

        debug!("SQLite connection options configured");

        // Create the connection pool
        let pool = SqlitePoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(connect_options)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to create connection pool");
                BridgeError::DatabaseError(format!("Connection pool creation failed: {}", e))
            })?;

        info!(
            connections = pool.size(),
            "SQLite connection pool created successfully"
        );

        Ok(Self { pool })
    }

    /// Create a new SqliteAdapter from an existing pool
    ///
    /// This is useful when you already have a configured pool and want to
    /// wrap it in an adapter.
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool
    ///
    /// This allows direct access to the pool for advanced use cases.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Convert a sqlx Row to a QueryRow (HashMap)
    fn row_to_query_row(row: &sqlx::sqlite::SqliteRow) -> QueryRow {
        let mut result = HashMap::new();

        for column in row.columns() {
            let column_name = column.name().to_string();

            // Try to get the value as different types
            let value = if let Ok(v) = row.try_get::<Option<i64>, _>(column.ordinal()) {
                v.map(QueryValue::Integer).unwrap_or(QueryValue::Null)
            } else if let Ok(v) = row.try_get::<Option<f64>, _>(column.ordinal()) {
                v.map(QueryValue::Real).unwrap_or(QueryValue::Null)
            } else if let Ok(v) = row.try_get::<Option<String>, _>(column.ordinal()) {
                v.map(QueryValue::Text).unwrap_or(QueryValue::Null)
            } else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(column.ordinal()) {
                v.map(QueryValue::Blob).unwrap_or(QueryValue::Null)
            } else {
                QueryValue::Null
            };

            result.insert(column_name, value);
        }

        result
    }

    /// Convert QueryValue parameters to sqlx-compatible format
    fn bind_params<'q>(
        query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
        params: &'q [QueryValue],
    ) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        let mut query = query;
        for param in params {
            query = match param {
                QueryValue::Null => query.bind(None::<i64>),
                QueryValue::Integer(i) => query.bind(i),
                QueryValue::Real(r) => query.bind(r),
                QueryValue::Text(s) => query.bind(s.as_str()),
                QueryValue::Blob(b) => query.bind(b.as_slice()),
            };
        }
        query
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Migration failed");
                BridgeError::DatabaseError(format!("Migration failed: {}", e))
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
    async fn initialize(&mut self) -> Result<()> {
        debug!("Initializing database adapter");

        // Run migrations
        self.run_migrations().await?;

        // Perform health check
        self.health_check().await?;

        info!("Database adapter initialized successfully");
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        debug!("Performing database health check");

        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Database health check failed");
                BridgeError::DatabaseError(format!("Health check failed: {}", e))
            })?;

        debug!("Database health check passed");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        info!("Closing database connection pool");
        self.pool.close().await;
        Ok(())
    }

    async fn query(&self, query: &str, params: &[QueryValue]) -> Result<Vec<QueryRow>> {
        debug!(query = %query, param_count = params.len(), "Executing query");

        let sqlx_query = sqlx::query(query);
        let sqlx_query = Self::bind_params(sqlx_query, params);

        let rows = sqlx_query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Query failed: {}", e)))?;

        let result: Vec<QueryRow> = rows.iter().map(Self::row_to_query_row).collect();

        debug!(row_count = result.len(), "Query executed successfully");
        Ok(result)
    }

    async fn execute(&self, statement: &str, params: &[QueryValue]) -> Result<u64> {
        debug!(statement = %statement, param_count = params.len(), "Executing statement");

        let sqlx_query = sqlx::query(statement);
        let sqlx_query = Self::bind_params(sqlx_query, params);

        let result = sqlx_query
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Execute failed: {}", e)))?;

        let rows_affected = result.rows_affected();
        debug!(rows_affected, "Statement executed successfully");

        Ok(rows_affected)
    }

    async fn query_one_optional(
        &self,
        query: &str,
        params: &[QueryValue],
    ) -> Result<Option<QueryRow>> {
        debug!(query = %query, param_count = params.len(), "Executing query_one_optional");

        let sqlx_query = sqlx::query(query);
        let sqlx_query = Self::bind_params(sqlx_query, params);

        let row = sqlx_query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Query one optional failed: {}", e)))?;

        Ok(row.as_ref().map(Self::row_to_query_row))
    }

    async fn query_one(&self, query: &str, params: &[QueryValue]) -> Result<QueryRow> {
        debug!(query = %query, param_count = params.len(), "Executing query_one");

        let sqlx_query = sqlx::query(query);
        let sqlx_query = Self::bind_params(sqlx_query, params);

        let row = sqlx_query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Query one failed: {}", e)))?;

        Ok(Self::row_to_query_row(&row))
    }

    async fn get_schema_version(&self) -> Result<i64> {
        // Query the _sqlx_migrations table to get the latest version
        let query = "SELECT COALESCE(MAX(version), 0) as version FROM _sqlx_migrations";
        let row = self.query_one(query, &[]).await?;

        let version = row.get("version").and_then(|v| v.as_i64()).ok_or_else(|| {
            BridgeError::DatabaseError("Failed to get schema version".to_string())
        })?;

        Ok(version)
    }

}
