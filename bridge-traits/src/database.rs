//! Database Abstraction Layer
//!
//! Vault entry metadata lives in a relational store reached through
//! [`DatabaseAdapter`], so repositories stay independent of the SQL driver.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::database::{DatabaseAdapter, DatabaseConfig};
//!
//! let mut adapter = SqliteAdapter::new(DatabaseConfig::new(path)).await?;
//! adapter.initialize().await?;
//! let rows = adapter.query("SELECT * FROM vault_entries", &[]).await?;
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration for cross-platform initialization
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file path or connection string
    pub database_url: String,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,

    /// Enable statement caching
    pub enable_cache: bool,

    /// Statement cache capacity
    pub cache_capacity: usize,
}

impl DatabaseConfig {
    /// Create a new database configuration with the given file path
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        let database_url = format!("sqlite:{}", path.display());

        Self {
            database_url,
            min_connections: 1,
            max_connections: 5,
            acquire_timeout_secs: 30,
            enable_cache: true,
            cache_capacity: 100,
        }
    }

    /// Create a configuration for an in-memory database
    ///
    /// Every SQLite connection to `:memory:` opens its own database, so the
    /// pool is pinned to a single connection.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            min_connections: 1,
            max_connections: 1,
            acquire_timeout_secs: 30,
            enable_cache: true,
            cache_capacity: 100,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

// =============================================================================
// Query Result Types
// =============================================================================

/// Represents a single row from a database query as a map of column names to values
pub type QueryRow = std::collections::HashMap<String, QueryValue>;

/// Represents a database value that can be null, integer, real, text, or blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl QueryValue {
    /// Convert to i64 if possible
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            QueryValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert to f64 if possible
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            QueryValue::Real(r) => Some(*r),
            QueryValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Convert to String if possible
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Convert to String (owned) if possible
    pub fn as_string(&self) -> Option<String> {
        match self {
            QueryValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Convert to bytes if possible
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            QueryValue::Blob(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }
}

// =============================================================================
// Database Adapter Trait
// =============================================================================

/// Database adapter trait
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`: the adapter is shared between the
/// UI thread and download worker threads.
///
/// ## Error Handling
///
/// All methods return `Result<T>` using the `BridgeError` type.
#[async_trait::async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Initialize the database connection and run migrations
    ///
    /// This method should:
    /// 1. Configure the database (WAL mode, foreign keys, etc.)
    /// 2. Run pending migrations
    /// 3. Perform a health check
    async fn initialize(&mut self) -> Result<()>;

    /// Check if the database connection is healthy
    async fn health_check(&self) -> Result<()>;

    /// Close all database connections
    async fn close(&mut self) -> Result<()>;

    /// Execute a query and return rows
    ///
    /// Parameters are positional. Never concatenate user input into `query`.
    async fn query(&self, query: &str, params: &[QueryValue]) -> Result<Vec<QueryRow>>;

    /// Execute a statement that doesn't return rows; returns rows affected.
    async fn execute(&self, statement: &str, params: &[QueryValue]) -> Result<u64>;

    /// Execute a query that returns 0 or 1 rows
    async fn query_one_optional(
        &self,
        query: &str,
        params: &[QueryValue],
    ) -> Result<Option<QueryRow>>;

    /// Execute a query and return exactly one row
    async fn query_one(&self, query: &str, params: &[QueryValue]) -> Result<QueryRow>;

    /// Get the current schema version
    async fn get_schema_version(&self) -> Result<i64>;
}

// =============================================================================
// Helper Macros for Implementations
// =============================================================================

/// Helper macro to extract values from QueryRow
#[macro_export]
macro_rules! get_column {
    ($row:expr, $col:expr, i64) => {
        $row.get($col).and_then(|v| v.as_i64()).ok_or_else(|| {
            $crate::BridgeError::DatabaseError(format!("Missing or invalid i64 column: {}", $col))
        })?
    };
    ($row:expr, $col:expr, f64) => {
        $row.get($col).and_then(|v| v.as_f64()).ok_or_else(|| {
            $crate::BridgeError::DatabaseError(format!("Missing or invalid f64 column: {}", $col))
        })?
    };
    ($row:expr, $col:expr, String) => {
        $row.get($col).and_then(|v| v.as_string()).ok_or_else(|| {
            $crate::BridgeError::DatabaseError(format!(
                "Missing or invalid String column: {}",
                $col
            ))
        })?
    };
    ($row:expr, $col:expr, Option<String>) => {
        $row.get($col)
            .and_then(|v| if v.is_null() { None } else { v.as_string() })
    };
    ($row:expr, $col:expr, Option<i64>) => {
        $row.get($col)
            .and_then(|v| if v.is_null() { None } else { v.as_i64() })
    };
}
