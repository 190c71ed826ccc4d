//! # Database Bootstrap
//!
//! Opens the vault database and brings its schema up to date.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_library::db::open_database;
//! use bridge_traits::database::DatabaseConfig;
//!
//! let db = open_database(DatabaseConfig::new(data_dir.join("db/db.sqlite3"))).await?;
//! let repository = SqliteVaultEntryRepository::new(db);
//! ```
//!
//! ## Testing
//!
//! ```rust,ignore
//! let db = open_test_database().await?;
//! ```

use crate::adapters::SqliteAdapter;
use crate::{LibraryError, Result};
use bridge_traits::database::{DatabaseAdapter, DatabaseConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Local path behind a `sqlite:` URL, if it names a file.
fn database_file(config: &DatabaseConfig) -> Option<PathBuf> {
    let path = config.database_url.strip_prefix("sqlite:")?;
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Some(PathBuf::from(path.trim_start_matches("//")))
}

/// Connect, migrate and health-check the vault database.
///
/// Creates the parent directory of a file database if needed.
pub async fn open_database(config: DatabaseConfig) -> Result<Arc<dyn DatabaseAdapter>> {
    if let Some(parent) = database_file(&config)
        .as_deref()
        .and_then(|file| file.parent())
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent).map_err(|e| LibraryError::InvalidInput {
            field: "database_path".to_string(),
            message: format!("cannot create {}: {}", parent.display(), e),
        })?;
    }

    let mut adapter = SqliteAdapter::new(config).await?;
    adapter.initialize().await.map_err(|e| {
        warn!(error = %e, "Database initialization failed");
        LibraryError::Migration(e.to_string())
    })?;

    info!("Vault database ready");
    Ok(Arc::new(adapter))
}

/// In-memory database with the schema applied.
pub async fn open_test_database() -> Result<Arc<dyn DatabaseAdapter>> {
    open_database(DatabaseConfig::in_memory()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_database() {
        let db = open_test_database().await.unwrap();
        db.health_check().await.unwrap();
        assert!(db.get_schema_version().await.unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("db.sqlite3");

        let db = open_database(DatabaseConfig::new(&path)).await.unwrap();
        db.health_check().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = open_test_database().await.unwrap();
        let row = db.query_one("PRAGMA foreign_keys", &[]).await.unwrap();
        assert_eq!(row.get("foreign_keys").and_then(|v| v.as_i64()), Some(1));
    }

    #[test]
    fn test_database_file_from_url() {
        assert_eq!(
            database_file(&DatabaseConfig::new("/tmp/v/db.sqlite3")),
            Some(PathBuf::from("/tmp/v/db.sqlite3"))
        );
        assert_eq!(database_file(&DatabaseConfig::in_memory()), None);
    }
}
