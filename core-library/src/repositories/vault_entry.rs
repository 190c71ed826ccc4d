//! Database repository for vault entries
//!
//! Uses the `DatabaseAdapter` bridge so the SQL driver stays swappable. The
//! schema lives in `migrations/0001_create_vault_entries.sql`.

use crate::error::{LibraryError, Result};
use crate::models::{VaultEntry, VaultEntryId};
use bridge_traits::database::{DatabaseAdapter, QueryRow, QueryValue};
use bridge_traits::get_column;
use bridge_traits::storage::BlobRef;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Repository trait for vault entry persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VaultEntryRepository: Send + Sync {
    /// Insert a new entry.
    async fn insert(&self, entry: &VaultEntry) -> Result<()>;

    async fn find_by_id(&self, id: &VaultEntryId) -> Result<Option<VaultEntry>>;

    /// All entries, newest first.
    async fn list_recent(&self) -> Result<Vec<VaultEntry>>;

    /// Set `last_position`. Returns `false` if no such entry exists.
    async fn update_position(&self, id: &VaultEntryId, position: u64) -> Result<bool>;

    /// Delete the record only. Returns `false` if no such entry exists.
    async fn delete(&self, id: &VaultEntryId) -> Result<bool>;

    async fn count(&self) -> Result<u64>;
}

/// SQLite implementation of VaultEntryRepository.
pub struct SqliteVaultEntryRepository {
    db: Arc<dyn DatabaseAdapter>,
}

impl SqliteVaultEntryRepository {
    pub fn new(db: Arc<dyn DatabaseAdapter>) -> Self {
        Self { db }
    }

    fn row_to_entry(row: &QueryRow) -> Result<VaultEntry> {
        let id = get_column!(row, "id", String);
        let id = VaultEntryId::from_string(&id).map_err(|e| LibraryError::InvalidInput {
            field: "id".to_string(),
            message: e.to_string(),
        })?;

        let last_position = get_column!(row, "last_position", i64);

        Ok(VaultEntry {
            id,
            storage_reference: BlobRef::new(get_column!(row, "storage_reference", String)),
            source_name: get_column!(row, "source_name", String),
            last_position: u64::try_from(last_position).unwrap_or(0),
            created_at: get_column!(row, "created_at", i64),
        })
    }

    fn position_param(position: u64) -> Result<QueryValue> {
        i64::try_from(position)
            .map(QueryValue::Integer)
            .map_err(|_| LibraryError::InvalidInput {
                field: "last_position".to_string(),
                message: format!("{} exceeds the storable range", position),
            })
    }
}

#[async_trait::async_trait]
impl VaultEntryRepository for SqliteVaultEntryRepository {
    #[instrument(skip(self, entry), fields(entry_id = %entry.id))]
    async fn insert(&self, entry: &VaultEntry) -> Result<()> {
        entry.validate().map_err(|message| LibraryError::InvalidInput {
            field: "vault_entry".to_string(),
            message,
        })?;

        let sql = r#"
            INSERT INTO vault_entries (
                id, storage_reference, source_name, last_position, created_at
            ) VALUES (?, ?, ?, ?, ?)
        "#;

        let params = vec![
            QueryValue::Text(entry.id.to_string()),
            QueryValue::Text(entry.storage_reference.as_str().to_string()),
            QueryValue::Text(entry.source_name.clone()),
            Self::position_param(entry.last_position)?,
            QueryValue::Integer(entry.created_at),
        ];

        self.db.execute(sql, &params).await.map_err(|e| {
            error!("Failed to insert vault entry: {}", e);
            LibraryError::from(e)
        })?;

        debug!("Vault entry inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &VaultEntryId) -> Result<Option<VaultEntry>> {
        let row = self
            .db
            .query_one_optional(
                "SELECT * FROM vault_entries WHERE id = ?",
                &[QueryValue::Text(id.to_string())],
            )
            .await?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    #[instrument(skip(self))]
    async fn list_recent(&self) -> Result<Vec<VaultEntry>> {
        // rowid breaks ties between entries created in the same millisecond
        let rows = self
            .db
            .query(
                "SELECT * FROM vault_entries ORDER BY created_at DESC, rowid DESC",
                &[],
            )
            .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    #[instrument(skip(self))]
    async fn update_position(&self, id: &VaultEntryId, position: u64) -> Result<bool> {
        let affected = self
            .db
            .execute(
                "UPDATE vault_entries SET last_position = ? WHERE id = ?",
                &[Self::position_param(position)?, QueryValue::Text(id.to_string())],
            )
            .await?;

        Ok(affected > 0)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &VaultEntryId) -> Result<bool> {
        let affected = self
            .db
            .execute(
                "DELETE FROM vault_entries WHERE id = ?",
                &[QueryValue::Text(id.to_string())],
            )
            .await?;

        Ok(affected > 0)
    }

    async fn count(&self) -> Result<u64> {
        let row = self
            .db
            .query_one("SELECT COUNT(*) as count FROM vault_entries", &[])
            .await?;
        let count = get_column!(row, "count", i64);
        Ok(count.max(0) as u64)
    }
}
