use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    /// The blob could not be removed, so the record was kept.
    #[error("Failed to delete stored video {reference}: {message}")]
    BlobDeletion { reference: String, message: String },

    /// Nothing was added to the vault.
    #[error("Ingestion failed: {0}")]
    IngestionFailure(String),
}

impl LibraryError {
    pub(crate) fn not_found(id: impl ToString) -> Self {
        LibraryError::NotFound {
            entity_type: "VaultEntry".to_string(),
            id: id.to_string(),
        }
    }

    /// Errors that should reach the user as a notification.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            LibraryError::NotFound { .. }
                | LibraryError::BlobDeletion { .. }
                | LibraryError::IngestionFailure(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
