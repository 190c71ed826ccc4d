//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! - Traits define the interface so services can be tested against mocks
//! - SQLite implementations go through the `DatabaseAdapter` bridge
//! - All operations return `Result<T>` for error handling

pub mod vault_entry;

#[cfg(test)]
pub use vault_entry::MockVaultEntryRepository;
pub use vault_entry::{SqliteVaultEntryRepository, VaultEntryRepository};
