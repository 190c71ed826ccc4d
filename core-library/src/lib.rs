//! # Vault Library Module
//!
//! Owns the vault entry database and the path from a plaintext file to a
//! stored, encrypted entry.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite schema and migrations for vault entries
//! - The vault entry repository
//! - Listing, position write-back and two-phase deletion (`VaultLibrary`)
//! - The ingestion pipeline that encrypts a file into the blob store

pub mod adapters;
pub mod db;
pub mod error;
pub mod ingest;
pub mod library;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use ingest::IngestionPipeline;
pub use library::VaultLibrary;
pub use models::{VaultEntry, VaultEntryId};
pub use repositories::{SqliteVaultEntryRepository, VaultEntryRepository};
