//! Database adapter implementations
//!
//! This module contains concrete implementations of the `DatabaseAdapter` trait.

pub mod sqlite_native;

pub use sqlite_native::SqliteAdapter;
