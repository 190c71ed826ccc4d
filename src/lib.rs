//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `video-vault-workspace`
//! and enable `desktop-shims` to get the keyring, filesystem and yt-dlp
//! bridges wired in without touching each crate.

#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreError, VaultService};
