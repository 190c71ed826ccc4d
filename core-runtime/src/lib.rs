//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the video vault core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the core runtime utilities that other modules depend on.
//! It establishes the logging conventions, the configuration builder every
//! host goes through, and the event broadcasting used between modules.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{VaultConfig, VaultConfigBuilder};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus};
