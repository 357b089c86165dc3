//! # Wirepkg Core Storage
//!
//! Persisted profile configuration. [`ConfigStore`] backs the disabled
//! package list and the per-process package options; [`ConfigData`] is the
//! format-independent key/value document it reads and writes.
pub mod config;
pub mod error;

/// Re-export key types
pub use config::{ConfigData, ConfigFormat, ConfigStore};
pub use error::StorageSystemError;
