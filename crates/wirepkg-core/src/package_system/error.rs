//! # Wirepkg Core Package System Errors
//!
//! [`PackageSystemError`] covers manifest parsing, component construction,
//! component runtime failures surfaced by the session, version range
//! parsing, and the package manager's facade operations.
use std::path::PathBuf;

use crate::package_system::session::SessionError;
use crate::package_system::version::VersionError;

#[derive(Debug, thiserror::Error)]
pub enum PackageSystemError {
    #[error("Package manifest error for '{path}': {message}")]
    ManifestError {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Cannot construct '{component_type}' component in '{directory}': {message}")]
    ConstructionError {
        component_type: String,
        directory: PathBuf,
        message: String,
    },

    #[error("Component '{component_type}' failed to {operation}: {message}")]
    ComponentError {
        component_type: String,
        operation: String,
        message: String,
    },

    #[error("Session registration failed: {0}")]
    Session(#[from] SessionError),

    #[error("Version parsing error: {0}")]
    VersionParsing(#[from] VersionError),

    #[error("Built-in package '{package_id}' cannot be uninstalled")]
    BuiltinUninstall { package_id: String },

    #[error("Failed to uninstall '{package_id}' from '{path}': {source}")]
    UninstallError {
        package_id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Package already registered: {0}")]
    DuplicatePackage(String),

    #[error("Reconciliation failed: {0}")]
    ReconcileFailed(String),
}

impl PackageSystemError {
    pub(crate) fn construction(
        component_type: impl Into<String>,
        directory: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        PackageSystemError::ConstructionError {
            component_type: component_type.into(),
            directory: directory.into(),
            message: message.into(),
        }
    }
}
