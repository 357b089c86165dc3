//! # Wirepkg Package System
//!
//! Discovers packages in the built-in and user package trees, decides which
//! of them may run against the host, and keeps their components registered
//! with the host session as packages are added, updated, disabled or removed.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`scan`]**: Walks both package trees and parses every `package.json`.
//! - **[`manifest`]**: Manifest model ([`PackageManifest`]) and its engine constraint.
//! - **[`version`]**: npm-style version ranges on top of `semver`.
//! - **[`record`]** and **[`registry`]**: Per-package state and the id-keyed
//!   [`PackageRegistry`].
//! - **[`component`]** and **[`factory`]**: The component variants and the
//!   [`ComponentFactory`] that builds them from manifest entries.
//! - **[`session`]**: The [`SessionRegistry`] seam components register into.
//! - **[`reconciler`]**: The serialized reconciliation pass.
//! - **[`manager`]**: The [`PackageManager`] facade used by the kernel and the CLI.
pub mod component;
pub mod env;
pub mod error;
pub mod factory;
pub mod manager;
pub mod manifest;
pub mod reconciler;
pub mod record;
pub mod registry;
pub mod scan;
pub mod session;
pub mod version;

pub use component::{Component, ComponentKind};
pub use env::PackageEnv;
pub use error::PackageSystemError;
pub use factory::ComponentFactory;
pub use manager::{DefaultPackageManager, ManagerOptions, PackageManager};
pub use manifest::{ComponentEntry, PackageManifest};
pub use reconciler::{PassReport, Reconciler};
pub use record::{PackageInfo, PackageOrigin, PackageRecord};
pub use registry::PackageRegistry;
pub use session::{Contribution, Disposable, MemorySession, SessionError, SessionRegistry};
pub use version::VersionRange;

#[cfg(test)]
mod tests;
