//! # Wirepkg Core Kernel
//!
//! The `kernel` module wires the application together and owns what every
//! other module shares.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Application Bootstrapping**: [`Application`](bootstrap::Application) opens the
//!   profile configuration, builds the package manager and drives the
//!   initialize/start/stop lifecycle.
//! - **Component Lifecycle**: the [`KernelComponent`](component::KernelComponent) trait.
//! - **Core Constants**: file names, directory layout and configuration keys in `constants`.
//! - **Error Handling**: the crate-wide [`Error`](error::Error) and its `Result` alias.
pub mod bootstrap;
pub mod component;
pub mod constants;
pub mod error;

pub use bootstrap::Application;
pub use component::KernelComponent;
pub use error::{Error, Result};

#[cfg(test)]
mod tests;
