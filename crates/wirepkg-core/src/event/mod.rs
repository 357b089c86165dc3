//! # Wirepkg Core Event System
//!
//! Name- and type-addressed async event handlers. The package manager emits
//! [`PackageEvent::ReconciliationComplete`] once per finished pass; the
//! application emits [`SystemEvent`]s around start and shutdown.
pub mod dispatcher;
pub mod types;

use std::any::Any;
use std::fmt;

use async_trait::async_trait;

/// Type for event identifiers
pub type EventId = u64;

/// Result of event processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    /// Event was processed successfully and propagation should continue
    Continue,
    /// Event was processed and propagation should stop
    Stop,
}

/// Core event trait
pub trait Event: Any + fmt::Debug + Send + Sync {
    /// Get the name of this event
    fn name(&self) -> &'static str;

    /// Clone this event
    fn clone_event(&self) -> Box<dyn Event>;

    /// Cast to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Asynchronous event handler trait
#[async_trait]
pub trait AsyncEventHandler: Send + Sync {
    async fn handle(&self, event: &dyn Event) -> EventResult;
}

/// Re-export important types
pub use dispatcher::{
    BoxFuture, EventDispatcher, SharedEventDispatcher, create_dispatcher, sync_event_handler,
    sync_typed_handler,
};
pub use types::{PackageEvent, SystemEvent};

// Test module declaration
#[cfg(test)]
mod tests;
