use std::any::Any;

use crate::event::Event;
use crate::package_system::reconciler::PassReport;

/// System events triggered by the core application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEvent {
    /// Every kernel component has started
    ApplicationStart,
    /// The application is about to stop its components
    ApplicationShutdown,
}

impl Event for SystemEvent {
    fn name(&self) -> &'static str {
        match self {
            SystemEvent::ApplicationStart => "application.start",
            SystemEvent::ApplicationShutdown => "application.shutdown",
        }
    }

    fn clone_event(&self) -> Box<dyn Event> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Package manager notifications
#[derive(Debug, Clone)]
pub enum PackageEvent {
    /// A reconciliation pass finished; `pass` counts from 1 per process
    ReconciliationComplete { pass: u64, report: PassReport },
    /// A package id was removed from the persisted disabled list
    Enabled { package_id: String },
    /// A package id was added to the persisted disabled list
    Disabled { package_id: String },
    /// A user package directory was deleted
    Uninstalled { package_id: String },
}

impl PackageEvent {
    pub const RECONCILED: &'static str = "package.reconciled";
    pub const ENABLED: &'static str = "package.enabled";
    pub const DISABLED: &'static str = "package.disabled";
    pub const UNINSTALLED: &'static str = "package.uninstalled";
}

impl Event for PackageEvent {
    fn name(&self) -> &'static str {
        match self {
            PackageEvent::ReconciliationComplete { .. } => Self::RECONCILED,
            PackageEvent::Enabled { .. } => Self::ENABLED,
            PackageEvent::Disabled { .. } => Self::DISABLED,
            PackageEvent::Uninstalled { .. } => Self::UNINSTALLED,
        }
    }

    fn clone_event(&self) -> Box<dyn Event> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
