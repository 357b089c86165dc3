pub mod event;
pub mod kernel;
pub mod package_system;
pub mod storage;

// Re-export key public types for the binary
pub use event::{Event, EventResult, PackageEvent, SharedEventDispatcher, SystemEvent};
pub use kernel::Application;
pub use kernel::error::Error as KernelError;
pub use package_system::{
    DefaultPackageManager, MemorySession, PackageEnv, PackageInfo, PackageManager, PassReport,
};
pub use storage::ConfigStore;
