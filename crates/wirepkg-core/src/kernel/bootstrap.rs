use std::sync::Arc;

use crate::event::{SharedEventDispatcher, SystemEvent};
use crate::kernel::component::KernelComponent;
use crate::kernel::constants;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::package_system::env::PackageEnv;
use crate::package_system::manager::{DefaultPackageManager, ManagerOptions};
use crate::package_system::session::SessionRegistry;
use crate::storage::ConfigStore;

/// Main application struct wiring the kernel components together
pub struct Application {
    initialized: bool,
    env: PackageEnv,
    events: SharedEventDispatcher,
    config: Arc<ConfigStore>,
    package_manager: Arc<DefaultPackageManager>,
    // Kept in start order; stopped in reverse
    components: Vec<Arc<dyn KernelComponent>>,
}

impl Application {
    /// Opens the profile configuration and builds the package manager on top of `session`.
    pub async fn new(env: PackageEnv, session: Arc<dyn SessionRegistry>) -> Result<Self> {
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::HOST_VERSION);
        log::info!("Built-in packages: {}", env.builtin_package_dir.display());
        log::info!("User directory: {}", env.user_dir.display());

        let config = Arc::new(ConfigStore::open(env.config_path()).await?);
        let options = ManagerOptions::from_config(&config.snapshot().await);
        log::debug!("Package manager options: {:?}", options);

        let events = SharedEventDispatcher::new();
        let package_manager = Arc::new(DefaultPackageManager::new(
            env.clone(),
            Arc::clone(&config),
            session,
            options,
            events.clone(),
        ));
        let components: Vec<Arc<dyn KernelComponent>> = vec![package_manager.clone()];

        Ok(Application {
            initialized: false,
            env,
            events,
            config,
            package_manager,
            components,
        })
    }

    /// Initializes and starts every component, then announces the start.
    pub async fn start(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Start,
                component_name: None,
                message: "Application already started".to_string(),
                source: None,
            });
        }

        self.run_phase(KernelLifecyclePhase::Initialize).await?;
        self.run_phase(KernelLifecyclePhase::Start).await?;
        self.initialized = true;

        self.events.dispatch(&SystemEvent::ApplicationStart).await;
        log::info!("Application started");
        Ok(())
    }

    /// Stops every component in reverse order. Every component is asked to
    /// stop; the first failure is returned.
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.initialized {
            log::debug!("Shutdown requested before start, nothing to do");
            return Ok(());
        }
        self.events.dispatch(&SystemEvent::ApplicationShutdown).await;

        let mut first_error = None;
        for component in self.components.iter().rev() {
            log::info!("Stopping component: {}", component.name());
            if let Err(e) = component.stop().await {
                log::error!("Error stopping component {}: {}", component.name(), e);
                first_error.get_or_insert(Error::KernelLifecycleError {
                    phase: KernelLifecyclePhase::Shutdown,
                    component_name: Some(component.name().to_string()),
                    message: "Component failed to stop".to_string(),
                    source: Some(Box::new(e)),
                });
            }
        }
        self.initialized = false;
        log::info!("Component shutdown complete.");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn run_phase(&self, phase: KernelLifecyclePhase) -> Result<()> {
        for component in &self.components {
            log::info!("{} component: {}", phase, component.name());
            let result = match phase {
                KernelLifecyclePhase::Initialize => component.initialize().await,
                KernelLifecyclePhase::Start => component.start().await,
                KernelLifecyclePhase::Shutdown => component.stop().await,
            };
            result.map_err(|e| Error::KernelLifecycleError {
                phase: phase.clone(),
                component_name: Some(component.name().to_string()),
                message: format!("Component failed during {}", phase),
                source: Some(Box::new(e)),
            })?;
        }
        Ok(())
    }

    /// Returns whether the application has been started.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn env(&self) -> &PackageEnv {
        &self.env
    }

    pub fn events(&self) -> &SharedEventDispatcher {
        &self.events
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    /// Get the package manager instance
    pub fn package_manager(&self) -> Arc<DefaultPackageManager> {
        Arc::clone(&self.package_manager)
    }
}
