use std::collections::HashSet;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::event::{PackageEvent, SharedEventDispatcher};
use crate::kernel::component::KernelComponent;
use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::package_system::component::ComponentKind;
use crate::package_system::env::PackageEnv;
use crate::package_system::error::PackageSystemError;
use crate::package_system::reconciler::{PassReport, Reconciler};
use crate::package_system::record::PackageInfo;
use crate::package_system::scan::find_manifest_files;
use crate::package_system::session::SessionRegistry;
use crate::storage::{ConfigData, ConfigStore};

/// Package system component interface
#[async_trait]
pub trait PackageManager: KernelComponent {
    /// Runs a reconciliation pass, or joins the one queued behind a running pass
    async fn reconcile(&self) -> Result<PassReport>;

    /// Requests a pass without waiting; failures are only logged
    fn trigger_reconcile(&self);

    /// Every known package, sorted by id
    async fn list(&self) -> Vec<PackageInfo>;

    async fn get(&self, id: &str) -> Option<PackageInfo>;

    /// Removes `id` from the disabled list. Returns whether the list changed.
    async fn enable(&self, id: &str) -> Result<bool>;

    /// Adds `id` to the disabled list. Returns whether the list changed.
    async fn disable(&self, id: &str) -> Result<bool>;

    /// Deletes a user package directory. Returns false for unknown ids.
    async fn uninstall(&self, id: &str) -> Result<bool>;

    /// Creates the user directory layout and writes the version stamp
    async fn init(&self) -> Result<()>;

    /// Deletes user packages marked for removal. Returns how many were removed.
    async fn cleanup(&self) -> Result<usize>;

    /// Unloads every component and withdraws every schema
    async fn shutdown(&self) -> Result<()>;
}

/// Per-process package options, read from the profile configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Component type tags constructed in this process
    pub activated_components: HashSet<String>,
    /// Build profiles searched for compiled native artifacts
    pub build_profiles: Vec<String>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            activated_components: ComponentKind::ALL.iter().map(|kind| kind.as_str().to_string()).collect(),
            build_profiles: constants::DEFAULT_BUILD_PROFILES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl ManagerOptions {
    pub fn from_config(config: &ConfigData) -> Self {
        let defaults = Self::default();
        Self {
            activated_components: config
                .get::<Vec<String>>(constants::ACTIVATED_COMPONENTS_KEY)
                .map(|tags| tags.into_iter().collect())
                .unwrap_or(defaults.activated_components),
            build_profiles: config
                .get::<Vec<String>>(constants::BUILD_PROFILES_KEY)
                .filter(|profiles| !profiles.is_empty())
                .unwrap_or(defaults.build_profiles),
        }
    }
}

#[derive(Serialize)]
struct VersionStamp<'a> {
    host: String,
    resource_path: &'a PathBuf,
}

/// Default implementation of package manager
#[derive(Clone)]
pub struct DefaultPackageManager {
    name: &'static str,
    reconciler: Arc<Reconciler>,
    config: Arc<ConfigStore>,
    events: SharedEventDispatcher,
}

impl DefaultPackageManager {
    pub fn new(
        env: PackageEnv,
        config: Arc<ConfigStore>,
        session: Arc<dyn SessionRegistry>,
        options: ManagerOptions,
        events: SharedEventDispatcher,
    ) -> Self {
        let reconciler = Reconciler::new(env, Arc::clone(&config), session, &options, events.clone());
        Self {
            name: "DefaultPackageManager",
            reconciler: Arc::new(reconciler),
            config,
            events,
        }
    }

    pub fn env(&self) -> &PackageEnv {
        self.reconciler.env()
    }

    pub fn events(&self) -> &SharedEventDispatcher {
        &self.events
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Number of completed reconciliation passes
    pub fn completed_passes(&self) -> u64 {
        self.reconciler.completed_passes()
    }
}

impl Debug for DefaultPackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultPackageManager")
            .field("name", &self.name)
            .field("config", &self.config.path())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KernelComponent for DefaultPackageManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<()> {
        self.init().await?;
        let removed = self.cleanup().await?;
        if removed > 0 {
            log::info!("Removed {} package(s) marked for deletion", removed);
        }
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let report = self.reconcile().await?;
        log::info!(
            "Package manager started with {} package(s) loaded",
            report.loaded.len()
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.shutdown().await
    }
}

#[async_trait]
impl PackageManager for DefaultPackageManager {
    async fn reconcile(&self) -> Result<PassReport> {
        self.reconciler.reconcile().await
    }

    fn trigger_reconcile(&self) {
        let target = self.reconciler.trigger();
        let reconciler = Arc::clone(&self.reconciler);
        tokio::spawn(async move {
            if let Err(e) = reconciler.wait_for_pass(target).await {
                log::error!("Background reconciliation failed: {}", e);
            }
        });
    }

    async fn list(&self) -> Vec<PackageInfo> {
        self.reconciler.list().await
    }

    async fn get(&self, id: &str) -> Option<PackageInfo> {
        self.reconciler.get(id).await
    }

    async fn enable(&self, id: &str) -> Result<bool> {
        let changed = self.config.update_disabled_packages(|disabled| disabled.remove(id)).await?;
        if !changed {
            if self.reconciler.get(id).await.is_none() {
                return Err(PackageSystemError::PackageNotFound(id.to_string()).into());
            }
            return Ok(false);
        }
        log::info!("Enabled package '{}'", id);
        self.events.dispatch(&PackageEvent::Enabled { package_id: id.to_string() }).await;
        self.reconcile().await?;
        Ok(true)
    }

    async fn disable(&self, id: &str) -> Result<bool> {
        if self.reconciler.get(id).await.is_none() {
            return Err(PackageSystemError::PackageNotFound(id.to_string()).into());
        }
        let changed = self.config.update_disabled_packages(|disabled| disabled.insert(id.to_string())).await?;
        if !changed {
            return Ok(false);
        }
        log::info!("Disabled package '{}'", id);
        self.events.dispatch(&PackageEvent::Disabled { package_id: id.to_string() }).await;
        self.reconcile().await?;
        Ok(true)
    }

    async fn uninstall(&self, id: &str) -> Result<bool> {
        let Some((directory, builtin)) = self.reconciler.locate(id).await else {
            log::debug!("Uninstall of unknown package '{}' ignored", id);
            return Ok(false);
        };
        if builtin || !self.env().is_user_path(&directory) {
            return Err(PackageSystemError::BuiltinUninstall { package_id: id.to_string() }.into());
        }

        let removal = tokio::fs::remove_dir_all(&directory).await;
        match &removal {
            Ok(()) => {
                log::info!("Uninstalled package '{}' from {}", id, directory.display());
                self.events.dispatch(&PackageEvent::Uninstalled { package_id: id.to_string() }).await;
            }
            Err(e) => log::error!("Failed to remove {}: {}", directory.display(), e),
        }

        // Reconcile either way so the registry matches what is left on disk
        self.reconcile().await?;

        removal.map_err(|source| PackageSystemError::UninstallError {
            package_id: id.to_string(),
            path: directory,
            source,
        })?;
        Ok(true)
    }

    async fn init(&self) -> Result<()> {
        let env = self.env();
        for dir in [&env.user_package_dir, &env.cache_dir, &env.profile_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::io(e, "create_dir", dir.clone()))?;
        }

        let stamp = VersionStamp {
            host: env.host_version.to_string(),
            resource_path: &env.builtin_package_dir,
        };
        let version_file = env.user_dir.join(constants::VERSION_FILE_NAME);
        let content = serde_json::to_string(&stamp)
            .map_err(|e| Error::Other(format!("Failed to serialize version stamp: {}", e)))?;
        tokio::fs::write(&version_file, content)
            .await
            .map_err(|e| Error::io(e, "write_version_file", version_file.clone()))?;
        log::debug!("Wrote {}", version_file.display());
        Ok(())
    }

    async fn cleanup(&self) -> Result<usize> {
        let root = self.env().user_package_dir.clone();
        let manifests = tokio::task::spawn_blocking(move || find_manifest_files(&root))
            .await
            .map_err(|e| PackageSystemError::ReconcileFailed(format!("cleanup scan failed: {}", e)))?;

        let mut removed = 0;
        for manifest in manifests {
            let Some(dir) = manifest.parent() else { continue };
            if !tokio::fs::try_exists(dir.join(constants::REMOVE_MARKER_FILE)).await.unwrap_or(false) {
                continue;
            }
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => {
                    log::info!("Removed {}", dir.display());
                    removed += 1;
                }
                Err(e) => log::warn!("Failed to remove {}: {}", dir.display(), e),
            }
        }
        Ok(removed)
    }

    async fn shutdown(&self) -> Result<()> {
        self.reconciler.shutdown().await;
        Ok(())
    }
}
