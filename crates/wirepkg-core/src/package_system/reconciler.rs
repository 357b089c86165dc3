//! # Reconciler
//!
//! One pass scans both package trees, diffs the result against the
//! [`PackageRegistry`], unloads components whose package went away, was
//! disabled, updated or became incompatible, constructs and loads the
//! components of added, updated and re-enabled packages, re-publishes
//! configuration schemas and emits [`PackageEvent::ReconciliationComplete`].
//!
//! Passes never overlap. A trigger while a pass runs queues exactly one
//! follow-up pass, however many triggers arrive; every caller waiting on
//! that follow-up is released when it completes.
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use futures::FutureExt;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, watch};

use crate::event::{PackageEvent, SharedEventDispatcher};
use crate::kernel::error::Result;
use crate::package_system::component::{Component, ComponentKind};
use crate::package_system::env::PackageEnv;
use crate::package_system::error::PackageSystemError;
use crate::package_system::factory::ComponentFactory;
use crate::package_system::manager::ManagerOptions;
use crate::package_system::manifest::ComponentEntry;
use crate::package_system::record::{PackageInfo, PackageRecord};
use crate::package_system::registry::PackageRegistry;
use crate::package_system::scan::{DiscoveredPackage, scan_packages};
use crate::package_system::session::{Contribution, SessionRegistry};
use crate::storage::ConfigStore;

/// How a package changed since the previous pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Added,
    Updated,
    EnabledNow,
    DisabledNow,
    Removed,
    Incompatible,
    Unchanged,
}

impl Transition {
    fn constructs(self) -> bool {
        matches!(self, Transition::Added | Transition::Updated | Transition::EnabledNow)
    }
}

/// What one pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Pass number, counting from 1 per process
    pub pass: u64,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
    pub removed: Vec<String>,
    pub incompatible: Vec<String>,
    /// Packages whose components were unloaded
    pub unloaded: Vec<String>,
    /// Packages whose components were constructed and loaded
    pub loaded: Vec<String>,
    /// Packages newly flagged dirty
    pub dirty: Vec<String>,
    /// Packages whose components could not be constructed, with the reason
    pub construction_failures: Vec<(String, String)>,
    /// Manifests that could not be read or parsed, with the reason
    pub parse_failures: Vec<(PathBuf, String)>,
}

impl PassReport {
    fn record(&mut self, id: &str, transition: Transition) {
        let list = match transition {
            Transition::Added => &mut self.added,
            Transition::Updated => &mut self.updated,
            Transition::EnabledNow => &mut self.enabled,
            Transition::DisabledNow => &mut self.disabled,
            Transition::Removed => &mut self.removed,
            Transition::Incompatible => &mut self.incompatible,
            Transition::Unchanged => return,
        };
        list.push(id.to_string());
    }

    /// Whether anything changed besides the pass counter
    pub fn is_quiet(&self) -> bool {
        self.added.is_empty()
            && self.updated.is_empty()
            && self.enabled.is_empty()
            && self.disabled.is_empty()
            && self.removed.is_empty()
            && self.dirty.is_empty()
            && self.construction_failures.is_empty()
    }
}

#[derive(Debug, Clone)]
struct PassOutcome {
    pass: u64,
    result: std::result::Result<PassReport, String>,
}

#[derive(Debug, Default)]
struct Schedule {
    running: bool,
    queued: bool,
    /// Number of the most recently started pass
    started: u64,
}

type Built = std::result::Result<Vec<Box<dyn Component>>, String>;

#[derive(Debug)]
pub struct Reconciler {
    env: PackageEnv,
    config: Arc<ConfigStore>,
    session: Arc<dyn SessionRegistry>,
    factory: ComponentFactory,
    activated: HashSet<String>,
    registry: Mutex<PackageRegistry>,
    events: SharedEventDispatcher,
    schedule: StdMutex<Schedule>,
    completed: watch::Sender<PassOutcome>,
}

impl Reconciler {
    pub fn new(
        env: PackageEnv,
        config: Arc<ConfigStore>,
        session: Arc<dyn SessionRegistry>,
        options: &ManagerOptions,
        events: SharedEventDispatcher,
    ) -> Self {
        let factory = ComponentFactory::new(Arc::clone(&session), options.build_profiles.clone());
        let (completed, _) = watch::channel(PassOutcome { pass: 0, result: Ok(PassReport::default()) });
        Self {
            env,
            config,
            session,
            factory,
            activated: options.activated_components.clone(),
            registry: Mutex::new(PackageRegistry::new()),
            events,
            schedule: StdMutex::new(Schedule::default()),
            completed,
        }
    }

    pub fn env(&self) -> &PackageEnv {
        &self.env
    }

    //--------------------------------------------------
    // Scheduling
    //--------------------------------------------------

    fn with_schedule<R>(&self, f: impl FnOnce(&mut Schedule) -> R) -> R {
        let mut guard = self.schedule.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// Requests a pass without waiting for it. Returns the number of the
    /// pass that will observe the request.
    pub fn trigger(self: &Arc<Self>) -> u64 {
        let (target, start) = self.with_schedule(|schedule| {
            if schedule.running {
                schedule.queued = true;
                (schedule.started + 1, false)
            } else {
                schedule.running = true;
                schedule.started += 1;
                (schedule.started, true)
            }
        });

        if start {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.drive(target).await });
        } else {
            log::debug!("Reconciliation running, queued pass {}", target);
        }
        target
    }

    /// Requests a pass and waits until one started after the request completes.
    pub async fn reconcile(self: &Arc<Self>) -> Result<PassReport> {
        let target = self.trigger();
        self.wait_for_pass(target).await
    }

    /// Waits until pass `target` (or a later one) completed and returns its report
    pub async fn wait_for_pass(&self, target: u64) -> Result<PassReport> {
        let mut rx = self.completed.subscribe();
        let outcome = rx
            .wait_for(|outcome| outcome.pass >= target)
            .await
            .map_err(|e| PackageSystemError::ReconcileFailed(e.to_string()))?
            .clone();
        outcome
            .result
            .map_err(|message| PackageSystemError::ReconcileFailed(message).into())
    }

    /// Number of passes completed so far
    pub fn completed_passes(&self) -> u64 {
        self.completed.borrow().pass
    }

    /// Whether a pass is running or queued
    pub fn is_busy(&self) -> bool {
        self.with_schedule(|schedule| schedule.running)
    }

    async fn drive(self: Arc<Self>, first: u64) {
        let mut pass = first;
        loop {
            let result = AssertUnwindSafe(self.run_pass(pass))
                .catch_unwind()
                .await
                .map_err(|_| format!("reconciliation pass {} panicked", pass));
            if let Err(message) = &result {
                log::error!("{}", message);
            }

            let next = self.with_schedule(|schedule| {
                if schedule.queued {
                    schedule.queued = false;
                    schedule.started += 1;
                    Some(schedule.started)
                } else {
                    schedule.running = false;
                    None
                }
            });
            self.completed.send_replace(PassOutcome { pass, result });

            match next {
                Some(next_pass) => pass = next_pass,
                None => break,
            }
        }
    }

    //--------------------------------------------------
    // Pass
    //--------------------------------------------------

    async fn run_pass(&self, pass: u64) -> PassReport {
        let bootstrap = pass == 1;
        let mut report = PassReport { pass, ..PassReport::default() };
        log::debug!("Reconciliation pass {} started", pass);

        let disabled = self.config.disabled_packages().await;
        let scan = scan_packages(&self.env).await;
        report.parse_failures = scan.failures;

        // Classify and update records in place
        let transitions = {
            let mut registry = self.registry.lock().await;
            self.classify(&mut registry, scan.packages, &disabled, &mut report)
        };

        // Unload
        let to_unload: Vec<(String, Vec<Box<dyn Component>>)> = {
            let mut registry = self.registry.lock().await;
            transitions
                .iter()
                .filter(|(_, transition)| *transition != Transition::Unchanged)
                .filter_map(|(id, _)| {
                    let components = registry.take_components(id);
                    (!components.is_empty()).then(|| (id.clone(), components))
                })
                .collect()
        };
        let unload_results = join_all(to_unload.into_iter().map(|(id, components)| unload_package(id, components))).await;
        let mut failed: HashSet<String> = HashSet::new();
        for (id, ok) in unload_results {
            report.unloaded.push(id.clone());
            if !ok {
                failed.insert(id);
            }
        }

        // Construct
        let to_construct: Vec<(String, PathBuf, Vec<ComponentEntry>)> = {
            let registry = self.registry.lock().await;
            transitions
                .iter()
                .filter(|(_, transition)| transition.constructs())
                .filter_map(|(id, _)| registry.get(id))
                .map(|record| (record.id.clone(), record.directory.clone(), record.manifest.components.clone()))
                .collect()
        };
        let built = self.construct(to_construct).await;

        // Load
        let mut to_load = Vec::new();
        {
            let mut registry = self.registry.lock().await;
            for (id, result) in built {
                let Some(record) = registry.get_mut(&id) else { continue };
                match result {
                    Ok(components) => {
                        record.construction_error = None;
                        to_load.push((id, components));
                    }
                    Err(message) => {
                        log::error!("Package '{}' cannot be constructed: {}", id, message);
                        record.construction_error = Some(message.clone());
                        report.construction_failures.push((id, message));
                    }
                }
            }
        }
        let load_results = join_all(to_load.into_iter().map(|(id, components)| load_package(id, components))).await;

        // Apply results, drop removed records, re-publish schemas
        {
            let mut registry = self.registry.lock().await;
            for (id, components, ok) in load_results {
                if !ok && !bootstrap {
                    failed.insert(id.clone());
                } else if !ok {
                    log::info!("Package '{}' loaded partially during startup", id);
                }
                report.loaded.push(id.clone());
                if let Some(orphans) = registry.restore_components(&id, components) {
                    log::warn!("Package '{}' vanished during load, unloading", id);
                    let _ = unload_package(id, orphans).await;
                }
            }

            for id in &failed {
                if let Some(record) = registry.get_mut(id) {
                    if !record.dirty {
                        record.dirty = true;
                        report.dirty.push(id.clone());
                    }
                }
            }

            for id in &report.removed {
                if let Some(mut record) = registry.remove(id) {
                    record.dispose_schema();
                }
            }

            self.publish_schemas(&mut registry).await;
        }

        report.dirty.sort();
        log::info!(
            "Reconciliation pass {}: {} added, {} updated, {} enabled, {} disabled, {} removed, {} incompatible, {} dirty",
            pass,
            report.added.len(),
            report.updated.len(),
            report.enabled.len(),
            report.disabled.len(),
            report.removed.len(),
            report.incompatible.len(),
            report.dirty.len()
        );

        self.events
            .dispatch(&PackageEvent::ReconciliationComplete { pass, report: report.clone() })
            .await;
        report
    }

    fn classify(
        &self,
        registry: &mut PackageRegistry,
        packages: Vec<DiscoveredPackage>,
        disabled: &HashSet<String>,
        report: &mut PassReport,
    ) -> Vec<(String, Transition)> {
        let host = &self.env.host_version;
        let mut transitions = Vec::new();
        let mut present = HashSet::new();

        for package in packages {
            let id = package.id.clone();
            present.insert(id.clone());
            let compatible = package.manifest.is_compatible_with(host);
            let is_disabled = disabled.contains(&id);
            if !compatible {
                log::warn!(
                    "Package '{}' requires host {}, host is {}",
                    id,
                    package.manifest.engine_constraint,
                    host
                );
            }

            let transition = match registry.get_mut(&id) {
                None => {
                    let transition = if !compatible {
                        Transition::Incompatible
                    } else if is_disabled {
                        Transition::Unchanged
                    } else {
                        Transition::Added
                    };
                    if let Err(e) = registry.insert(PackageRecord::new(package, !compatible, is_disabled)) {
                        log::warn!("{}", e);
                        continue;
                    }
                    transition
                }
                Some(record) => {
                    let version_changed = record.manifest.version != package.manifest.version;
                    let was_inactive = record.disabled || record.incompatible;
                    let was_incompatible = record.incompatible;

                    record.directory = package.directory;
                    record.manifest_path = package.manifest_path;
                    record.origin = package.origin;
                    record.manifest = package.manifest;
                    record.incompatible = !compatible;
                    record.disabled = is_disabled;

                    if !compatible {
                        Transition::Incompatible
                    } else if is_disabled {
                        if was_inactive { Transition::Unchanged } else { Transition::DisabledNow }
                    } else if was_incompatible && version_changed {
                        Transition::Updated
                    } else if was_inactive {
                        Transition::EnabledNow
                    } else if version_changed {
                        Transition::Updated
                    } else {
                        Transition::Unchanged
                    }
                }
            };
            report.record(&id, transition);
            transitions.push((id, transition));
        }

        for id in registry.ids() {
            if !present.contains(&id) {
                report.record(&id, Transition::Removed);
                transitions.push((id, Transition::Removed));
            }
        }
        transitions
    }

    /// Builds component lists off the async runtime; the factory touches the filesystem.
    async fn construct(&self, targets: Vec<(String, PathBuf, Vec<ComponentEntry>)>) -> Vec<(String, Built)> {
        if targets.is_empty() {
            return Vec::new();
        }
        let factory = self.factory.clone();
        let activated = self.activated.clone();
        let ids: Vec<String> = targets.iter().map(|(id, _, _)| id.clone()).collect();

        let task = tokio::task::spawn_blocking(move || {
            targets
                .into_iter()
                .map(|(id, dir, entries)| {
                    let built = build_components(&factory, &activated, &dir, &entries);
                    (id, built)
                })
                .collect::<Vec<_>>()
        });
        match task.await {
            Ok(built) => built,
            Err(e) => {
                let message = format!("construction task failed: {}", e);
                ids.into_iter().map(|id| (id, Err(message.clone()))).collect()
            }
        }
    }

    async fn publish_schemas(&self, registry: &mut PackageRegistry) {
        for record in registry.iter_mut() {
            record.dispose_schema();
            let Some(schema) = record.manifest.config_schema_object().cloned() else {
                continue;
            };
            let contribution = Contribution::ConfigSchema { package_id: record.id.clone(), schema };
            match self.session.register(contribution).await {
                Ok(handle) => record.config_schema_handle = Some(handle),
                Err(e) => log::warn!("Configuration schema of '{}' not registered: {}", record.id, e),
            }
        }
    }

    //--------------------------------------------------
    // Queries and teardown
    //--------------------------------------------------

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &Mutex<PackageRegistry> {
        &self.registry
    }

    pub async fn list(&self) -> Vec<PackageInfo> {
        self.registry.lock().await.snapshot(&self.env.host_version)
    }

    pub async fn get(&self, id: &str) -> Option<PackageInfo> {
        self.registry.lock().await.get(id).map(|record| record.info(&self.env.host_version))
    }

    /// Directory and origin of a known package
    pub async fn locate(&self, id: &str) -> Option<(PathBuf, bool)> {
        let registry = self.registry.lock().await;
        registry.get(id).map(|record| (record.directory.clone(), record.is_builtin()))
    }

    /// Unloads every component and disposes every schema handle.
    /// Records stay in the registry.
    pub async fn shutdown(&self) {
        let pending = self.with_schedule(|schedule| {
            schedule.running.then(|| schedule.started + u64::from(schedule.queued))
        });
        if let Some(last) = pending {
            log::debug!("Waiting for reconciliation pass {} before shutdown", last);
            if let Err(e) = self.wait_for_pass(last).await {
                log::warn!("{}", e);
            }
        }

        let mut registry = self.registry.lock().await;
        let targets: Vec<(String, Vec<Box<dyn Component>>)> = registry
            .ids()
            .into_iter()
            .map(|id| {
                let components = registry.take_components(&id);
                (id, components)
            })
            .filter(|(_, components)| !components.is_empty())
            .collect();
        let results = join_all(targets.into_iter().map(|(id, components)| unload_package(id, components))).await;
        for (id, ok) in results {
            if !ok {
                log::warn!("Package '{}' did not unload cleanly during shutdown", id);
            }
        }
        for record in registry.iter_mut() {
            record.dispose_schema();
        }
        log::info!("Package components unloaded");
    }
}

fn build_components(
    factory: &ComponentFactory,
    activated: &HashSet<String>,
    dir: &Path,
    entries: &[ComponentEntry],
) -> Built {
    let mut components = Vec::new();
    // Unknown tags still reach the factory so they fail construction
    let wanted = |entry: &&ComponentEntry| {
        entry
            .kind
            .parse::<ComponentKind>()
            .map_or(true, |kind| activated.contains(kind.as_str()))
    };
    for entry in entries.iter().filter(wanted) {
        let component = factory.create(entry, dir).map_err(|e| e.to_string())?;
        components.push(component);
    }
    Ok(components)
}

/// Unloads a package's components in order. Returns false if any failed.
async fn unload_package(id: String, mut components: Vec<Box<dyn Component>>) -> (String, bool) {
    let mut ok = true;
    for component in components.iter_mut() {
        match component.unload().await {
            Ok(true) => log::debug!("Unloaded {} of '{}'", component.kind(), id),
            Ok(false) => {
                log::warn!("{} of '{}' did not unload cleanly", component.kind(), id);
                ok = false;
            }
            Err(e) => {
                log::error!("Failed to unload {} of '{}': {}", component.kind(), id, e);
                ok = false;
            }
        }
    }
    (id, ok)
}

/// Loads a package's components in declaration order. Returns false if any failed.
async fn load_package(id: String, mut components: Vec<Box<dyn Component>>) -> (String, Vec<Box<dyn Component>>, bool) {
    let mut ok = true;
    for component in components.iter_mut() {
        match component.load().await {
            Ok(true) => log::debug!("Loaded {} of '{}'", component.kind(), id),
            Ok(false) => {
                log::info!("{} of '{}' loaded with restart required", component.kind(), id);
                ok = false;
            }
            Err(e) => {
                log::error!("Failed to load {} of '{}': {}", component.kind(), id, e);
                ok = false;
            }
        }
    }
    (id, components, ok)
}
