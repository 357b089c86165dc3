use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::watch;

use crate::event::{Event, EventResult, PackageEvent, SharedEventDispatcher, sync_event_handler};
use crate::package_system::env::PackageEnv;
use crate::package_system::manager::{DefaultPackageManager, ManagerOptions};
use crate::package_system::session::{Contribution, Disposable, MemorySession, SessionError, SessionRegistry};
use crate::storage::ConfigStore;

pub const HOST_VERSION: &str = "1.4.0";

/// Temporary built-in and user trees plus everything a manager needs
pub struct Fixture {
    pub temp: TempDir,
    pub env: PackageEnv,
    pub session: MemorySession,
    pub config: Arc<ConfigStore>,
    pub events: SharedEventDispatcher,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_host(HOST_VERSION).await
    }

    pub async fn with_host(host_version: &str) -> Self {
        let temp = tempfile::tempdir().expect("Failed to create temporary directory");
        let env = PackageEnv::new(temp.path().join("resources/package"), temp.path().join("user"), "default", host_version);
        fs::create_dir_all(&env.builtin_package_dir).expect("Failed to create builtin dir");
        fs::create_dir_all(&env.user_package_dir).expect("Failed to create user package dir");
        let config = ConfigStore::open(env.config_path()).await.expect("Failed to open config");
        Self {
            temp,
            env,
            session: MemorySession::new(),
            config: Arc::new(config),
            events: SharedEventDispatcher::new(),
        }
    }

    pub fn builtin(&self, name: &str) -> PathBuf {
        self.env.builtin_package_dir.join(name)
    }

    pub fn user(&self, relative: &str) -> PathBuf {
        self.env.user_package_dir.join(relative)
    }

    pub fn manager(&self) -> DefaultPackageManager {
        self.manager_with(ManagerOptions::default())
    }

    pub fn manager_with(&self, options: ManagerOptions) -> DefaultPackageManager {
        self.manager_on(Arc::new(self.session.clone()), options)
    }

    pub fn manager_on(&self, session: Arc<dyn SessionRegistry>, options: ManagerOptions) -> DefaultPackageManager {
        DefaultPackageManager::new(self.env.clone(), Arc::clone(&self.config), session, options, self.events.clone())
    }

    /// Counts completed passes seen through the event dispatcher
    pub async fn count_passes(&self) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        self.events
            .register_handler(
                PackageEvent::RECONCILED,
                sync_event_handler(move |_event: &dyn Event| {
                    counter_clone.fetch_add(1, Ordering::SeqCst);
                    EventResult::Continue
                }),
            )
            .await;
        counter
    }
}

/// Manifest JSON with the given version, engine range and components
pub fn manifest(version: &str, engine: &str, components: Value) -> Value {
    json!({
        "name": "test-package",
        "version": version,
        "description": "fixture",
        "engines": { "host": engine },
        "components": components,
    })
}

/// A package with one filter macro component backed by `index`
pub fn macro_manifest(version: &str) -> Value {
    manifest(version, "^1.0.0", json!([{ "type": "core:filter:macro", "main": "index" }]))
}

/// Writes `package.json` plus an `index` module into `dir`
pub fn write_package(dir: &Path, manifest: &Value) {
    fs::create_dir_all(dir).expect("Failed to create package dir");
    fs::write(dir.join("package.json"), manifest.to_string()).expect("Failed to write manifest");
    fs::write(dir.join("index"), "module.exports = {}").expect("Failed to write module");
}

pub fn write_file(dir: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(&path, contents).expect("Failed to write file");
    path
}

/// Session whose registrations wait until the gate opens
#[derive(Debug)]
pub struct GatedSession {
    inner: MemorySession,
    gate: watch::Sender<bool>,
}

impl GatedSession {
    pub fn new(inner: MemorySession) -> Self {
        let (gate, _) = watch::channel(false);
        Self { inner, gate }
    }

    pub fn open(&self) {
        self.gate.send_replace(true);
    }
}

#[async_trait]
impl SessionRegistry for GatedSession {
    async fn register(&self, contribution: Contribution) -> Result<Disposable, SessionError> {
        let mut rx = self.gate.subscribe();
        let _ = rx.wait_for(|open| *open).await;
        self.inner.register(contribution).await
    }
}
