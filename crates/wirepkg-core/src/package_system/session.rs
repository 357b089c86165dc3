//! # Session Registry Contract
//!
//! Components publish their capabilities to the analysis session through
//! [`SessionRegistry::register`], receiving a [`Disposable`] that withdraws
//! the registration again. The dissection engine itself lives outside this
//! crate; [`MemorySession`] is the in-process registry used by the command
//! line front end and by tests.
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;

/// One capability published to the session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Contribution {
    /// Token names usable in filter expressions
    Tokens { names: Vec<String> },
    /// Native dissector library, `stream` for stream dissectors
    Dissector { stream: bool, library: PathBuf },
    /// Renderer bound to an attribute or layer id
    Renderer { layer: bool, id: String, module: PathBuf },
    /// Stylesheet contents
    Style { path: PathBuf, css: String },
    Panel { module: PathBuf, name: Option<String>, slot: Option<String> },
    FilterMacro { module: PathBuf },
    Importer { module: PathBuf },
    Exporter { module: PathBuf },
    ImporterExtensions { extensions: Vec<String> },
    ExporterExtensions { extensions: Vec<String> },
    /// Native library loaded into sessions created from now on
    Library { path: PathBuf },
    /// Configuration schema published for a package
    ConfigSchema { package_id: String, schema: serde_json::Value },
}

impl Contribution {
    /// Short stable label, used in logs and by [`MemorySession::fail_on`]
    pub fn label(&self) -> &'static str {
        match self {
            Contribution::Tokens { .. } => "tokens",
            Contribution::Dissector { stream: false, .. } => "dissector:packet",
            Contribution::Dissector { stream: true, .. } => "dissector:stream",
            Contribution::Renderer { layer: false, .. } => "renderer:attr",
            Contribution::Renderer { layer: true, .. } => "renderer:layer",
            Contribution::Style { .. } => "style",
            Contribution::Panel { .. } => "panel",
            Contribution::FilterMacro { .. } => "filter:macro",
            Contribution::Importer { .. } => "file:importer",
            Contribution::Exporter { .. } => "file:exporter",
            Contribution::ImporterExtensions { .. } => "file:importer:extensions",
            Contribution::ExporterExtensions { .. } => "file:exporter:extensions",
            Contribution::Library { .. } => "library",
            Contribution::ConfigSchema { .. } => "config:schema",
        }
    }
}

/// Registration failure reported by the session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session rejected '{label}': {message}")]
    Rejected { label: String, message: String },
}

/// Handle withdrawing one registration. The registration is released exactly
/// once, either by [`Disposable::dispose`] or when the handle is dropped.
pub struct Disposable {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Disposable {
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self { release: Some(Box::new(release)) }
    }

    /// Handle with nothing to release
    pub fn noop() -> Self {
        Self { release: None }
    }

    pub fn dispose(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Disposable {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("pending", &self.release.is_some())
            .finish()
    }
}

/// Registry of session capabilities, shared by every component
#[async_trait]
pub trait SessionRegistry: Send + Sync + fmt::Debug {
    async fn register(&self, contribution: Contribution) -> Result<Disposable, SessionError>;
}

/// Entry in the [`MemorySession`] call log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Register(String),
    Dispose(String),
}

#[derive(Debug, Default)]
struct SessionState {
    live: BTreeMap<u64, Contribution>,
    calls: Vec<SessionCall>,
    failing: HashSet<String>,
}

/// In-memory [`SessionRegistry`] keeping every live registration.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    state: Arc<Mutex<SessionState>>,
    next_id: Arc<AtomicU64>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later registration with this label fail
    pub fn fail_on(&self, label: &str) {
        self.with_state(|state| {
            state.failing.insert(label.to_string());
        });
    }

    /// Clears a failure set by [`MemorySession::fail_on`]
    pub fn clear_failure(&self, label: &str) {
        self.with_state(|state| {
            state.failing.remove(label);
        });
    }

    /// Live registrations in registration order
    pub fn live(&self) -> Vec<Contribution> {
        self.with_state(|state| state.live.values().cloned().collect())
    }

    /// Number of live registrations with `label`
    pub fn live_count(&self, label: &str) -> usize {
        self.with_state(|state| state.live.values().filter(|c| c.label() == label).count())
    }

    /// Every register/dispose call so far, in order
    pub fn calls(&self) -> Vec<SessionCall> {
        self.with_state(|state| state.calls.clone())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        // Recover the state after a panic in another holder
        let mut guard = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl SessionRegistry for MemorySession {
    async fn register(&self, contribution: Contribution) -> Result<Disposable, SessionError> {
        let label = contribution.label();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        self.with_state(|state| {
            if state.failing.contains(label) {
                return Err(SessionError::Rejected {
                    label: label.to_string(),
                    message: "registration refused".to_string(),
                });
            }
            state.calls.push(SessionCall::Register(label.to_string()));
            state.live.insert(id, contribution);
            Ok(())
        })?;

        let session = self.clone();
        Ok(Disposable::new(move || {
            session.with_state(|state| {
                if state.live.remove(&id).is_some() {
                    state.calls.push(SessionCall::Dispose(label.to_string()));
                }
            });
        }))
    }
}
