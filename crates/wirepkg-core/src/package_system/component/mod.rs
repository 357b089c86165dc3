//! # Components
//!
//! A component is one runtime capability declared by a package manifest
//! entry. Loading publishes it to the session registry; unloading disposes
//! every registration the load acquired.
pub mod dissector;
pub mod file;
pub mod filter_macro;
pub mod library;
pub mod panel;
pub mod renderer;
pub mod style;
pub mod token;

use std::fmt;
use std::path::{Component as PathComponent, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::package_system::error::PackageSystemError;
use crate::package_system::session::{Contribution, Disposable, SessionRegistry};

pub use dissector::DissectorComponent;
pub use file::FileComponent;
pub use filter_macro::FilterMacroComponent;
pub use library::LibraryComponent;
pub use panel::PanelComponent;
pub use renderer::RendererComponent;
pub use style::StyleComponent;
pub use token::TokenComponent;

/// Closed set of component type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Token,
    PacketDissector,
    StreamDissector,
    AttrRenderer,
    LayerRenderer,
    Style,
    Panel,
    FilterMacro,
    FileImporter,
    FileExporter,
    Library,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 11] = [
        ComponentKind::Token,
        ComponentKind::PacketDissector,
        ComponentKind::StreamDissector,
        ComponentKind::AttrRenderer,
        ComponentKind::LayerRenderer,
        ComponentKind::Style,
        ComponentKind::Panel,
        ComponentKind::FilterMacro,
        ComponentKind::FileImporter,
        ComponentKind::FileExporter,
        ComponentKind::Library,
    ];

    /// Manifest type tag
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Token => "core:token",
            ComponentKind::PacketDissector => "core:dissector:packet",
            ComponentKind::StreamDissector => "core:dissector:stream",
            ComponentKind::AttrRenderer => "core:renderer:attr",
            ComponentKind::LayerRenderer => "core:renderer:layer",
            ComponentKind::Style => "core:style",
            ComponentKind::Panel => "core:panel",
            ComponentKind::FilterMacro => "core:filter:macro",
            ComponentKind::FileImporter => "core:file:importer",
            ComponentKind::FileExporter => "core:file:exporter",
            ComponentKind::Library => "core:library",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized manifest type tag
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown component type: {0}")]
pub struct UnknownComponentKind(pub String);

impl FromStr for ComponentKind {
    type Err = UnknownComponentKind;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ComponentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownComponentKind(s.to_string()))
    }
}

/// State shared by every component: the injected session and the handles
/// acquired by the current load.
#[derive(Debug)]
pub struct ComponentBase {
    session: Arc<dyn SessionRegistry>,
    handles: Vec<Disposable>,
}

impl ComponentBase {
    pub fn new(session: Arc<dyn SessionRegistry>) -> Self {
        Self { session, handles: Vec::new() }
    }

    /// Registers `contribution` and keeps its handle until [`ComponentBase::release`]
    pub async fn register(&mut self, contribution: Contribution) -> Result<()> {
        let label = contribution.label();
        let handle = self
            .session
            .register(contribution)
            .await
            .map_err(PackageSystemError::from)?;
        log::debug!("Registered {}", label);
        self.handles.push(handle);
        Ok(())
    }

    /// Disposes every handle in acquisition order
    pub fn release(&mut self) {
        for handle in self.handles.drain(..) {
            handle.dispose();
        }
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }
}

/// Capability contract implemented by every component variant
#[async_trait]
pub trait Component: Send + Sync + fmt::Debug {
    fn kind(&self) -> ComponentKind;

    fn base_mut(&mut self) -> &mut ComponentBase;

    /// Publishes the component. `Ok(false)` reports a degraded load.
    async fn load(&mut self) -> Result<bool>;

    /// Withdraws everything `load` published. Safe to call repeatedly.
    async fn unload(&mut self) -> Result<bool> {
        self.base_mut().release();
        Ok(true)
    }
}

/// Rewrites path components equal to the packed archive name so native
/// loaders open the unpacked copy instead.
pub fn unpacked_path(path: &Path) -> PathBuf {
    path.components()
        .map(|component| match component {
            PathComponent::Normal(name) if name == constants::PACKED_ARCHIVE_SEGMENT => {
                PathComponent::Normal(constants::UNPACKED_ARCHIVE_SEGMENT.as_ref())
            }
            other => other,
        })
        .collect()
}
