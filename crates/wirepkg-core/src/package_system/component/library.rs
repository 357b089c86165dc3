use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::error::Result;
use crate::package_system::component::{Component, ComponentBase, ComponentKind, unpacked_path};
use crate::package_system::session::{Contribution, SessionRegistry};

/// Native library linked into sessions created after registration.
///
/// Sessions that already exist never see the library, so `load` always
/// reports a degraded result and the owning package is flagged as needing
/// a restart when this happens after bootstrap.
#[derive(Debug)]
pub struct LibraryComponent {
    base: ComponentBase,
    path: PathBuf,
}

impl LibraryComponent {
    pub fn new(session: Arc<dyn SessionRegistry>, path: PathBuf) -> Self {
        Self { base: ComponentBase::new(session), path }
    }
}

#[async_trait]
impl Component for LibraryComponent {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Library
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    async fn load(&mut self) -> Result<bool> {
        let path = unpacked_path(&self.path);
        self.base.register(Contribution::Library { path }).await?;
        Ok(false)
    }
}
