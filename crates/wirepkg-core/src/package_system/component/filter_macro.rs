use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::error::Result;
use crate::package_system::component::{Component, ComponentBase, ComponentKind};
use crate::package_system::session::{Contribution, SessionRegistry};

/// Filter expression macro module
#[derive(Debug)]
pub struct FilterMacroComponent {
    base: ComponentBase,
    module: PathBuf,
}

impl FilterMacroComponent {
    pub fn new(session: Arc<dyn SessionRegistry>, module: PathBuf) -> Self {
        Self { base: ComponentBase::new(session), module }
    }
}

#[async_trait]
impl Component for FilterMacroComponent {
    fn kind(&self) -> ComponentKind {
        ComponentKind::FilterMacro
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    async fn load(&mut self) -> Result<bool> {
        self.base.register(Contribution::FilterMacro { module: self.module.clone() }).await?;
        Ok(true)
    }
}
