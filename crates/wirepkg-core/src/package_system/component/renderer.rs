use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::error::Result;
use crate::package_system::component::{Component, ComponentBase, ComponentKind};
use crate::package_system::session::{Contribution, SessionRegistry};

/// Renderer module for one attribute or layer id
#[derive(Debug)]
pub struct RendererComponent {
    base: ComponentBase,
    layer: bool,
    id: String,
    module: PathBuf,
}

impl RendererComponent {
    pub fn new(session: Arc<dyn SessionRegistry>, layer: bool, id: String, module: PathBuf) -> Self {
        Self { base: ComponentBase::new(session), layer, id, module }
    }
}

#[async_trait]
impl Component for RendererComponent {
    fn kind(&self) -> ComponentKind {
        if self.layer { ComponentKind::LayerRenderer } else { ComponentKind::AttrRenderer }
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    async fn load(&mut self) -> Result<bool> {
        let contribution = Contribution::Renderer {
            layer: self.layer,
            id: self.id.clone(),
            module: self.module.clone(),
        };
        self.base.register(contribution).await?;
        Ok(true)
    }
}
