use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::error::Result;
use crate::package_system::component::{Component, ComponentBase, ComponentKind};
use crate::package_system::session::{Contribution, SessionRegistry};

#[derive(Debug)]
pub struct PanelComponent {
    base: ComponentBase,
    module: PathBuf,
    name: Option<String>,
    slot: Option<String>,
}

impl PanelComponent {
    pub fn new(
        session: Arc<dyn SessionRegistry>,
        module: PathBuf,
        name: Option<String>,
        slot: Option<String>,
    ) -> Self {
        Self { base: ComponentBase::new(session), module, name, slot }
    }
}

#[async_trait]
impl Component for PanelComponent {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Panel
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    async fn load(&mut self) -> Result<bool> {
        let contribution = Contribution::Panel {
            module: self.module.clone(),
            name: self.name.clone(),
            slot: self.slot.clone(),
        };
        self.base.register(contribution).await?;
        Ok(true)
    }
}
