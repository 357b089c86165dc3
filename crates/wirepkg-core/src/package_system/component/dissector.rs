use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::error::Result;
use crate::package_system::component::{Component, ComponentBase, ComponentKind, unpacked_path};
use crate::package_system::session::{Contribution, SessionRegistry};

/// Native packet or stream dissector library
#[derive(Debug)]
pub struct DissectorComponent {
    base: ComponentBase,
    stream: bool,
    library: PathBuf,
}

impl DissectorComponent {
    pub fn new(session: Arc<dyn SessionRegistry>, stream: bool, library: PathBuf) -> Self {
        Self { base: ComponentBase::new(session), stream, library }
    }
}

#[async_trait]
impl Component for DissectorComponent {
    fn kind(&self) -> ComponentKind {
        if self.stream { ComponentKind::StreamDissector } else { ComponentKind::PacketDissector }
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    async fn load(&mut self) -> Result<bool> {
        let library = unpacked_path(&self.library);
        self.base.register(Contribution::Dissector { stream: self.stream, library }).await?;
        Ok(true)
    }
}
