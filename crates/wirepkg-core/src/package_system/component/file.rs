use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::error::Result;
use crate::package_system::component::{Component, ComponentBase, ComponentKind, unpacked_path};
use crate::package_system::session::{Contribution, SessionRegistry};

/// Capture file importer or exporter
#[derive(Debug)]
pub struct FileComponent {
    base: ComponentBase,
    exporter: bool,
    module: PathBuf,
    extensions: Vec<String>,
}

impl FileComponent {
    pub fn new(
        session: Arc<dyn SessionRegistry>,
        exporter: bool,
        module: PathBuf,
        extensions: Vec<String>,
    ) -> Self {
        Self { base: ComponentBase::new(session), exporter, module, extensions }
    }
}

#[async_trait]
impl Component for FileComponent {
    fn kind(&self) -> ComponentKind {
        if self.exporter { ComponentKind::FileExporter } else { ComponentKind::FileImporter }
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    async fn load(&mut self) -> Result<bool> {
        let module = unpacked_path(&self.module);
        let extensions = self.extensions.clone();
        let (handler, extension_list) = if self.exporter {
            (Contribution::Exporter { module }, Contribution::ExporterExtensions { extensions })
        } else {
            (Contribution::Importer { module }, Contribution::ImporterExtensions { extensions })
        };

        self.base.register(handler).await?;
        if let Err(e) = self.base.register(extension_list).await {
            // Both registrations or neither
            self.base.release();
            return Err(e);
        }
        Ok(true)
    }
}
