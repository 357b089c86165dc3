use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::error::{Error, Result};
use crate::package_system::component::{Component, ComponentBase, ComponentKind};
use crate::package_system::session::{Contribution, SessionRegistry};

/// Stylesheets, one registration per file
#[derive(Debug)]
pub struct StyleComponent {
    base: ComponentBase,
    files: Vec<PathBuf>,
}

impl StyleComponent {
    pub fn new(session: Arc<dyn SessionRegistry>, files: Vec<PathBuf>) -> Self {
        Self { base: ComponentBase::new(session), files }
    }
}

#[async_trait]
impl Component for StyleComponent {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Style
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    async fn load(&mut self) -> Result<bool> {
        let reads = self.files.iter().map(|file| async move {
            tokio::fs::read_to_string(file)
                .await
                .map(|css| Contribution::Style { path: file.clone(), css })
                .map_err(|e| Error::io(e, "read_stylesheet", file.clone()))
        });
        let sheets = futures::future::try_join_all(reads).await?;

        for sheet in sheets {
            if let Err(e) = self.base.register(sheet).await {
                self.base.release();
                return Err(e);
            }
        }
        Ok(true)
    }
}
