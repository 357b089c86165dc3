use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::error::{Error, Result};
use crate::package_system::component::{Component, ComponentBase, ComponentKind};
use crate::package_system::error::PackageSystemError;
use crate::package_system::session::{Contribution, SessionRegistry};

/// Filter tokens read from JSON token files.
///
/// A token file is either an array of names or an object whose keys are
/// the names.
#[derive(Debug)]
pub struct TokenComponent {
    base: ComponentBase,
    files: Vec<PathBuf>,
}

impl TokenComponent {
    pub fn new(session: Arc<dyn SessionRegistry>, files: Vec<PathBuf>) -> Self {
        Self { base: ComponentBase::new(session), files }
    }

    async fn read_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for file in &self.files {
            let content = tokio::fs::read_to_string(file)
                .await
                .map_err(|e| Error::io(e, "read_token_file", file.clone()))?;
            let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
                PackageSystemError::ComponentError {
                    component_type: ComponentKind::Token.to_string(),
                    operation: "load".to_string(),
                    message: format!("{}: {}", file.display(), e),
                }
            })?;
            match value {
                serde_json::Value::Array(items) => {
                    names.extend(items.into_iter().filter_map(|item| item.as_str().map(String::from)));
                }
                serde_json::Value::Object(map) => names.extend(map.into_iter().map(|(key, _)| key)),
                _ => {
                    return Err(PackageSystemError::ComponentError {
                        component_type: ComponentKind::Token.to_string(),
                        operation: "load".to_string(),
                        message: format!("{}: expected an array or object", file.display()),
                    }
                    .into());
                }
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl Component for TokenComponent {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Token
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    async fn load(&mut self) -> Result<bool> {
        let names = self.read_names().await?;
        self.base.register(Contribution::Tokens { names }).await?;
        Ok(true)
    }
}
