use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::storage::error::StorageSystemError;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// In-memory representation of configuration data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigData {
    /// Raw configuration values, keyed by dotted name
    #[serde(flatten)]
    values: HashMap<String, serde_json::Value>,
}

impl ConfigData {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a configuration value; `None` when absent or of the wrong shape
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values.get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Set a configuration value
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value).map_err(|e| StorageSystemError::SerializationError {
            format: "json".to_string(),
            source: Box::new(e),
        })?;
        self.values.insert(key.to_string(), json_value);
        Ok(())
    }

    /// Remove a configuration value
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.values.remove(key)
    }

    /// Check if key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        let serialized = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(&self)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(&self)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(&self)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        };
        serialized.map_err(|source| {
            StorageSystemError::SerializationError { format: format.extension().to_string(), source }.into()
        })
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        let parsed = match format {
            ConfigFormat::Json => serde_json::from_str(data)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        };
        parsed.map_err(|source| {
            StorageSystemError::DeserializationError { format: format.extension().to_string(), source }.into()
        })
    }
}

/// File-backed profile configuration.
///
/// Every `set` rewrites the whole file atomically (temporary file in the same
/// directory, then rename), so readers in other processes never observe a
/// half-written profile.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    format: ConfigFormat,
    data: Mutex<ConfigData>,
}

impl ConfigStore {
    /// Opens the store at `path`, loading existing contents if the file exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = ConfigFormat::from_path(&path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.clone()))?;
        let data = Self::read(&path, format).await?;
        Ok(Self { path, format, data: Mutex::new(data) })
    }

    async fn read(path: &Path, format: ConfigFormat) -> Result<ConfigData> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) if content.trim().is_empty() => Ok(ConfigData::new()),
            Ok(content) => ConfigData::deserialize(&content, format),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigData::new()),
            Err(e) => Err(Error::io(e, "read_config", path.to_path_buf())),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the backing file, discarding the in-memory copy.
    pub async fn reload(&self) -> Result<()> {
        let fresh = Self::read(&self.path, self.format).await?;
        *self.data.lock().await = fresh;
        Ok(())
    }

    /// Copy of the current configuration
    pub async fn snapshot(&self) -> ConfigData {
        self.data.lock().await.clone()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data.lock().await.get(key)
    }

    /// Sets `key` and persists the whole configuration.
    pub async fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let mut data = self.data.lock().await;
        let mut updated = data.clone();
        updated.set(key, value)?;
        let serialized = updated.serialize(self.format)?;
        write_atomic(self.path.clone(), serialized).await?;
        *data = updated;
        Ok(())
    }

    /// Ids of packages the user has disabled
    pub async fn disabled_packages(&self) -> HashSet<String> {
        let data = self.data.lock().await;
        self.read_disabled(&data)
    }

    fn read_disabled(&self, data: &ConfigData) -> HashSet<String> {
        if data.contains_key(constants::DISABLED_PACKAGES_KEY)
            && data.get::<Vec<String>>(constants::DISABLED_PACKAGES_KEY).is_none()
        {
            log::warn!(
                "Ignoring malformed '{}' in {}",
                constants::DISABLED_PACKAGES_KEY,
                self.path.display()
            );
        }
        data.get_or::<Vec<String>>(constants::DISABLED_PACKAGES_KEY, Vec::new())
            .into_iter()
            .collect()
    }

    /// Replaces the disabled package list. Ids are stored sorted.
    pub async fn set_disabled_packages(&self, ids: &HashSet<String>) -> Result<()> {
        let sorted: BTreeSet<&String> = ids.iter().collect();
        self.set(constants::DISABLED_PACKAGES_KEY, sorted).await
    }

    /// Applies `update` to the disabled package list under a single lock.
    /// The list is persisted only when `update` returns true; that value is
    /// returned.
    pub async fn update_disabled_packages<F>(&self, update: F) -> Result<bool>
    where
        F: FnOnce(&mut HashSet<String>) -> bool,
    {
        let mut data = self.data.lock().await;
        let mut ids = self.read_disabled(&data);
        if !update(&mut ids) {
            return Ok(false);
        }

        let sorted: BTreeSet<&String> = ids.iter().collect();
        let mut updated = data.clone();
        updated.set(constants::DISABLED_PACKAGES_KEY, sorted)?;
        let serialized = updated.serialize(self.format)?;
        write_atomic(self.path.clone(), serialized).await?;
        *data = updated;
        Ok(true)
    }
}

async fn write_atomic(path: PathBuf, contents: String) -> Result<()> {
    let result = tokio::task::spawn_blocking(move || -> Result<()> {
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent)
            .map_err(|e| Error::io(e, "create_config_dir", parent.clone()))?;
        let mut file = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| Error::io(e, "create_temp_config", parent.clone()))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| Error::io(e, "write_temp_config", file.path().to_path_buf()))?;
        file.persist(&path)
            .map_err(|e| Error::io(e.error, "persist_config", path.clone()))?;
        Ok(())
    })
    .await;

    match result {
        Ok(inner) => inner,
        Err(join_err) => Err(StorageSystemError::OperationFailed {
            operation: "write_config".to_string(),
            path: PathBuf::new(),
            message: join_err.to_string(),
        }
        .into()),
    }
}
