use std::collections::HashMap;
use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::package_system::error::PackageSystemError;
use crate::package_system::version::{VersionRange, parse_version};

// --- Intermediate struct for deserialization ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawPackageManifest {
    #[serde(default)]
    name: String,
    version: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    engines: HashMap<String, String>,
    #[serde(default)]
    components: Vec<ComponentEntry>,
    #[serde(default)]
    config_schema: Option<serde_json::Value>,
}

/// One entry of a manifest's `components` list, as declared
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// Type tag, e.g. `core:dissector:packet`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
}

impl ComponentEntry {
    pub fn new(kind: &str) -> Self {
        Self { kind: kind.to_string(), ..Self::default() }
    }

    pub fn with_main(mut self, main: &str) -> Self {
        self.main = Some(main.to_string());
        self
    }
}

/// Parsed `package.json`
#[derive(Debug, Clone)]
pub struct PackageManifest {
    pub name: String,
    pub version: Version,
    pub description: String,
    /// `engines.host` as written, `*` when absent
    pub engine_constraint: String,
    /// Parsed range; `None` when the constraint is unparsable
    pub engine_range: Option<VersionRange>,
    pub components: Vec<ComponentEntry>,
    pub config_schema: Option<serde_json::Value>,
}

impl PackageManifest {
    /// Parses manifest JSON. `path` only labels errors.
    pub fn from_json(content: &str, path: &Path) -> std::result::Result<Self, PackageSystemError> {
        let raw: RawPackageManifest = serde_json::from_str(content).map_err(|e| {
            PackageSystemError::ManifestError {
                path: path.to_path_buf(),
                message: format!("Failed to parse manifest JSON: {}", e),
                source: Some(Box::new(e)),
            }
        })?;

        let version = parse_version(&raw.version).map_err(|e| PackageSystemError::ManifestError {
            path: path.to_path_buf(),
            message: format!("Invalid package version '{}'", raw.version),
            source: Some(Box::new(e)),
        })?;

        let engine_constraint = raw
            .engines
            .get(constants::ENGINE_NAME)
            .cloned()
            .unwrap_or_else(|| "*".to_string());
        let engine_range = match VersionRange::from_constraint(&engine_constraint) {
            Ok(range) => Some(range),
            Err(e) => {
                log::warn!("{}: {}; package will be treated as incompatible", path.display(), e);
                None
            }
        };

        Ok(Self {
            name: raw.name,
            version,
            description: raw.description,
            engine_constraint,
            engine_range,
            components: raw.components,
            config_schema: raw.config_schema,
        })
    }

    /// Reads and parses the manifest at `path`
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(e, "read_manifest", path.to_path_buf()))?;
        Ok(Self::from_json(&content, path)?)
    }

    /// Whether the host version satisfies the engine range
    pub fn is_compatible_with(&self, host_version: &Version) -> bool {
        self.engine_range
            .as_ref()
            .is_some_and(|range| range.includes(host_version))
    }

    /// The configuration schema, if it is a JSON object
    pub fn config_schema_object(&self) -> Option<&serde_json::Value> {
        self.config_schema.as_ref().filter(|schema| schema.is_object())
    }
}
