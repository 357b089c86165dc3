use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::package_system::component::Component;
use crate::package_system::manifest::PackageManifest;
use crate::package_system::scan::DiscoveredPackage;
use crate::package_system::session::Disposable;

/// Which package tree a record was discovered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageOrigin {
    Builtin,
    User,
}

impl fmt::Display for PackageOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageOrigin::Builtin => write!(f, "builtin"),
            PackageOrigin::User => write!(f, "user"),
        }
    }
}

/// Registry entry for one discovered package
#[derive(Debug)]
pub struct PackageRecord {
    pub id: String,
    pub directory: PathBuf,
    pub manifest_path: PathBuf,
    pub origin: PackageOrigin,
    pub manifest: PackageManifest,
    pub incompatible: bool,
    pub disabled: bool,
    /// Set once a component failed to load or unload after bootstrap; never cleared
    pub dirty: bool,
    /// Components in declaration order, empty unless active
    pub components: Vec<Box<dyn Component>>,
    pub config_schema_handle: Option<Disposable>,
    /// Why the component list could not be built, if it could not
    pub construction_error: Option<String>,
}

impl PackageRecord {
    pub fn new(discovered: DiscoveredPackage, incompatible: bool, disabled: bool) -> Self {
        Self {
            id: discovered.id,
            directory: discovered.directory,
            manifest_path: discovered.manifest_path,
            origin: discovered.origin,
            manifest: discovered.manifest,
            incompatible,
            disabled,
            dirty: false,
            components: Vec::new(),
            config_schema_handle: None,
            construction_error: None,
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.origin == PackageOrigin::Builtin
    }

    /// Enabled, compatible, and holding live components
    pub fn is_loaded(&self) -> bool {
        !self.components.is_empty()
    }

    /// Releases the schema registration, if any
    pub fn dispose_schema(&mut self) {
        if let Some(handle) = self.config_schema_handle.take() {
            handle.dispose();
        }
    }

    pub fn info(&self, host_version: &semver::Version) -> PackageInfo {
        PackageInfo {
            id: self.id.clone(),
            name: self.manifest.name.clone(),
            description: self.manifest.description.clone(),
            version: self.manifest.version.to_string(),
            origin: self.origin,
            directory: self.directory.clone(),
            engine_range: self.manifest.engine_constraint.clone(),
            host_version: host_version.to_string(),
            incompatible: self.incompatible,
            disabled: self.disabled,
            dirty: self.dirty,
            components: self.manifest.components.iter().map(|c| c.kind.clone()).collect(),
            loaded: self.is_loaded(),
            construction_error: self.construction_error.clone(),
        }
    }
}

/// Serializable snapshot of a [`PackageRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub origin: PackageOrigin,
    pub directory: PathBuf,
    pub engine_range: String,
    pub host_version: String,
    pub incompatible: bool,
    pub disabled: bool,
    pub dirty: bool,
    /// Declared component type tags
    pub components: Vec<String>,
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub construction_error: Option<String>,
}

impl PackageInfo {
    /// Status line as shown by the command line
    pub fn status(&self) -> String {
        if self.incompatible {
            format!("incompatible (requires host {}, host is {})", self.engine_range, self.host_version)
        } else if self.disabled {
            "disabled".to_string()
        } else if self.dirty {
            "dirty (restart required)".to_string()
        } else {
            "enabled".to_string()
        }
    }
}
