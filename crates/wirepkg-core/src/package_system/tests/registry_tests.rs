use std::path::{Path, PathBuf};
use std::sync::Arc;

use semver::Version;
use serde_json::json;

use crate::package_system::component::{Component, FilterMacroComponent};
use crate::package_system::error::PackageSystemError;
use crate::package_system::manifest::PackageManifest;
use crate::package_system::record::{PackageOrigin, PackageRecord};
use crate::package_system::registry::PackageRegistry;
use crate::package_system::scan::DiscoveredPackage;
use crate::package_system::session::MemorySession;

fn record(id: &str, origin: PackageOrigin) -> PackageRecord {
    let manifest = PackageManifest::from_json(
        &json!({ "name": id, "version": "1.0.0", "engines": { "host": "^1.0.0" } }).to_string(),
        Path::new("package.json"),
    )
    .expect("valid manifest");
    let directory = PathBuf::from("/packages").join(id);
    PackageRecord::new(
        DiscoveredPackage {
            id: id.to_string(),
            origin,
            manifest_path: directory.join("package.json"),
            directory,
            manifest,
        },
        false,
        false,
    )
}

#[test]
fn test_insert_rejects_duplicates() {
    let mut registry = PackageRegistry::new();
    registry.insert(record("builtin/eth", PackageOrigin::Builtin)).expect("first insert");

    let err = registry.insert(record("builtin/eth", PackageOrigin::Builtin)).unwrap_err();
    assert!(matches!(err, PackageSystemError::DuplicatePackage(id) if id == "builtin/eth"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_ids_and_snapshot_sorted() {
    let mut registry = PackageRegistry::new();
    for (id, origin) in [("zeta", PackageOrigin::User), ("builtin/eth", PackageOrigin::Builtin), ("acme/tls", PackageOrigin::User)] {
        registry.insert(record(id, origin)).expect("insert");
    }

    assert_eq!(registry.ids(), vec!["acme/tls", "builtin/eth", "zeta"]);
    let snapshot = registry.snapshot(&Version::new(1, 4, 0));
    let ids: Vec<&str> = snapshot.iter().map(|info| info.id.as_str()).collect();
    assert_eq!(ids, vec!["acme/tls", "builtin/eth", "zeta"]);
    assert_eq!(snapshot[1].origin, PackageOrigin::Builtin);
    assert_eq!(snapshot[1].host_version, "1.4.0");
    assert_eq!(snapshot[1].status(), "enabled");
}

#[test]
fn test_take_and_restore_components() {
    let mut registry = PackageRegistry::new();
    registry.insert(record("pkg", PackageOrigin::User)).expect("insert");
    let session = Arc::new(MemorySession::new());
    let component: Box<dyn Component> = Box::new(FilterMacroComponent::new(session, PathBuf::from("/m.js")));

    assert!(registry.restore_components("pkg", vec![component]).is_none());
    assert!(registry.get("pkg").is_some_and(|r| r.is_loaded()));

    let taken = registry.take_components("pkg");
    assert_eq!(taken.len(), 1);
    assert!(registry.get("pkg").is_some_and(|r| !r.is_loaded()));

    registry.remove("pkg");
    let orphans = registry.restore_components("pkg", taken);
    assert_eq!(orphans.map(|c| c.len()), Some(1));
    assert!(registry.take_components("pkg").is_empty());
}

#[test]
fn test_status_strings() {
    let mut incompatible = record("old", PackageOrigin::User);
    incompatible.incompatible = true;
    incompatible.disabled = true;
    assert_eq!(
        incompatible.info(&Version::new(2, 0, 0)).status(),
        "incompatible (requires host ^1.0.0, host is 2.0.0)"
    );

    let mut disabled = record("off", PackageOrigin::User);
    disabled.disabled = true;
    disabled.dirty = true;
    assert_eq!(disabled.info(&Version::new(1, 0, 0)).status(), "disabled");

    let mut dirty = record("dirty", PackageOrigin::User);
    dirty.dirty = true;
    assert_eq!(dirty.info(&Version::new(1, 0, 0)).status(), "dirty (restart required)");
}
