use std::path::Path;

use semver::Version;
use serde_json::json;

use crate::kernel::error::{Error, Result};
use crate::package_system::error::PackageSystemError;
use crate::package_system::manifest::{ComponentEntry, PackageManifest};

fn parse(value: serde_json::Value) -> std::result::Result<PackageManifest, PackageSystemError> {
    PackageManifest::from_json(&value.to_string(), Path::new("pkg/package.json"))
}

#[test]
fn test_full_manifest() {
    let manifest = parse(json!({
        "name": "ethernet",
        "version": "1.2.0",
        "description": "Ethernet dissector",
        "engines": { "host": "^1.2.0" },
        "components": [
            { "type": "core:dissector:packet", "main": "eth" },
            { "type": "core:file:importer", "main": "pcap.js", "extensions": ["pcap", "cap"] },
            { "type": "core:renderer:attr", "main": "mac.js", "id": "eth.src" }
        ],
        "configSchema": { "eth.promiscuous": { "type": "boolean" } }
    }))
    .expect("valid manifest");

    assert_eq!(manifest.name, "ethernet");
    assert_eq!(manifest.version, Version::new(1, 2, 0));
    assert_eq!(manifest.engine_constraint, "^1.2.0");
    assert!(manifest.is_compatible_with(&Version::new(1, 4, 0)));
    assert!(!manifest.is_compatible_with(&Version::new(2, 0, 0)));

    assert_eq!(manifest.components.len(), 3);
    assert_eq!(manifest.components[0], ComponentEntry::new("core:dissector:packet").with_main("eth"));
    assert_eq!(manifest.components[1].extensions, vec!["pcap", "cap"]);
    assert_eq!(manifest.components[2].id.as_deref(), Some("eth.src"));
    assert!(manifest.config_schema_object().is_some());
}

#[test]
fn test_defaults_for_optional_fields() {
    let manifest = parse(json!({ "version": "0.1.0" })).expect("minimal manifest");
    assert_eq!(manifest.name, "");
    assert_eq!(manifest.engine_constraint, "*");
    assert!(manifest.is_compatible_with(&Version::new(0, 0, 1)));
    assert!(manifest.components.is_empty());
    assert!(manifest.config_schema.is_none());
}

#[test]
fn test_unparsable_engine_range_is_incompatible() {
    let manifest = parse(json!({ "version": "1.0.0", "engines": { "host": "whenever" } }))
        .expect("manifest still parses");
    assert!(manifest.engine_range.is_none());
    assert!(!manifest.is_compatible_with(&Version::new(1, 0, 0)));
}

#[test]
fn test_non_object_schema_is_ignored() {
    let manifest = parse(json!({ "version": "1.0.0", "configSchema": ["not", "an", "object"] }))
        .expect("manifest still parses");
    assert!(manifest.config_schema.is_some());
    assert!(manifest.config_schema_object().is_none());
}

#[test]
fn test_rejects_bad_json_and_versions() {
    let err = PackageManifest::from_json("{ not json", Path::new("a/package.json")).unwrap_err();
    assert!(matches!(err, PackageSystemError::ManifestError { .. }));

    let missing = parse(json!({ "name": "no-version" })).unwrap_err();
    assert!(matches!(missing, PackageSystemError::ManifestError { .. }));

    let bad = parse(json!({ "version": "one" })).unwrap_err();
    match bad {
        PackageSystemError::ManifestError { path, message, .. } => {
            assert_eq!(path, Path::new("pkg/package.json"));
            assert!(message.contains("one"), "message should name the version: {}", message);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_load_from_disk() -> Result<()> {
    let dir = tempfile::tempdir().expect("Failed to create temporary directory");
    let path = dir.path().join("package.json");
    tokio::fs::write(&path, json!({ "name": "disk", "version": "2.0.0" }).to_string())
        .await
        .expect("write manifest");

    let manifest = PackageManifest::load(&path).await?;
    assert_eq!(manifest.name, "disk");

    let missing = PackageManifest::load(&dir.path().join("absent.json")).await;
    assert!(matches!(missing, Err(Error::StorageSystem(_))));
    Ok(())
}
