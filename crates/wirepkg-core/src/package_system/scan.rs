//! Manifest discovery over the built-in and user package trees.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use globset::{Glob, GlobMatcher};
use walkdir::WalkDir;

use crate::kernel::constants;
use crate::package_system::env::PackageEnv;
use crate::package_system::manifest::PackageManifest;
use crate::package_system::record::PackageOrigin;

/// A manifest found and parsed during a scan
#[derive(Debug, Clone)]
pub struct DiscoveredPackage {
    pub id: String,
    pub origin: PackageOrigin,
    pub directory: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: PackageManifest,
}

/// Result of scanning both trees
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Parsed packages, built-in first, each tree in path order
    pub packages: Vec<DiscoveredPackage>,
    /// Manifests that failed to parse, with the reason
    pub failures: Vec<(PathBuf, String)>,
}

fn manifest_matcher() -> Option<GlobMatcher> {
    let pattern = format!("**/{}", constants::MANIFEST_FILE_NAME);
    match Glob::new(&pattern) {
        Ok(glob) => Some(glob.compile_matcher()),
        Err(e) => {
            log::error!("Invalid manifest pattern '{}': {}", pattern, e);
            None
        }
    }
}

/// Lists manifest files under `root`, skipping dependency directories.
/// A missing root yields nothing.
pub(crate) fn find_manifest_files(root: &Path) -> Vec<PathBuf> {
    if !root.is_dir() {
        log::debug!("Package tree {} does not exist, skipping", root.display());
        return Vec::new();
    }
    let Some(matcher) = manifest_matcher() else {
        return Vec::new();
    };

    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != constants::DEPENDENCY_DIR_NAME);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Error walking {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if matcher.is_match(relative) {
            found.push(entry.into_path());
        }
    }
    found
}

/// Derives the package id for the manifest directory `dir` found under `root`
pub fn package_id(origin: PackageOrigin, root: &Path, dir: &Path) -> Option<String> {
    let relative = dir.strip_prefix(root).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }
    match origin {
        PackageOrigin::Builtin => {
            let name = dir.file_name()?.to_string_lossy();
            Some(format!("{}/{}", constants::BUILTIN_ID_PREFIX, name))
        }
        PackageOrigin::User => {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            Some(parts.join("/"))
        }
    }
}

async fn list_tree(origin: PackageOrigin, root: PathBuf) -> Vec<(PackageOrigin, PathBuf, PathBuf)> {
    let walk_root = root.clone();
    match tokio::task::spawn_blocking(move || find_manifest_files(&walk_root)).await {
        Ok(files) => files.into_iter().map(|file| (origin, root.clone(), file)).collect(),
        Err(e) => {
            log::error!("Manifest discovery task for {} failed: {}", root.display(), e);
            Vec::new()
        }
    }
}

/// Scans both package trees concurrently and parses every manifest
/// concurrently. Parse failures are logged and reported, never fatal.
pub async fn scan_packages(env: &PackageEnv) -> ScanOutcome {
    let (builtin, user) = tokio::join!(
        list_tree(PackageOrigin::Builtin, env.builtin_package_dir.clone()),
        list_tree(PackageOrigin::User, env.user_package_dir.clone()),
    );

    let parsed = join_all(builtin.into_iter().chain(user).map(|(origin, root, file)| async move {
        let result = PackageManifest::load(&file).await;
        (origin, root, file, result)
    }))
    .await;

    let mut outcome = ScanOutcome::default();
    let mut seen = HashSet::new();
    for (origin, root, manifest_path, result) in parsed {
        let manifest = match result {
            Ok(manifest) => manifest,
            Err(e) => {
                log::warn!("Skipping unreadable manifest {}: {}", manifest_path.display(), e);
                outcome.failures.push((manifest_path, e.to_string()));
                continue;
            }
        };

        let directory = manifest_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let Some(id) = package_id(origin, &root, &directory) else {
            log::debug!("Ignoring manifest at package tree root {}", manifest_path.display());
            continue;
        };
        if origin == PackageOrigin::User && id.split('/').next() == Some(constants::BUILTIN_ID_PREFIX) {
            let reason = format!(
                "user package id '{}' is inside the reserved '{}' namespace",
                id,
                constants::BUILTIN_ID_PREFIX
            );
            log::warn!("Skipping {}: {}", manifest_path.display(), reason);
            outcome.failures.push((manifest_path, reason));
            continue;
        }
        if !seen.insert(id.clone()) {
            log::warn!(
                "Duplicate package id '{}' at {}, keeping the first manifest",
                id,
                manifest_path.display()
            );
            continue;
        }

        outcome.packages.push(DiscoveredPackage { id, origin, directory, manifest_path, manifest });
    }
    outcome
}
