use std::path::{Path, PathBuf};

use semver::Version;

use crate::kernel::constants;
use crate::package_system::version::coerce_version;

/// Filesystem locations and host version the package manager works against
#[derive(Debug, Clone)]
pub struct PackageEnv {
    /// Root of the built-in package tree
    pub builtin_package_dir: PathBuf,
    /// Per-user application directory
    pub user_dir: PathBuf,
    /// Root of the user package tree
    pub user_package_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Directory of the active profile
    pub profile_dir: PathBuf,
    /// Host version, coerced to `major.minor.patch`
    pub host_version: Version,
}

impl PackageEnv {
    /// Lays out the standard user directory structure under `user_dir`.
    ///
    /// `host_version` is coerced, so `"2.1.0-beta.3"` and `"v2.1"` are both
    /// accepted; unparsable input falls back to `0.0.0` with a warning.
    pub fn new(
        builtin_package_dir: impl Into<PathBuf>,
        user_dir: impl Into<PathBuf>,
        profile: &str,
        host_version: &str,
    ) -> Self {
        let user_dir = user_dir.into();
        let host_version = coerce_version(host_version).unwrap_or_else(|| {
            log::warn!("Unparsable host version '{}', using 0.0.0", host_version);
            Version::new(0, 0, 0)
        });
        Self {
            builtin_package_dir: builtin_package_dir.into(),
            user_package_dir: user_dir.join(constants::USER_PACKAGE_DIR),
            cache_dir: user_dir.join(constants::CACHE_DIR),
            profile_dir: user_dir.join(constants::USER_PROFILE_DIR).join(profile),
            user_dir,
            host_version,
        }
    }

    /// Profile configuration file
    pub fn config_path(&self) -> PathBuf {
        self.profile_dir.join(constants::PROFILE_CONFIG_FILE)
    }

    /// Whether `path` lies inside the user package tree
    pub fn is_user_path(&self, path: &Path) -> bool {
        path.starts_with(&self.user_package_dir)
    }
}
