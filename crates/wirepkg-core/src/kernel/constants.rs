/// Application name
pub const APP_NAME: &str = "wirepkg";

/// Host application version that package engine ranges are matched against
pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Key under a manifest's `engines` table naming the host range
pub const ENGINE_NAME: &str = "host";

/// Manifest file name looked up in every package directory
pub const MANIFEST_FILE_NAME: &str = "package.json";

/// Nested dependency directories never scanned for manifests
pub const DEPENDENCY_DIR_NAME: &str = "node_modules";

/// Prefix for ids of packages found in the built-in tree
pub const BUILTIN_ID_PREFIX: &str = "builtin";

/// User package directory, relative to the user directory
pub const USER_PACKAGE_DIR: &str = "package";

/// Profile directory, relative to the user directory
pub const USER_PROFILE_DIR: &str = "profile";

/// Cache directory, relative to the user directory
pub const CACHE_DIR: &str = "cache";

/// Default profile name
pub const DEFAULT_PROFILE: &str = "default";

/// Profile configuration file name
pub const PROFILE_CONFIG_FILE: &str = "config.json";

/// Version stamp written into the user directory by `init`
pub const VERSION_FILE_NAME: &str = ".version";

/// Marker file flagging a user package directory for removal on `cleanup`
pub const REMOVE_MARKER_FILE: &str = ".removeme";

/// Config key holding the list of disabled package ids
pub const DISABLED_PACKAGES_KEY: &str = "_.disabledPackages";

/// Config key holding the component type tags activated in this process
pub const ACTIVATED_COMPONENTS_KEY: &str = "_.activatedComponents";

/// Config key holding the build profiles searched for native artifacts
pub const BUILD_PROFILES_KEY: &str = "_.buildProfiles";

/// Build profiles searched when no configuration overrides them
pub const DEFAULT_BUILD_PROFILES: &[&str] = &["debug", "release"];

/// Dynamic library extensions accepted by the native artifact search
pub const NATIVE_LIBRARY_EXTENSIONS: &[&str] = &["dll", "so", "dylib"];

/// Path segment of archived application resources
pub const PACKED_ARCHIVE_SEGMENT: &str = "app.asar";

/// Replacement segment pointing at the unpacked copy of archived resources
pub const UNPACKED_ARCHIVE_SEGMENT: &str = "app.asar.unpacked";
