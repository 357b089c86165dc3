use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::event::{EventResult, PackageEvent, sync_typed_handler};
use crate::kernel::component::KernelComponent;
use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::package_system::error::PackageSystemError;
use crate::package_system::manager::{ManagerOptions, PackageManager};
use crate::package_system::session::SessionCall;
use crate::package_system::tests::common::{Fixture, macro_manifest, write_file, write_package};
use crate::storage::ConfigData;

#[tokio::test]
async fn test_uninstall_builtin_is_rejected() -> Result<()> {
    let fx = Fixture::new().await;
    write_package(&fx.builtin("eth"), &macro_manifest("1.0.0"));
    let manager = fx.manager();
    manager.reconcile().await?;

    let err = manager.uninstall("builtin/eth").await.unwrap_err();
    assert!(matches!(
        err,
        Error::PackageSystem(PackageSystemError::BuiltinUninstall { ref package_id }) if package_id == "builtin/eth"
    ));
    assert!(fx.builtin("eth").join("package.json").exists());
    assert!(manager.get("builtin/eth").await.is_some());
    Ok(())
}

#[tokio::test]
async fn test_uninstall_user_package() -> Result<()> {
    let fx = Fixture::new().await;
    write_package(&fx.user("acme/tls"), &macro_manifest("1.0.0"));
    let manager = fx.manager();
    manager.reconcile().await?;
    assert_eq!(fx.session.live_count("filter:macro"), 1);

    let uninstalled = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&uninstalled);
    fx.events
        .register_type_handler::<PackageEvent>(sync_typed_handler(move |event: &PackageEvent| {
            if let PackageEvent::Uninstalled { package_id } = event {
                seen.lock().expect("lock").push(package_id.clone());
            }
            EventResult::Continue
        }))
        .await;

    assert!(manager.uninstall("acme/tls").await?);
    assert!(!fx.user("acme/tls").exists());
    assert!(manager.get("acme/tls").await.is_none());
    assert!(manager.list().await.is_empty());
    assert_eq!(fx.session.live_count("filter:macro"), 0);
    assert_eq!(*uninstalled.lock().expect("lock"), vec!["acme/tls".to_string()]);

    // Unknown ids are a no-op
    assert!(!manager.uninstall("acme/tls").await?);
    Ok(())
}

#[tokio::test]
async fn test_disable_then_enable() -> Result<()> {
    let fx = Fixture::new().await;
    write_package(&fx.user("sample"), &macro_manifest("1.0.0"));
    let manager = fx.manager();
    manager.reconcile().await?;

    assert!(manager.disable("sample").await?);
    assert!(!manager.disable("sample").await?);
    assert_eq!(fx.config.disabled_packages().await, HashSet::from(["sample".to_string()]));
    assert_eq!(manager.get("sample").await.map(|info| info.status()), Some("disabled".to_string()));

    assert!(manager.enable("sample").await?);
    assert!(!manager.enable("sample").await?);
    assert!(fx.config.disabled_packages().await.is_empty());

    assert_eq!(
        fx.session.calls(),
        vec![
            SessionCall::Register("filter:macro".into()),
            SessionCall::Dispose("filter:macro".into()),
            SessionCall::Register("filter:macro".into()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_enable_disable_unknown_ids() -> Result<()> {
    let fx = Fixture::new().await;
    let manager = fx.manager();
    manager.reconcile().await?;

    assert!(matches!(
        manager.disable("ghost").await,
        Err(Error::PackageSystem(PackageSystemError::PackageNotFound(_)))
    ));
    assert!(matches!(
        manager.enable("ghost").await,
        Err(Error::PackageSystem(PackageSystemError::PackageNotFound(_)))
    ));

    // An id left in the disabled list can still be enabled after its package is gone
    fx.config.set_disabled_packages(&HashSet::from(["gone".to_string()])).await?;
    assert!(manager.enable("gone").await?);
    assert!(fx.config.disabled_packages().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_disabled_list_survives_reopen() -> Result<()> {
    let fx = Fixture::new().await;
    write_package(&fx.builtin("eth"), &macro_manifest("1.0.0"));
    let manager = fx.manager();
    manager.reconcile().await?;
    manager.disable("builtin/eth").await?;

    let reopened = crate::storage::ConfigStore::open(fx.env.config_path()).await?;
    assert_eq!(reopened.disabled_packages().await, HashSet::from(["builtin/eth".to_string()]));
    Ok(())
}

#[tokio::test]
async fn test_init_creates_layout_and_version_file() -> Result<()> {
    let fx = Fixture::new().await;
    std::fs::remove_dir_all(&fx.env.user_dir).expect("start without a user dir");
    let manager = fx.manager();

    manager.init().await?;
    assert!(fx.env.user_package_dir.is_dir());
    assert!(fx.env.cache_dir.is_dir());
    assert!(fx.env.profile_dir.is_dir());

    let stamp = std::fs::read_to_string(fx.env.user_dir.join(constants::VERSION_FILE_NAME)).expect("version file");
    let stamp: serde_json::Value = serde_json::from_str(&stamp).expect("version JSON");
    assert_eq!(stamp["host"], "1.4.0");
    assert_eq!(stamp["resource_path"], fx.env.builtin_package_dir.display().to_string());
    Ok(())
}

#[tokio::test]
async fn test_cleanup_removes_marked_packages() -> Result<()> {
    let fx = Fixture::new().await;
    write_package(&fx.user("keep"), &macro_manifest("1.0.0"));
    write_package(&fx.user("drop"), &macro_manifest("1.0.0"));
    write_file(&fx.user("drop"), constants::REMOVE_MARKER_FILE, "");
    // Marker without a manifest is not a package
    write_file(&fx.user("stray"), constants::REMOVE_MARKER_FILE, "");
    let manager = fx.manager();

    assert_eq!(manager.cleanup().await?, 1);
    assert!(fx.user("keep").exists());
    assert!(!fx.user("drop").exists());
    assert!(fx.user("stray").exists());
    Ok(())
}

#[tokio::test]
async fn test_kernel_lifecycle() -> Result<()> {
    let fx = Fixture::new().await;
    write_package(&fx.user("marked"), &macro_manifest("1.0.0"));
    write_file(&fx.user("marked"), constants::REMOVE_MARKER_FILE, "");
    write_package(&fx.builtin("eth"), &macro_manifest("1.0.0"));
    let manager = fx.manager();
    assert_eq!(manager.name(), "DefaultPackageManager");

    manager.initialize().await?;
    assert!(!fx.user("marked").exists());

    manager.start().await?;
    assert_eq!(manager.completed_passes(), 1);
    assert_eq!(fx.session.live_count("filter:macro"), 1);

    manager.stop().await?;
    assert!(fx.session.live().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_trigger_reconcile_runs_in_background() -> Result<()> {
    let fx = Fixture::new().await;
    write_package(&fx.user("bg"), &macro_manifest("1.0.0"));
    let manager = fx.manager();

    manager.trigger_reconcile();
    for _ in 0..100 {
        if manager.completed_passes() >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(manager.completed_passes(), 1);
    assert!(manager.get("bg").await.is_some_and(|info| info.loaded));
    Ok(())
}

#[test]
fn test_options_from_config() -> Result<()> {
    let defaults = ManagerOptions::default();
    assert!(defaults.activated_components.contains("core:library"));
    assert_eq!(defaults.build_profiles, vec!["debug", "release"]);
    assert_eq!(ManagerOptions::from_config(&ConfigData::new()), defaults);

    let mut config = ConfigData::new();
    config.set(constants::ACTIVATED_COMPONENTS_KEY, vec!["core:token", "core:style"])?;
    config.set(constants::BUILD_PROFILES_KEY, vec!["release"])?;
    let options = ManagerOptions::from_config(&config);
    assert_eq!(
        options.activated_components,
        HashSet::from(["core:token".to_string(), "core:style".to_string()])
    );
    assert_eq!(options.build_profiles, vec!["release"]);

    // An empty profile list falls back to the defaults
    config.set(constants::BUILD_PROFILES_KEY, Vec::<String>::new())?;
    assert_eq!(ManagerOptions::from_config(&config).build_profiles, vec!["debug", "release"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_disables_all_persist() -> Result<()> {
    let fx = Fixture::new().await;
    for i in 0..16 {
        write_package(&fx.user(&format!("p{}", i)), &macro_manifest("1.0.0"));
    }
    let manager = fx.manager();
    manager.reconcile().await?;

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.disable(&format!("p{}", i)).await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.expect("disable task")?);
    }

    let expected: HashSet<String> = (0..16).map(|i| format!("p{}", i)).collect();
    assert_eq!(fx.config.disabled_packages().await, expected);
    let reopened = crate::storage::ConfigStore::open(fx.env.config_path()).await?;
    assert_eq!(reopened.disabled_packages().await, expected);

    manager.reconcile().await?;
    let disabled = manager.list().await.into_iter().filter(|info| info.disabled).count();
    assert_eq!(disabled, 16);
    assert_eq!(fx.session.live_count("filter:macro"), 0);
    Ok(())
}

#[tokio::test]
async fn test_user_package_in_builtin_namespace_is_reported() -> Result<()> {
    let fx = Fixture::new().await;
    write_package(&fx.builtin("eth"), &macro_manifest("1.0.0"));
    write_package(&fx.user("builtin/eth"), &macro_manifest("2.0.0"));
    let manager = fx.manager();

    let report = manager.reconcile().await?;
    assert_eq!(report.added, vec!["builtin/eth"]);
    assert_eq!(report.parse_failures.len(), 1);

    let info = manager.get("builtin/eth").await.expect("builtin package listed");
    assert_eq!(info.version, "1.0.0");
    assert_eq!(info.directory, fx.builtin("eth"));
    Ok(())
}
