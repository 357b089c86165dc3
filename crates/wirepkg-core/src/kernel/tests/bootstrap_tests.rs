use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use crate::event::{Event, EventResult, SystemEvent, sync_event_handler};
use crate::kernel::bootstrap::Application;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::package_system::env::PackageEnv;
use crate::package_system::manager::PackageManager;
use crate::package_system::session::MemorySession;

fn setup_env(temp: &TempDir) -> PackageEnv {
    let env = PackageEnv::new(temp.path().join("resources"), temp.path().join("user"), "default", "1.4.0");
    let eth = env.builtin_package_dir.join("eth");
    std::fs::create_dir_all(&eth).expect("create package dir");
    std::fs::write(
        eth.join("package.json"),
        r#"{ "name": "eth", "version": "1.0.0", "engines": { "host": "^1.0.0" },
             "components": [{ "type": "core:filter:macro", "main": "macro.js" }] }"#,
    )
    .expect("write manifest");
    std::fs::write(eth.join("macro.js"), "").expect("write module");
    env
}

#[tokio::test]
async fn test_application_lifecycle() -> Result<()> {
    let temp = tempfile::tempdir().expect("Failed to create temporary directory");
    let session = MemorySession::new();
    let mut app = Application::new(setup_env(&temp), Arc::new(session.clone())).await?;
    assert!(!app.is_initialized());

    let started = Arc::new(AtomicUsize::new(0));
    let started_clone = Arc::clone(&started);
    app.events()
        .register_handler(
            "application.start",
            sync_event_handler(move |_event: &dyn Event| {
                started_clone.fetch_add(1, Ordering::SeqCst);
                EventResult::Continue
            }),
        )
        .await;

    app.start().await?;
    assert!(app.is_initialized());
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert!(app.env().user_package_dir.is_dir());
    assert_eq!(session.live_count("filter:macro"), 1);

    let packages = app.package_manager().list().await;
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].id, "builtin/eth");

    app.shutdown().await?;
    assert!(!app.is_initialized());
    assert!(session.live().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_start_twice_fails() -> Result<()> {
    let temp = tempfile::tempdir().expect("Failed to create temporary directory");
    let mut app = Application::new(setup_env(&temp), Arc::new(MemorySession::new())).await?;
    app.start().await?;

    match app.start().await {
        Err(Error::KernelLifecycleError { phase, component_name, .. }) => {
            assert_eq!(phase, KernelLifecyclePhase::Start);
            assert!(component_name.is_none());
        }
        other => panic!("expected a lifecycle error, got {:?}", other),
    }
    app.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_initialize_failure_names_component() -> Result<()> {
    let temp = tempfile::tempdir().expect("Failed to create temporary directory");
    let env = setup_env(&temp);
    // A file where the user package directory should go
    std::fs::create_dir_all(&env.user_dir).expect("create user dir");
    std::fs::write(&env.user_package_dir, "").expect("block package dir");

    let mut app = Application::new(env, Arc::new(MemorySession::new())).await?;
    match app.start().await {
        Err(Error::KernelLifecycleError { phase, component_name, source, .. }) => {
            assert_eq!(phase, KernelLifecyclePhase::Initialize);
            assert_eq!(component_name.as_deref(), Some("DefaultPackageManager"));
            assert!(matches!(source.as_deref(), Some(Error::StorageSystem(_))));
        }
        other => panic!("expected a lifecycle error, got {:?}", other),
    }
    assert!(!app.is_initialized());
    Ok(())
}

#[tokio::test]
async fn test_shutdown_event_and_idle_shutdown() -> Result<()> {
    let temp = tempfile::tempdir().expect("Failed to create temporary directory");
    let mut app = Application::new(setup_env(&temp), Arc::new(MemorySession::new())).await?;

    // Nothing started yet
    app.shutdown().await?;

    let seen = Arc::new(AtomicUsize::new(0));
    let seen_clone = Arc::clone(&seen);
    app.events()
        .register_type_handler::<SystemEvent>(crate::event::sync_typed_handler(move |event: &SystemEvent| {
            if *event == SystemEvent::ApplicationShutdown {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
            EventResult::Continue
        }))
        .await;

    app.start().await?;
    app.shutdown().await?;
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    Ok(())
}
