mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{debug, error};

use cli::{CliArgs, Commands};
use wirepkg_core::kernel::constants;
use wirepkg_core::{Application, MemorySession, PackageEnv, PackageInfo, PackageManager, PassReport};

fn default_builtin_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("resources")
        .join(constants::USER_PACKAGE_DIR)
}

fn default_user_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(format!(".{}", constants::APP_NAME)))
}

fn print_package(info: &PackageInfo) {
    println!("{} {}", info.id, info.version);
    if !info.name.is_empty() {
        println!("  Name: {}", info.name);
    }
    if !info.description.is_empty() {
        println!("  Description: {}", info.description);
    }
    println!("  Origin: {}", info.origin);
    println!("  Directory: {}", info.directory.display());
    println!("  Engine: {}", info.engine_range);
    println!("  Status: {}", info.status());
    println!("  Components: {}", info.components.join(", "));
    if let Some(reason) = &info.construction_error {
        println!("  Construction error: {}", reason);
    }
}

fn print_report(report: &PassReport) {
    println!("Reconciliation pass {} finished.", report.pass);
    let sections = [
        ("Added", &report.added),
        ("Updated", &report.updated),
        ("Enabled", &report.enabled),
        ("Disabled", &report.disabled),
        ("Removed", &report.removed),
        ("Incompatible", &report.incompatible),
        ("Dirty", &report.dirty),
    ];
    for (label, ids) in sections {
        if !ids.is_empty() {
            println!("  {}: {}", label, ids.join(", "));
        }
    }
    for (id, reason) in &report.construction_failures {
        println!("  Failed to construct {}: {}", id, reason);
    }
    for (path, reason) in &report.parse_failures {
        println!("  Unreadable manifest {}: {}", path.display(), reason);
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize output: {}", e))
}

async fn run_command(app: &Application, command: Commands) -> Result<(), String> {
    let manager = app.package_manager();
    match command {
        Commands::List { json } => {
            let packages = manager.list().await;
            if json {
                println!("{}", to_json(&packages)?);
            } else if packages.is_empty() {
                println!("No packages found.");
            } else {
                for info in &packages {
                    println!("  - {} {} [{}] {}", info.id, info.version, info.origin, info.status());
                }
            }
        }
        Commands::Info { id, json } => {
            let info = manager.get(&id).await.ok_or_else(|| format!("Package '{}' not found", id))?;
            if json {
                println!("{}", to_json(&info)?);
            } else {
                print_package(&info);
            }
        }
        Commands::Enable { id } => match manager.enable(&id).await {
            Ok(true) => println!("Enabled package '{}'.", id),
            Ok(false) => println!("Package '{}' is already enabled.", id),
            Err(e) => return Err(format!("Error enabling package '{}': {}", id, e)),
        },
        Commands::Disable { id } => match manager.disable(&id).await {
            Ok(true) => println!("Disabled package '{}'.", id),
            Ok(false) => println!("Package '{}' is already disabled.", id),
            Err(e) => return Err(format!("Error disabling package '{}': {}", id, e)),
        },
        Commands::Uninstall { id } => match manager.uninstall(&id).await {
            Ok(true) => println!("Uninstalled package '{}'.", id),
            Ok(false) => println!("Package '{}' is not installed.", id),
            Err(e) => return Err(format!("Error uninstalling package '{}': {}", id, e)),
        },
        Commands::Reconcile { json } => {
            let report = manager.reconcile().await.map_err(|e| e.to_string())?;
            if json {
                println!("{}", to_json(&report)?);
            } else {
                print_report(&report);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = CliArgs::parse();

    let Some(user_dir) = args.user_dir.or_else(default_user_dir) else {
        eprintln!("Could not determine a home directory; pass --user-dir");
        return ExitCode::FAILURE;
    };
    let builtin_dir = args.builtin_dir.unwrap_or_else(default_builtin_dir);
    let env = PackageEnv::new(builtin_dir, user_dir, &args.profile, &args.host_version);
    debug!("Package environment: {:?}", env);

    let mut app = match Application::new(env, Arc::new(MemorySession::new())).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to initialize application: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = app.start().await {
        eprintln!("Failed to start application: {}", e);
        return ExitCode::FAILURE;
    }

    let outcome = run_command(&app, args.command).await;

    if let Err(e) = app.shutdown().await {
        error!("Application shutdown failed: {}", e);
    }
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}
