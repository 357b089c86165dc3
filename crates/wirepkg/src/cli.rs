use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Wirepkg: inspect and manage analyzer packages
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Built-in package tree (defaults to `resources/package` next to the executable)
    #[arg(long, global = true)]
    pub builtin_dir: Option<PathBuf>,

    /// Per-user directory (defaults to `~/.wirepkg`)
    #[arg(long, global = true)]
    pub user_dir: Option<PathBuf>,

    /// Profile whose configuration holds the disabled package list
    #[arg(long, global = true, default_value = wirepkg_core::kernel::constants::DEFAULT_PROFILE)]
    pub profile: String,

    /// Host version package engine ranges are matched against
    #[arg(long, global = true, default_value = wirepkg_core::kernel::constants::HOST_VERSION)]
    pub host_version: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every discovered package
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one package
    Info {
        /// Package id, e.g. `builtin/eth` or `acme/tls`
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Enable a package (persist setting)
    Enable { id: String },
    /// Disable a package (persist setting)
    Disable { id: String },
    /// Delete a user package
    Uninstall { id: String },
    /// Run a reconciliation pass and print what it did
    Reconcile {
        #[arg(long)]
        json: bool,
    },
}
