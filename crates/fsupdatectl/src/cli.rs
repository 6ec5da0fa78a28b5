//! CLI - Command-line argument parsing
//!
//! Defines the CLI structure using clap. Keeps argument parsing
//! separate from execution logic. One subcommand per handler phase;
//! the manifest and the work folder describe the update under test.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bench driver for the fs-update step handler.
///
/// Runs one handler phase against a local deployment manifest, the way
/// the host workflow framework would, and prints the phase result.
#[derive(Parser)]
#[command(name = "fsupdatectl")]
#[command(about = "Drive fs-update step handler phases from a deployment manifest", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the deployment manifest (JSON)
    #[arg(long, global = true, default_value = "manifest.json")]
    pub manifest: PathBuf,

    /// Work folder holding the staged payload
    #[arg(long, global = true, default_value = ".")]
    pub work_folder: PathBuf,

    /// Sentinel work directory (overrides config and environment)
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    /// Path to the adu-shell trampoline (overrides config and environment)
    #[arg(long, global = true)]
    pub shell: Option<PathBuf>,

    /// Give up on a missing control client after this many seconds
    /// (default: wait forever, like the production handler)
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub phase: Phase,
}

/// Handler phases, in workflow order.
#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Check whether the installed criteria is already satisfied
    IsInstalled,
    /// Publish metadata, wait for the download permission, stage the payload
    Download,
    /// Wait for the install permission and write the update image
    Install,
    /// Drive the armed swap to its reboot
    Apply,
    /// Roll a half-done update back
    Cancel,
    /// No-op, for interface completeness
    Backup,
    /// No-op, for interface completeness
    Restore,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::IsInstalled => "IsInstalled",
            Self::Download => "Download",
            Self::Install => "Install",
            Self::Apply => "Apply",
            Self::Cancel => "Cancel",
            Self::Backup => "Backup",
            Self::Restore => "Restore",
        };
        write!(f, "{}", name)
    }
}
