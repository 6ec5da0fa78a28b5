//! fsupdatectl - bench driver for the fs-update step handler.
//!
//! Runs a single handler phase against a local deployment manifest and
//! prints the phase result the host workflow would see. Useful on the
//! bench and in board bring-up, where the full agent and cloud plumbing
//! are not available but the updater, the trampoline and a control
//! client are.

mod cli;
mod manifest_workflow;

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fsupdate_common::manifest::DeploymentManifest;
use fsupdate_common::HandlerConfig;
use fsupdate_handler::StepHandler;

use cli::{Cli, Phase};
use manifest_workflow::{ManifestWorkflow, StagedDownloader};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "fsupdatectl=info,fsupdate_handler=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.manifest)
        .with_context(|| format!("reading manifest {}", cli.manifest.display()))?;
    let manifest = DeploymentManifest::from_json(&raw)
        .with_context(|| format!("parsing manifest {}", cli.manifest.display()))?;

    let mut config = HandlerConfig::load();
    if let Some(work_dir) = &cli.work_dir {
        config.work_dir = work_dir.clone();
    }
    if let Some(shell) = &cli.shell {
        config.adu_shell_path = shell.clone();
    }
    if cli.timeout_secs.is_some() {
        config.poll_timeout_secs = cli.timeout_secs;
    }

    let handler = StepHandler::new(config);
    let workflow = ManifestWorkflow::new(manifest, cli.work_folder.clone());

    let result = match cli.phase {
        Phase::IsInstalled => handler.is_installed(&workflow),
        Phase::Download => handler.download(&workflow, &StagedDownloader),
        Phase::Install => handler.install(&workflow),
        Phase::Apply => handler.apply(&workflow),
        Phase::Cancel => handler.cancel(&workflow),
        Phase::Backup => handler.backup(&workflow),
        Phase::Restore => handler.restore(&workflow),
    };

    if result.is_failure() {
        println!("{} {} → {}", "✗".red(), cli.phase, result.to_string().red());
    } else {
        println!("{} {} → {}", "✓".green(), cli.phase, result.to_string().green());
    }
    if workflow.reboot_requested() {
        println!("{}", "  device reboot requested; reboot the board to continue".yellow());
    }

    if result.is_failure() {
        std::process::exit(1);
    }
    Ok(())
}
