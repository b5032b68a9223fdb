//! Upgrade command - runs the full pipeline against the real host.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use upgrade_kit::config::Config;
use upgrade_kit::error::UpgradeError;
use upgrade_kit::host::Host;
use upgrade_kit::kit::Kit;
use upgrade_kit::pipeline::{self, UpgradeContext};
use upgrade_kit::process::Cmd;

/// Execute the upgrade command.
pub fn cmd_upgrade(kit_dir: &Path, config: Config, json: bool, skip_network: bool) -> Result<()> {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        return Err(UpgradeError::PreconditionFailed(format!(
            "must run as root (running as uid {})",
            euid
        ))
        .into());
    }

    let kit = Kit::open(kit_dir)
        .map_err(|e| UpgradeError::PreconditionFailed(format!("{:#}", e)))?;
    let host = Host::system(&config);
    let mut ctx = UpgradeContext::new(kit, config);
    ctx.skip_network = skip_network;

    let report = pipeline::run(&ctx, &host)?;

    Cmd::new("sync")
        .error_msg("Failed to flush filesystem buffers")
        .run()?;

    report.log_summary();
    if json {
        let out = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", out);
    }
    info!("Upgrade complete");
    Ok(())
}
