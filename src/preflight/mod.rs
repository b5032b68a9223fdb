//! Preflight checks.
//!
//! Verifies the host, the kit and the deployment before an upgrade touches
//! anything. Run with `upgrade-kit preflight`.

mod environment;
mod host_tools;
mod types;

use anyhow::{bail, Result};
use std::path::Path;

use crate::config::Config;

pub use types::{CheckResult, CheckStatus, PreflightReport};

/// Run all preflight checks.
pub fn run_preflight(kit_dir: &Path, config: &Config) -> PreflightReport {
    let mut checks = Vec::new();

    println!("Running preflight checks...\n");

    println!("Checking privileges...");
    checks.push(environment::check_root());

    println!("Checking host tools...");
    checks.extend(host_tools::check_host_tools());

    println!("Checking kit...");
    checks.extend(environment::check_kit(kit_dir));

    println!("Checking deployment...");
    checks.push(environment::check_target(config));

    println!();

    PreflightReport { checks }
}

/// Run preflight and bail if any checks fail.
pub fn run_preflight_or_fail(kit_dir: &Path, config: &Config) -> Result<()> {
    let report = run_preflight(kit_dir, config);
    report.print();

    if let Some(stage) = report.first_blocked_stage() {
        bail!(
            "Preflight failed: {} check(s) failed, the upgrade would stop at the {} stage",
            report.fail_count(),
            stage
        );
    }

    println!("All preflight checks passed!\n");
    Ok(())
}
