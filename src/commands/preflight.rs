//! Preflight command - runs preflight checks.

use anyhow::Result;
use std::path::Path;

use upgrade_kit::config::Config;
use upgrade_kit::preflight;

/// Execute the preflight command.
pub fn cmd_preflight(kit_dir: &Path, config: &Config, strict: bool) -> Result<()> {
    if strict {
        preflight::run_preflight_or_fail(kit_dir, config)?;
    } else {
        let report = preflight::run_preflight(kit_dir, config);
        report.print();
        if !report.all_passed() {
            println!("Some checks failed. Use --strict to fail on them.");
        }
    }
    Ok(())
}
