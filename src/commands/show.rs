//! Show command - displays information.

use anyhow::Result;
use std::path::Path;

use upgrade_kit::config::Config;
use upgrade_kit::kit::Kit;
use upgrade_kit::target;

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
    /// Show the declarations an upgrade would apply
    Plan,
    /// Show the located deployment
    Target,
}

/// Execute the show command.
pub fn cmd_show(kit_dir: &Path, target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Plan => Kit::open(kit_dir)?.print_plan(),
        ShowTarget::Target => {
            let found = target::locate(
                &config.mount_roots,
                &config.deployment_pattern,
                config.home_root.as_deref(),
            )?;
            println!("Deployment: {}", found.root.display());
            println!("  etc:       {}", found.etc.display());
            println!("  usr/bin:   {}", found.usr_bin.display());
            println!("  usr/share: {}", found.usr_share.display());
            println!("  home:      {}", found.home.display());
        }
    }
    Ok(())
}
