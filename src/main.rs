//! upgrade-kit - in-place upgrade of a console OS deployment.
//!
//! Applies a prepared kit to a mounted deployment:
//! - restores network (bundled packages, then interactive wireless)
//! - installs packages and builds the out-of-tree kernel module
//! - deploys configuration and executables with backups
//! - normalizes permissions, activates services, imports user assets

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use upgrade_kit::config::Config;

#[derive(Parser)]
#[command(name = "upgrade-kit")]
#[command(about = "Console OS in-place upgrade")]
#[command(
    after_help = "QUICK START:\n  upgrade-kit preflight   Check host, kit and deployment\n  upgrade-kit show plan   List what will be applied\n  sudo upgrade-kit upgrade   Run the upgrade"
)]
struct Cli {
    /// Kit directory (default: current directory)
    #[arg(long, global = true, default_value = ".")]
    kit: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full upgrade (requires root)
    Upgrade {
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
        /// Do not probe or restore network connectivity
        #[arg(long)]
        skip_network: bool,
    },

    /// Run preflight checks (verify host, kit and deployment)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show resolved configuration
    Config,
    /// Show the declarations the kit applies
    Plan,
    /// Show the located deployment
    Target,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::resolve(&cli.kit)?;

    match cli.command {
        Commands::Upgrade { json, skip_network } => {
            commands::cmd_upgrade(&cli.kit, config, json, skip_network)?;
        }

        Commands::Preflight { strict } => {
            commands::cmd_preflight(&cli.kit, &config, strict)?;
        }

        Commands::Show { what } => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Plan => commands::show::ShowTarget::Plan,
                ShowTarget::Target => commands::show::ShowTarget::Target,
            };
            commands::cmd_show(&cli.kit, show_target, &config)?;
        }
    }

    Ok(())
}
