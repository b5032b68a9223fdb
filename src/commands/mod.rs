//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `upgrade` - Run the upgrade pipeline
//! - `preflight` - Run preflight checks
//! - `show` - Display configuration, plan or target

mod preflight;
pub mod show;
mod upgrade;

pub use preflight::cmd_preflight;
pub use show::cmd_show;
pub use upgrade::cmd_upgrade;
