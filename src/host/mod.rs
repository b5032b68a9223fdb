//! Host collaborators behind narrow capability traits.
//!
//! Each stage talks to the machine only through these traits. [`Host::system`]
//! wires the real command-backed implementations; tests use [`fake`].
//!
//! The module build is split across two capabilities: [`Ownership`] runs with
//! the orchestrator's elevated identity, [`UnprivilegedBuilder`] is the only
//! primitive that executes as the builder account.

pub mod fake;
pub mod system;

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::network::AccessPoint;

/// Package manager queries and installs.
pub trait PackageManager {
    fn is_installed(&self, name: &str) -> Result<bool>;
    /// Install one package by name from the remote index.
    fn install(&self, name: &str) -> Result<()>;
    /// Install local package files, bypassing the remote index.
    fn install_files(&self, files: &[PathBuf]) -> Result<()>;
}

/// Service manager.
pub trait ServiceManager {
    fn is_enabled(&self, unit: &str) -> Result<bool>;
    fn is_active(&self, unit: &str) -> Result<bool>;
    fn enable(&self, unit: &str) -> Result<()>;
    fn start(&self, unit: &str) -> Result<()>;
}

/// Device-rule daemon.
pub trait DeviceRules {
    /// Reload the rule database.
    fn reload(&self) -> Result<()>;
    /// Re-evaluate present devices against the rules.
    fn trigger(&self) -> Result<()>;
}

/// Runs the package build as an unprivileged account.
pub trait UnprivilegedBuilder {
    /// Account the build runs as.
    fn identity(&self) -> &str;
    /// Build the package in `source_dir` (dependency sync, forced rebuild,
    /// no install). The working directory is `source_dir`.
    fn build(&self, source_dir: &Path) -> Result<()>;
}

/// Ownership changes, performed with elevated rights.
pub trait Ownership {
    fn chown_recursive(&self, path: &Path, user: &str, group: &str) -> Result<()>;
}

/// Reachability and wireless association.
pub trait Connectivity {
    /// Single reachability round trip. Never errors: anything but a reply is
    /// unreachable.
    fn probe(&self) -> bool;
    fn wireless_interfaces(&self) -> Result<Vec<String>>;
    fn enable_radio(&self) -> Result<()>;
    fn scan(&self, iface: &str) -> Result<Vec<AccessPoint>>;
    /// Associate `iface` with `ssid`. `None` secret means an open network.
    fn associate(&self, iface: &str, ssid: &str, secret: Option<&str>) -> Result<()>;
}

/// Operator prompts. Blocking, no timeout: the install is attended.
pub trait Prompter {
    fn ask(&self, question: &str) -> Result<String>;
    /// Like `ask`, without echoing the answer.
    fn ask_secret(&self, question: &str) -> Result<String>;
}

/// Everything a pipeline run may touch outside the deployment tree.
pub struct Host {
    pub packages: Box<dyn PackageManager>,
    pub services: Box<dyn ServiceManager>,
    pub device_rules: Box<dyn DeviceRules>,
    pub builder: Box<dyn UnprivilegedBuilder>,
    pub ownership: Box<dyn Ownership>,
    pub network: Box<dyn Connectivity>,
    pub prompt: Box<dyn Prompter>,
}

impl Host {
    /// Real collaborators: pacman, systemctl, udevadm, makepkg via sudo,
    /// chown, ping and nmcli, and the controlling terminal.
    pub fn system(config: &Config) -> Self {
        Self {
            packages: Box::new(system::Pacman),
            services: Box::new(system::Systemctl),
            device_rules: Box::new(system::Udevadm),
            builder: Box::new(system::MakepkgBuilder::new(&config.builder_user)),
            ownership: Box::new(system::Chown),
            network: Box::new(system::NetworkManager::new(
                &config.probe_address,
                config.probe_timeout,
            )),
            prompt: Box::new(system::TerminalPrompt),
        }
    }
}
