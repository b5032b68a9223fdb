//! Configuration management for upgrade-kit.
//!
//! Reads configuration from the kit's `.env` file and environment variables.
//! Environment variables take precedence over `.env`.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::UpgradeError;

pub const DEFAULT_MOUNT_ROOTS: &str = "/frzr_root/deployments:/run/media:/media:/mnt";
pub const DEFAULT_DEPLOYMENT_PATTERN: &str = "^kazeta(-.+)?$";
pub const DEFAULT_PROBE_ADDRESS: &str = "8.8.8.8";
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_BUILDER_USER: &str = "nobody";
pub const DEFAULT_CONSOLE_USER: &str = "gamer";
pub const DEFAULT_ASSET_DEST: &str = ".local/share/kazeta-plus";

/// Resolved run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Roots searched (one level deep) for the deployment directory.
    pub mount_roots: Vec<PathBuf>,
    /// Regex the deployment directory name must match.
    pub deployment_pattern: Regex,
    /// Home tree override; defaults to `<deployment>/home`.
    pub home_root: Option<PathBuf>,
    pub probe_address: String,
    pub probe_timeout: Duration,
    /// Unprivileged account that runs the module build.
    pub builder_user: String,
    /// Console's default account, owner of imported assets.
    pub console_user: String,
    /// Asset destination relative to the console user's home.
    pub asset_dest: PathBuf,
    /// Module build failures are warnings instead of fatal.
    pub module_optional: bool,
}

impl Config {
    /// Load configuration from `<kit_dir>/.env` and the environment.
    pub fn load(kit_dir: &Path) -> Result<Self> {
        let mut vars = HashMap::new();

        let env_path = kit_dir.join(".env");
        if env_path.exists() {
            let iter = dotenvy::from_path_iter(&env_path)
                .with_context(|| format!("Failed to read {}", env_path.display()))?;
            for item in iter {
                let (key, value) =
                    item.with_context(|| format!("Malformed line in {}", env_path.display()))?;
                vars.insert(key, value);
            }
        }

        for (key, value) in std::env::vars() {
            if key.starts_with("UPKIT_") {
                vars.insert(key, value);
            }
        }

        Self::from_vars(&vars)
    }

    /// [`Config::load`] for the CLI: a bad value is a failed precondition of
    /// the run.
    pub fn resolve(kit_dir: &Path) -> std::result::Result<Self, UpgradeError> {
        Self::load(kit_dir).map_err(|e| UpgradeError::PreconditionFailed(format!("{:#}", e)))
    }

    /// Build a configuration from already-collected key/value pairs.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let mount_roots = get("UPKIT_MOUNT_ROOTS")
            .unwrap_or(DEFAULT_MOUNT_ROOTS)
            .split(':')
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();

        let pattern = get("UPKIT_DEPLOYMENT_PATTERN").unwrap_or(DEFAULT_DEPLOYMENT_PATTERN);
        let deployment_pattern = Regex::new(pattern)
            .with_context(|| format!("UPKIT_DEPLOYMENT_PATTERN '{}' is not a valid regex", pattern))?;

        let probe_timeout = match get("UPKIT_PROBE_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .with_context(|| format!("UPKIT_PROBE_TIMEOUT_SECS '{}' is not a number", raw))?;
                if secs == 0 {
                    bail!("UPKIT_PROBE_TIMEOUT_SECS must be at least 1");
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        };

        let module_optional = match get("UPKIT_MODULE_OPTIONAL") {
            Some(raw) => parse_flag(raw)
                .with_context(|| format!("UPKIT_MODULE_OPTIONAL '{}' is not a boolean", raw))?,
            None => false,
        };

        Ok(Self {
            mount_roots,
            deployment_pattern,
            home_root: get("UPKIT_HOME_ROOT").map(PathBuf::from),
            probe_address: get("UPKIT_PROBE_ADDRESS")
                .unwrap_or(DEFAULT_PROBE_ADDRESS)
                .to_string(),
            probe_timeout,
            builder_user: get("UPKIT_BUILDER_USER")
                .unwrap_or(DEFAULT_BUILDER_USER)
                .to_string(),
            console_user: get("UPKIT_CONSOLE_USER")
                .unwrap_or(DEFAULT_CONSOLE_USER)
                .to_string(),
            asset_dest: PathBuf::from(get("UPKIT_ASSET_DEST").unwrap_or(DEFAULT_ASSET_DEST)),
            module_optional,
        })
    }

    /// Print configuration for `show config`.
    pub fn print(&self) {
        println!("Configuration:");
        let roots: Vec<String> = self
            .mount_roots
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        println!("  UPKIT_MOUNT_ROOTS: {}", roots.join(":"));
        println!("  UPKIT_DEPLOYMENT_PATTERN: {}", self.deployment_pattern);
        match &self.home_root {
            Some(home) => println!("  UPKIT_HOME_ROOT: {}", home.display()),
            None => println!("  UPKIT_HOME_ROOT: <deployment>/home"),
        }
        println!("  UPKIT_PROBE_ADDRESS: {}", self.probe_address);
        println!("  UPKIT_PROBE_TIMEOUT_SECS: {}", self.probe_timeout.as_secs());
        println!("  UPKIT_BUILDER_USER: {}", self.builder_user);
        println!("  UPKIT_CONSOLE_USER: {}", self.console_user);
        println!("  UPKIT_ASSET_DEST: {}", self.asset_dest.display());
        println!("  UPKIT_MODULE_OPTIONAL: {}", self.module_optional);
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("expected one of 1/0, true/false, yes/no, on/off"),
    }
}
