//! Command-backed host collaborators.

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    Connectivity, DeviceRules, Ownership, PackageManager, Prompter, ServiceManager,
    UnprivilegedBuilder,
};
use crate::network::{nmcli, AccessPoint};
use crate::process::Cmd;

/// pacman.
pub struct Pacman;

impl PackageManager for Pacman {
    fn is_installed(&self, name: &str) -> Result<bool> {
        let result = Cmd::new("pacman").args(["-Q", name]).allow_fail().run()?;
        Ok(result.success())
    }

    fn install(&self, name: &str) -> Result<()> {
        Cmd::new("pacman")
            .args(["-S", "--needed", "--noconfirm", name])
            .error_msg(format!("pacman could not install '{}'", name))
            .run_interactive()?;
        Ok(())
    }

    fn install_files(&self, files: &[PathBuf]) -> Result<()> {
        let mut cmd = Cmd::new("pacman").args(["-U", "--needed", "--noconfirm"]);
        for file in files {
            cmd = cmd.arg_path(file);
        }
        cmd.error_msg("pacman could not install local packages")
            .run_interactive()?;
        Ok(())
    }
}

/// systemctl.
pub struct Systemctl;

impl ServiceManager for Systemctl {
    fn is_enabled(&self, unit: &str) -> Result<bool> {
        let result = Cmd::new("systemctl")
            .args(["is-enabled", "--quiet", unit])
            .allow_fail()
            .run()?;
        Ok(result.success())
    }

    fn is_active(&self, unit: &str) -> Result<bool> {
        let result = Cmd::new("systemctl")
            .args(["is-active", "--quiet", unit])
            .allow_fail()
            .run()?;
        Ok(result.success())
    }

    fn enable(&self, unit: &str) -> Result<()> {
        Cmd::new("systemctl").args(["enable", unit]).run()?;
        Ok(())
    }

    fn start(&self, unit: &str) -> Result<()> {
        Cmd::new("systemctl").args(["start", unit]).run()?;
        Ok(())
    }
}

/// udevadm.
pub struct Udevadm;

impl DeviceRules for Udevadm {
    fn reload(&self) -> Result<()> {
        Cmd::new("udevadm")
            .args(["control", "--reload-rules"])
            .run()?;
        Ok(())
    }

    fn trigger(&self) -> Result<()> {
        Cmd::new("udevadm").arg("trigger").run()?;
        Ok(())
    }
}

/// makepkg, run through `sudo -u` because it refuses to run as root.
pub struct MakepkgBuilder {
    user: String,
}

impl MakepkgBuilder {
    pub fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
        }
    }
}

impl UnprivilegedBuilder for MakepkgBuilder {
    fn identity(&self) -> &str {
        &self.user
    }

    fn build(&self, source_dir: &Path) -> Result<()> {
        Cmd::as_user(&self.user, "makepkg")
            .args(["--syncdeps", "--force", "--noconfirm"])
            .dir(source_dir)
            .error_msg(format!("makepkg failed as '{}'", self.user))
            .run_interactive()?;
        Ok(())
    }
}

/// chown.
pub struct Chown;

impl Ownership for Chown {
    fn chown_recursive(&self, path: &Path, user: &str, group: &str) -> Result<()> {
        Cmd::new("chown")
            .arg("-R")
            .arg(format!("{}:{}", user, group))
            .arg_path(path)
            .run()?;
        Ok(())
    }
}

/// ping for reachability, nmcli for wireless.
pub struct NetworkManager {
    address: String,
    timeout: Duration,
}

impl NetworkManager {
    pub fn new(address: &str, timeout: Duration) -> Self {
        Self {
            address: address.to_string(),
            timeout,
        }
    }
}

impl Connectivity for NetworkManager {
    fn probe(&self) -> bool {
        let timeout = self.timeout.as_secs().max(1).to_string();
        match Cmd::new("ping")
            .args(["-c", "1", "-W", &timeout, &self.address])
            .allow_fail()
            .run()
        {
            Ok(result) => result.success(),
            Err(e) => {
                debug!(error = %e, "reachability probe could not run");
                false
            }
        }
    }

    fn wireless_interfaces(&self) -> Result<Vec<String>> {
        let result = Cmd::new("nmcli")
            .args(["-t", "-f", "DEVICE,TYPE", "device"])
            .run()?;
        Ok(nmcli::parse_wifi_devices(&result.stdout))
    }

    fn enable_radio(&self) -> Result<()> {
        Cmd::new("nmcli").args(["radio", "wifi", "on"]).run()?;
        Ok(())
    }

    fn scan(&self, iface: &str) -> Result<Vec<AccessPoint>> {
        let result = Cmd::new("nmcli")
            .args(["--terse", "--fields", "SSID,SIGNAL,SECURITY", "device", "wifi", "list"])
            .args(["ifname", iface])
            .run()?;
        Ok(nmcli::parse_scan(&result.stdout))
    }

    fn associate(&self, iface: &str, ssid: &str, secret: Option<&str>) -> Result<()> {
        // A profile left by an earlier attempt can carry the wrong key
        // management and make the connect fail.
        let stale = Cmd::new("nmcli")
            .args(["connection", "delete", ssid])
            .allow_fail()
            .run();
        if let Err(e) = stale {
            warn!(error = %e, "could not clear old connection profile");
        }

        let mut cmd = Cmd::new("nmcli").args(["device", "wifi", "connect", ssid]);
        if let Some(secret) = secret {
            cmd = cmd.arg("password").arg_secret(secret);
        }
        cmd.args(["ifname", iface])
            .error_msg(format!("nmcli could not connect to '{}'", ssid))
            .run()?;
        Ok(())
    }
}

/// Prompts on the controlling terminal.
pub struct TerminalPrompt;

impl TerminalPrompt {
    fn read_line(question: &str) -> Result<String> {
        eprint!("{}: ", question);
        io::stderr().flush().ok();
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read answer from terminal")?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Prompter for TerminalPrompt {
    fn ask(&self, question: &str) -> Result<String> {
        Self::read_line(question).map(|s| s.trim().to_string())
    }

    fn ask_secret(&self, question: &str) -> Result<String> {
        let hidden = Cmd::new("stty").arg("-echo").allow_fail().run_interactive();
        let answer = Self::read_line(question);
        if hidden.is_ok() {
            Cmd::new("stty").arg("echo").allow_fail().run_interactive().ok();
            eprintln!();
        }
        answer
    }
}
