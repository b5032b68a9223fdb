//! Connection strategies, tried in order by the bootstrapper.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::definitions;
use crate::host::Host;

/// One way of restoring outbound connectivity.
pub trait ConnectionStrategy {
    fn name(&self) -> &'static str;
    /// Cheap check with no side effects.
    fn applicable(&self, host: &Host) -> bool;
    /// Try to connect. Success here is not trusted; the caller re-probes.
    fn attempt(&self, host: &Host) -> Result<()>;
}

/// Install bundled network packages straight from the kit, then start the
/// network-management services. Only package archives are installed;
/// signatures and other files in the cache are ignored.
pub struct LocalPackages {
    pub dir: PathBuf,
    pub services: Vec<String>,
}

impl LocalPackages {
    pub fn new(dir: &Path, services: &[String]) -> Self {
        Self {
            dir: dir.to_path_buf(),
            services: services.to_vec(),
        }
    }

    fn package_files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.ends_with(definitions::PACKAGE_SUFFIX))
                        .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

impl ConnectionStrategy for LocalPackages {
    fn name(&self) -> &'static str {
        "local-packages"
    }

    fn applicable(&self, _host: &Host) -> bool {
        self.package_files()
            .map(|files| !files.is_empty())
            .unwrap_or(false)
    }

    fn attempt(&self, host: &Host) -> Result<()> {
        let files = self.package_files()?;
        info!(count = files.len(), dir = %self.dir.display(), "Installing bundled packages");
        host.packages.install_files(&files)?;

        for service in &self.services {
            host.services
                .enable(service)
                .and_then(|_| host.services.start(service))
                .with_context(|| format!("Failed to bring up {}", service))?;
        }
        Ok(())
    }
}

/// Ask the operator for a wireless network and associate with it.
pub struct WirelessAssociation;

impl ConnectionStrategy for WirelessAssociation {
    fn name(&self) -> &'static str {
        "wireless"
    }

    fn applicable(&self, _host: &Host) -> bool {
        true
    }

    fn attempt(&self, host: &Host) -> Result<()> {
        let interfaces = host.network.wireless_interfaces()?;
        let Some(iface) = interfaces.first() else {
            bail!("No wireless interface found");
        };

        if let Err(e) = host.network.enable_radio() {
            warn!("Could not switch the wireless radio on: {:#}", e);
        }

        match host.network.scan(iface) {
            Ok(networks) if networks.is_empty() => info!(iface = %iface, "No networks visible"),
            Ok(networks) => {
                info!(iface = %iface, "Visible networks:");
                for ap in &networks {
                    let security = if ap.is_open() { "open" } else { ap.security.as_str() };
                    info!("  {:>3}%  {}  ({})", ap.signal, ap.ssid, security);
                }
            }
            Err(e) => warn!("Scan failed: {:#}", e),
        }

        let ssid = host.prompt.ask("Network name (SSID)")?;
        if ssid.is_empty() {
            bail!("No network name given");
        }
        let secret = host
            .prompt
            .ask_secret("Passphrase (leave empty for an open network)")?;
        let secret = Some(secret.as_str()).filter(|s| !s.is_empty());

        host.network.associate(iface, &ssid, secret)
    }
}
