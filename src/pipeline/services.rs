//! Service activation and device-rule reload.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::UpgradeError;
use crate::host::{DeviceRules, ServiceManager};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceOutcome {
    pub name: String,
    /// Enabled by this run (false if it already was).
    pub enabled: bool,
    /// Started by this run (false if it already ran).
    pub started: bool,
    /// Activation failure, if any.
    pub error: Option<String>,
}

impl ServiceOutcome {
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Reload the rule database and re-evaluate devices. Failures are reported,
/// not fatal: the rules also apply from the next boot.
pub fn reload_device_rules(rules: &dyn DeviceRules) -> bool {
    let result = rules.reload().and_then(|_| rules.trigger());
    match result {
        Ok(()) => {
            info!("Device rules reloaded");
            true
        }
        Err(e) => {
            warn!("Device rules not reloaded: {:#}", e);
            false
        }
    }
}

fn activate_one(sm: &dyn ServiceManager, name: &str) -> anyhow::Result<(bool, bool)> {
    let mut enabled = false;
    let mut started = false;
    if !sm.is_enabled(name)? {
        sm.enable(name)?;
        enabled = true;
    }
    if !sm.is_active(name)? {
        sm.start(name)?;
        started = true;
    }
    Ok((enabled, started))
}

/// Enable and start each service in order. A failing service is recorded and
/// the remaining ones are still processed; earlier ones are not rolled back.
pub fn activate(sm: &dyn ServiceManager, services: &[String]) -> Vec<ServiceOutcome> {
    services
        .iter()
        .map(|name| match activate_one(sm, name) {
            Ok((enabled, started)) => {
                info!(service = %name, enabled, started, "Service active");
                ServiceOutcome {
                    name: name.clone(),
                    enabled,
                    started,
                    error: None,
                }
            }
            Err(cause) => {
                let err = UpgradeError::ServiceActivationFailed {
                    service: name.clone(),
                    cause,
                };
                warn!("{}", err);
                ServiceOutcome {
                    name: name.clone(),
                    enabled: false,
                    started: false,
                    error: Some(err.to_string()),
                }
            }
        })
        .collect()
}
