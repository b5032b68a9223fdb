//! Package stage: make every declared package present.

use serde::Serialize;
use tracing::info;

use crate::error::UpgradeError;
use crate::host::PackageManager;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    pub already_installed: Vec<String>,
    pub installed: Vec<String>,
}

/// Install each missing package in declared order.
///
/// The first failure stops the stage. Packages installed before it stay
/// installed; a re-run skips them.
pub fn ensure_installed(
    pm: &dyn PackageManager,
    packages: &[String],
) -> Result<PackageReport, UpgradeError> {
    let mut report = PackageReport::default();

    for name in packages {
        let present = pm
            .is_installed(name)
            .map_err(|cause| UpgradeError::PackageInstallFailed {
                package: name.clone(),
                cause: cause.context("could not query package database"),
            })?;

        if present {
            report.already_installed.push(name.clone());
            continue;
        }

        info!(package = %name, "Installing");
        pm.install(name)
            .map_err(|cause| UpgradeError::PackageInstallFailed {
                package: name.clone(),
                cause,
            })?;
        report.installed.push(name.clone());
    }

    info!(
        installed = report.installed.len(),
        present = report.already_installed.len(),
        "Packages ready"
    );
    Ok(report)
}
