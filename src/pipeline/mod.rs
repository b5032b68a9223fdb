//! Upgrade pipeline orchestration.
//!
//! Stages run strictly in sequence, each to completion before the next:
//!
//! 1. Target     - locate the deployment (fatal if absent, nothing touched)
//! 2. Network    - probe, then fall back through the strategy chain
//! 3. Packages   - install what is missing
//! 4. Module     - build unprivileged, install privileged
//! 5. Files      - merge config trees, supersede executables with backups
//! 6. Permissions - force modes and ownership on sensitive trees
//! 7. Services   - reload device rules if they changed, enable and start
//! 8. Assets     - copy user assets without overwriting
//!
//! Nothing is rolled back when a later stage fails. Every stage is idempotent,
//! so running the whole pipeline again is the recovery path.

pub mod assets;
pub mod files;
pub mod module;
pub mod packages;
pub mod permissions;
pub mod services;

use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::definitions;
use crate::error::UpgradeError;
use crate::host::Host;
use crate::kit::Kit;
use crate::network::{
    Bootstrapper, ConnectionStrategy, LocalPackages, NetworkOutcome, WirelessAssociation,
};
use crate::target::{self, DeploymentTarget};
use crate::timing::Timer;

pub use assets::AssetReport;
pub use files::{DeployReport, FileDeploymentEntry};
pub use module::{ModuleBuildJob, ModuleOutcome};
pub use packages::PackageReport;
pub use services::ServiceOutcome;

/// Inputs of one run.
pub struct UpgradeContext {
    pub kit: Kit,
    pub config: Config,
    /// Bypass the network bootstrapper.
    pub skip_network: bool,
}

impl UpgradeContext {
    pub fn new(kit: Kit, config: Config) -> Self {
        Self {
            kit,
            config,
            skip_network: false,
        }
    }

    pub fn locate_target(&self) -> Result<DeploymentTarget, UpgradeError> {
        target::locate(
            &self.config.mount_roots,
            &self.config.deployment_pattern,
            self.config.home_root.as_deref(),
        )
    }

    /// Strategy chain: bundled packages first, interactive wireless last.
    pub fn strategies(&self) -> Vec<Box<dyn ConnectionStrategy>> {
        vec![
            Box::new(LocalPackages::new(
                &self.kit.packages_dir,
                &self.kit.manifest.network_services,
            )),
            Box::new(WirelessAssociation),
        ]
    }

    /// Where imported assets land.
    pub fn asset_destination(&self, target: &DeploymentTarget) -> PathBuf {
        target
            .user_home(&self.config.console_user)
            .join(&self.config.asset_dest)
    }
}

/// What a completed run did.
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeReport {
    pub target: DeploymentTarget,
    pub network: NetworkOutcome,
    pub packages: PackageReport,
    pub module: ModuleOutcome,
    pub files: DeployReport,
    pub device_rules_reloaded: bool,
    pub permissions: Vec<PathBuf>,
    pub services: Vec<ServiceOutcome>,
    pub assets: AssetReport,
}

impl UpgradeReport {
    pub fn failed_services(&self) -> Vec<&ServiceOutcome> {
        self.services.iter().filter(|s| !s.ok()).collect()
    }

    /// Human summary logged at the end of a run.
    pub fn log_summary(&self) {
        info!("Deployment: {}", self.target.root.display());
        info!(
            "Packages: {} installed, {} already present",
            self.packages.installed.len(),
            self.packages.already_installed.len()
        );
        info!(
            "Files: {} written, {} unchanged, {} backed up",
            self.files.written.len(),
            self.files.unchanged.len(),
            self.files.backups.len()
        );
        let failed = self.failed_services();
        info!(
            "Services: {} active, {} failed",
            self.services.len() - failed.len(),
            failed.len()
        );
        for svc in failed {
            if let Some(err) = &svc.error {
                tracing::warn!("{}", err);
            }
        }
    }
}

/// Run every stage in order.
pub fn run(ctx: &UpgradeContext, host: &Host) -> Result<UpgradeReport, UpgradeError> {
    let manifest = &ctx.kit.manifest;

    let timer = Timer::start("Target");
    let target = ctx.locate_target()?;
    info!(root = %target.root.display(), "Deployment found");
    timer.finish();

    let network = if ctx.skip_network {
        info!("Network bootstrap skipped");
        NetworkOutcome::skipped()
    } else {
        let timer = Timer::start("Network");
        let outcome = Bootstrapper::new(ctx.strategies()).run(host)?;
        timer.finish();
        outcome
    };

    let timer = Timer::start("Packages");
    let packages = packages::ensure_installed(host.packages.as_ref(), &manifest.packages)?;
    timer.finish();

    let timer = Timer::start("Module");
    let job = ModuleBuildJob::new(&ctx.kit.module_dir);
    let module = module::build_and_install(host, &job, ctx.config.module_optional)?;
    timer.finish();

    let timer = Timer::start("Files");
    let files = files::deploy(&ctx.kit, &target, host.ownership.as_ref())?;
    timer.finish();

    let timer = Timer::start("Permissions");
    let permissions =
        permissions::normalize(&target, permissions::POLICIES, host.ownership.as_ref())?;
    timer.finish();

    let timer = Timer::start("Services");
    let rules_dir = target.path(definitions::DEVICE_RULES_DIR);
    let device_rules_reloaded = if files.wrote_under(&rules_dir) {
        services::reload_device_rules(host.device_rules.as_ref())
    } else {
        false
    };
    let services = services::activate(host.services.as_ref(), &manifest.services);
    timer.finish();

    let timer = Timer::start("Assets");
    let assets = assets::import(
        &ctx.kit.assets_dir,
        &ctx.asset_destination(&target),
        &ctx.config.console_user,
        host.ownership.as_ref(),
    )?;
    timer.finish();

    Ok(UpgradeReport {
        target,
        network,
        packages,
        module,
        files,
        device_rules_reloaded,
        permissions,
        services,
        assets,
    })
}
