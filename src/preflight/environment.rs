//! Privilege, kit and deployment checks.

use std::path::Path;

use crate::config::Config;
use crate::definitions;
use crate::error::Stage;
use crate::kit::Kit;
use crate::target;

use super::types::CheckResult;

/// The pipeline writes into the deployment and drives system services.
pub fn check_root() -> CheckResult {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let euid = unsafe { libc::geteuid() };
    if euid == 0 {
        CheckResult::pass(Stage::Preconditions, "root privileges")
    } else {
        CheckResult::fail(
            Stage::Preconditions,
            "root privileges",
            &format!("Running as uid {}. Re-run with sudo.", euid),
        )
    }
}

/// Kit directory, manifest and the files it declares.
pub fn check_kit(kit_dir: &Path) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let kit = match Kit::open(kit_dir) {
        Ok(kit) => {
            results.push(
                CheckResult::pass(Stage::Preconditions, "kit manifest")
                    .with_details(kit_dir.display().to_string()),
            );
            kit
        }
        Err(e) => {
            results.push(CheckResult::fail(
                Stage::Preconditions,
                "kit manifest",
                &format!("{:#}", e),
            ));
            return results;
        }
    };

    if kit.staging.is_dir() {
        results.push(CheckResult::pass(Stage::Files, "rootfs/ staging tree"));
    } else {
        results.push(CheckResult::fail(
            Stage::Files,
            "rootfs/ staging tree",
            &format!("Missing {}", kit.staging.display()),
        ));
        return results;
    }

    let missing: Vec<&String> = kit
        .manifest
        .executables
        .iter()
        .chain(&kit.manifest.policy_files)
        .filter(|rel| !kit.staging.join(rel).is_file())
        .collect();
    if missing.is_empty() {
        results.push(CheckResult::pass(Stage::Files, "declared files"));
    } else {
        let names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
        results.push(CheckResult::fail(
            Stage::Files,
            "declared files",
            &format!("Missing from rootfs/: {}", names.join(", ")),
        ));
    }

    let absent_trees: Vec<&str> = kit
        .manifest
        .config_trees
        .iter()
        .filter(|rel| !kit.staging.join(rel).is_dir())
        .map(|s| s.as_str())
        .collect();
    if absent_trees.is_empty() {
        results.push(CheckResult::pass(Stage::Files, "config trees"));
    } else {
        results.push(CheckResult::warn(
            Stage::Files,
            "config trees",
            &format!("Not shipped, will be skipped: {}", absent_trees.join(", ")),
        ));
    }

    if !kit.module_dir.is_dir() {
        results.push(CheckResult::skip(Stage::Module, "module source", "No module/ directory"));
    } else if kit.module_dir.join(definitions::MODULE_DESCRIPTOR).is_file() {
        results.push(CheckResult::pass(Stage::Module, "module source"));
    } else {
        results.push(CheckResult::warn(
            Stage::Module,
            "module source",
            &format!("module/ has no {}, build will be skipped", definitions::MODULE_DESCRIPTOR),
        ));
    }

    if kit.packages_dir.is_dir() {
        results.push(CheckResult::pass(Stage::Network, "offline network packages"));
    } else {
        results.push(CheckResult::warn(
            Stage::Network,
            "offline network packages",
            "No packages/ directory, offline network bring-up unavailable",
        ));
    }

    results
}

/// The deployment must be discoverable before anything is touched.
pub fn check_target(config: &Config) -> CheckResult {
    match target::locate(
        &config.mount_roots,
        &config.deployment_pattern,
        config.home_root.as_deref(),
    ) {
        Ok(found) => CheckResult::pass(Stage::Target, "deployment")
            .with_details(found.root.display().to_string()),
        Err(e) => CheckResult::fail(Stage::Target, "deployment", &e.to_string()),
    }
}
