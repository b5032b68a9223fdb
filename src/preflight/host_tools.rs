//! Host tool availability checks.

use crate::error::Stage;
use crate::process;

use super::types::CheckResult;

/// Tools every run needs, with the stage that calls them.
const REQUIRED: &[(&str, &str, Stage)] = &[
    ("ping", "iputils", Stage::Network),
    ("pacman", "pacman", Stage::Packages),
    ("chown", "coreutils", Stage::Module),
    ("sudo", "sudo", Stage::Module),
    ("systemctl", "systemd", Stage::Services),
    ("udevadm", "systemd", Stage::Services),
];

/// Tools only some paths reach: wireless fallback, kits with a module.
const OPTIONAL: &[(&str, &str, Stage)] = &[
    ("nmcli", "networkmanager", Stage::Network),
    ("makepkg", "pacman", Stage::Module),
];

pub fn check_host_tools() -> Vec<CheckResult> {
    REQUIRED
        .iter()
        .map(|&(tool, package, stage)| check_tool(tool, package, stage, true))
        .chain(
            OPTIONAL
                .iter()
                .map(|&(tool, package, stage)| check_tool(tool, package, stage, false)),
        )
        .collect()
}

fn check_tool(tool: &str, package: &str, stage: Stage, required: bool) -> CheckResult {
    match process::which(tool) {
        Some(path) => CheckResult::pass(stage, tool).with_details(path),
        None => {
            let msg = format!("Not found in PATH. Install '{}'.", package);
            if required {
                CheckResult::fail(stage, tool, &msg)
            } else {
                CheckResult::warn(stage, tool, &msg)
            }
        }
    }
}
