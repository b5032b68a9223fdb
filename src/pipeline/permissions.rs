//! Permission normalisation for security-sensitive directories.
//!
//! Runs after every deployment whether or not files landed there: a previous
//! run or a manual edit may have left the tree with loose modes.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::common::set_mode;
use crate::definitions;
use crate::error::{Stage, UpgradeError};
use crate::host::Ownership;
use crate::target::DeploymentTarget;

/// Mode/ownership invariant for one directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionPolicy {
    pub dir: &'static str,
    pub dir_mode: u32,
    pub file_mode: u32,
    pub owner: &'static str,
}

/// Privilege-escalation policy and device-rule trees.
pub const POLICIES: &[PermissionPolicy] = &[
    PermissionPolicy {
        dir: definitions::POLICY_DIR,
        dir_mode: definitions::SENSITIVE_DIR_MODE,
        file_mode: definitions::POLICY_FILE_MODE,
        owner: definitions::SYSTEM_OWNER,
    },
    PermissionPolicy {
        dir: definitions::DEVICE_RULES_DIR,
        dir_mode: definitions::SENSITIVE_DIR_MODE,
        file_mode: definitions::DEVICE_RULE_MODE,
        owner: definitions::SYSTEM_OWNER,
    },
];

/// Force owner and modes on everything under `root`.
pub fn apply(root: &Path, policy: &PermissionPolicy, ownership: &dyn Ownership) -> Result<()> {
    ownership.chown_recursive(root, policy.owner, policy.owner)?;

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            set_mode(entry.path(), policy.dir_mode)?;
        } else if file_type.is_file() {
            set_mode(entry.path(), policy.file_mode)?;
        }
    }
    Ok(())
}

/// Apply every policy whose directory exists in the deployment.
pub fn normalize(
    target: &DeploymentTarget,
    policies: &[PermissionPolicy],
    ownership: &dyn Ownership,
) -> Result<Vec<PathBuf>, UpgradeError> {
    let mut normalized = Vec::new();
    for policy in policies {
        let root = target.path(policy.dir);
        if !root.is_dir() {
            debug!(dir = %root.display(), "absent, nothing to normalise");
            continue;
        }
        apply(&root, policy, ownership).map_err(|cause| UpgradeError::DeployFailed {
            stage: Stage::Permissions,
            path: root.clone(),
            cause,
        })?;
        info!(dir = %root.display(), "Permissions normalised");
        normalized.push(root);
    }
    Ok(normalized)
}
