//! User asset import.
//!
//! Copies the kit's asset templates into the console user's directory without
//! ever overwriting a file the user already has.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;
use walkdir::WalkDir;

use crate::common::ensure_parent_exists;
use crate::error::{Stage, UpgradeError};
use crate::pipeline::files::copy_symlink;
use crate::host::Ownership;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetReport {
    pub copied: usize,
    pub skipped_existing: usize,
    /// Source absent or empty.
    pub skipped: bool,
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut d| d.next().is_none())
        .unwrap_or(true)
}

/// Copy missing files from `src` into `dst`. Symlinks are recreated, not
/// followed.
pub fn copy_missing(src: &Path, dst: &Path, report: &mut AssetReport) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let target = dst.join(entry.path().strip_prefix(src)?);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else if target.symlink_metadata().is_ok() {
            report.skipped_existing += 1;
        } else if entry.file_type().is_symlink() {
            copy_symlink(entry.path(), &target)?;
            report.copied += 1;
        } else {
            ensure_parent_exists(&target)?;
            fs::copy(entry.path(), &target).with_context(|| {
                format!("Failed to copy {} to {}", entry.path().display(), target.display())
            })?;
            report.copied += 1;
        }
    }
    Ok(())
}

/// Import assets and hand the destination tree to `user`.
pub fn import(
    src: &Path,
    dst: &Path,
    user: &str,
    ownership: &dyn Ownership,
) -> Result<AssetReport, UpgradeError> {
    let mut report = AssetReport::default();
    if !src.is_dir() || is_empty_dir(src) {
        info!("No user assets in kit, skipping");
        report.skipped = true;
        return Ok(report);
    }

    let failed = |cause: anyhow::Error| UpgradeError::DeployFailed {
        stage: Stage::Assets,
        path: dst.to_path_buf(),
        cause,
    };

    copy_missing(src, dst, &mut report).map_err(failed)?;
    ownership
        .chown_recursive(dst, user, user)
        .map_err(failed)?;

    info!(
        copied = report.copied,
        kept = report.skipped_existing,
        dest = %dst.display(),
        "Assets imported"
    );
    Ok(report)
}
