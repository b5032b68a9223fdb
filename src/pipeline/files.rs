//! File deployment.
//!
//! Two policies:
//! - configuration trees are merged additively: unrelated destination files
//!   stay, conflicting ones are overwritten;
//! - executables and policy files are superseded wholesale: the previous file
//!   is renamed to `<name>.bak` (one generation, replacing an older backup)
//!   before the new one is copied in.
//!
//! Files whose destination already holds identical content are left alone, so
//! a repeated run neither rewrites them nor rotates their backup.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::common::{copy_with_mode, ensure_parent_exists, files_identical, set_mode};
use crate::definitions;
use crate::error::{Stage, UpgradeError};
use crate::host::Ownership;
use crate::kit::Kit;
use crate::target::DeploymentTarget;

/// A single file superseded with backup-and-replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDeploymentEntry {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub mode: u32,
    pub owner: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    /// Destination files created or overwritten.
    pub written: Vec<PathBuf>,
    /// Destination files already up to date.
    pub unchanged: Vec<PathBuf>,
    /// Backups created for superseded files.
    pub backups: Vec<PathBuf>,
    /// Declared trees the kit does not ship.
    pub missing_trees: Vec<String>,
}

impl DeployReport {
    /// Whether anything under `dir` was written.
    pub fn wrote_under(&self, dir: &Path) -> bool {
        self.written.iter().any(|p| p.starts_with(dir))
    }
}

/// Sibling backup path: `<dest>.bak`.
pub fn backup_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(definitions::BACKUP_SUFFIX);
    dest.with_file_name(name)
}

/// Make room at `target` for an entry of the other kind.
///
/// A directory shipped where the deployment has a file (or the reverse)
/// replaces what is there.
pub(crate) fn clear_type_conflict(target: &Path, want_dir: bool) -> Result<()> {
    let Ok(meta) = target.symlink_metadata() else {
        return Ok(());
    };
    if meta.is_dir() == want_dir {
        return Ok(());
    }
    warn!(path = %target.display(), "Type changed in this version, replacing");
    let removed = if meta.is_dir() {
        fs::remove_dir_all(target)
    } else {
        fs::remove_file(target)
    };
    removed.with_context(|| format!("Failed to remove {}", target.display()))
}

/// Recreate the symlink at `link_path` as a copy of `src_link`. Returns false
/// when an identical link is already there.
pub(crate) fn copy_symlink(src_link: &Path, link_path: &Path) -> Result<bool> {
    let link = fs::read_link(src_link)
        .with_context(|| format!("Failed to read link {}", src_link.display()))?;
    if fs::read_link(link_path).ok().as_deref() == Some(link.as_path()) {
        return Ok(false);
    }
    if link_path.symlink_metadata().is_ok() {
        fs::remove_file(link_path)
            .with_context(|| format!("Failed to replace {}", link_path.display()))?;
    }
    ensure_parent_exists(link_path)?;
    symlink(&link, link_path)
        .with_context(|| format!("Failed to link {}", link_path.display()))?;
    Ok(true)
}

/// Merge `src` into `dst` recursively.
pub fn sync_tree(src: &Path, dst: &Path, report: &mut DeployReport) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let rel = entry.path().strip_prefix(src)?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        clear_type_conflict(&target, file_type.is_dir())?;

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else if file_type.is_symlink() {
            if copy_symlink(entry.path(), &target)? {
                report.written.push(target);
            } else {
                report.unchanged.push(target);
            }
        } else if files_identical(entry.path(), &target)? {
            report.unchanged.push(target);
        } else {
            if target.is_symlink() {
                fs::remove_file(&target)?;
            }
            ensure_parent_exists(&target)?;
            fs::copy(entry.path(), &target).with_context(|| {
                format!("Failed to copy {} to {}", entry.path().display(), target.display())
            })?;
            debug!(path = %target.display(), "written");
            report.written.push(target);
        }
    }
    Ok(())
}

/// Supersede one file, keeping the previous version as its backup.
pub fn backup_and_replace(
    entry: &FileDeploymentEntry,
    ownership: &dyn Ownership,
    report: &mut DeployReport,
) -> Result<()> {
    if !entry.source.is_file() {
        anyhow::bail!("{} not found in kit", entry.source.display());
    }

    if files_identical(&entry.source, &entry.dest)? {
        set_mode(&entry.dest, entry.mode)?;
        report.unchanged.push(entry.dest.clone());
        return Ok(());
    }

    if entry.dest.symlink_metadata().is_ok() {
        let backup = backup_path(&entry.dest);
        fs::rename(&entry.dest, &backup).with_context(|| {
            format!("Failed to back up {} to {}", entry.dest.display(), backup.display())
        })?;
        info!(backup = %backup.display(), "Backed up");
        report.backups.push(backup);
    }

    copy_with_mode(&entry.source, &entry.dest, entry.mode)?;
    ownership.chown_recursive(&entry.dest, &entry.owner, &entry.owner)?;
    report.written.push(entry.dest.clone());
    Ok(())
}

/// Entries for the kit's executables and policy files.
pub fn replace_entries(kit: &Kit, target: &DeploymentTarget) -> Vec<FileDeploymentEntry> {
    let entry = |rel: &String, mode: u32| FileDeploymentEntry {
        source: kit.staging.join(rel),
        dest: target.path(rel),
        mode,
        owner: definitions::SYSTEM_OWNER.to_string(),
    };
    kit.manifest
        .executables
        .iter()
        .map(|rel| entry(rel, definitions::EXECUTABLE_MODE))
        .chain(
            kit.manifest
                .policy_files
                .iter()
                .map(|rel| entry(rel, definitions::POLICY_FILE_MODE)),
        )
        .collect()
}

/// Deploy config trees, then superseded files.
pub fn deploy(
    kit: &Kit,
    target: &DeploymentTarget,
    ownership: &dyn Ownership,
) -> Result<DeployReport, UpgradeError> {
    let mut report = DeployReport::default();

    for tree in &kit.manifest.config_trees {
        let src = kit.staging.join(tree);
        let dst = target.path(tree);
        if !src.is_dir() {
            warn!(tree = %tree, "Not shipped by this kit, skipping");
            report.missing_trees.push(tree.clone());
            continue;
        }
        sync_tree(&src, &dst, &mut report).map_err(|cause| UpgradeError::DeployFailed {
            stage: Stage::Files,
            path: dst.clone(),
            cause,
        })?;
    }

    for entry in replace_entries(kit, target) {
        backup_and_replace(&entry, ownership, &mut report).map_err(|cause| {
            UpgradeError::DeployFailed {
                stage: Stage::Files,
                path: entry.dest.clone(),
                cause,
            }
        })?;
    }

    info!(
        written = report.written.len(),
        unchanged = report.unchanged.len(),
        backups = report.backups.len(),
        "Files deployed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn entry(tmp: &TempDir) -> FileDeploymentEntry {
        FileDeploymentEntry {
            source: tmp.path().join("kit/usr/bin/kazeta-bios"),
            dest: tmp.path().join("root/usr/bin/kazeta-bios"),
            mode: 0o755,
            owner: "root".into(),
        }
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path(Path::new("/r/usr/bin/kazeta")),
            PathBuf::from("/r/usr/bin/kazeta.bak")
        );
    }

    #[test]
    fn test_replace_keeps_one_backup_generation() {
        let tmp = TempDir::new().unwrap();
        let e = entry(&tmp);
        let fake = FakeHost::new();
        let host = fake.host();
        fs::create_dir_all(e.source.parent().unwrap()).unwrap();
        fs::create_dir_all(e.dest.parent().unwrap()).unwrap();

        fs::write(&e.dest, "v1").unwrap();
        fs::write(&e.source, "v2").unwrap();
        let mut report = DeployReport::default();
        backup_and_replace(&e, host.ownership.as_ref(), &mut report).unwrap();
        assert_eq!(fs::read_to_string(&e.dest).unwrap(), "v2");
        assert_eq!(fs::read_to_string(backup_path(&e.dest)).unwrap(), "v1");

        fs::write(&e.source, "v3").unwrap();
        backup_and_replace(&e, host.ownership.as_ref(), &mut report).unwrap();
        assert_eq!(fs::read_to_string(&e.dest).unwrap(), "v3");
        assert_eq!(fs::read_to_string(backup_path(&e.dest)).unwrap(), "v2");

        let backups: Vec<_> = fs::read_dir(e.dest.parent().unwrap())
            .unwrap()
            .filter_map(|d| d.ok())
            .filter(|d| d.file_name().to_string_lossy().ends_with(".bak"))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn test_identical_file_not_backed_up_again() {
        let tmp = TempDir::new().unwrap();
        let e = entry(&tmp);
        let host = FakeHost::new().host();
        fs::create_dir_all(e.source.parent().unwrap()).unwrap();
        fs::create_dir_all(e.dest.parent().unwrap()).unwrap();
        fs::write(&e.dest, "v1").unwrap();
        fs::write(&e.source, "v2").unwrap();

        let mut first = DeployReport::default();
        backup_and_replace(&e, host.ownership.as_ref(), &mut first).unwrap();
        fs::set_permissions(&e.dest, fs::Permissions::from_mode(0o600)).unwrap();

        let mut second = DeployReport::default();
        backup_and_replace(&e, host.ownership.as_ref(), &mut second).unwrap();

        assert!(second.backups.is_empty());
        assert_eq!(second.unchanged, vec![e.dest.clone()]);
        assert_eq!(fs::read_to_string(backup_path(&e.dest)).unwrap(), "v1");
        let mode = fs::metadata(&e.dest).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }

    #[test]
    fn test_missing_source_fails() {
        let tmp = TempDir::new().unwrap();
        let host = FakeHost::new().host();
        let mut report = DeployReport::default();
        let err = backup_and_replace(&entry(&tmp), host.ownership.as_ref(), &mut report)
            .unwrap_err();
        assert!(err.to_string().contains("not found in kit"));
    }

    #[test]
    fn test_sync_tree_is_additive() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src/etc/keyd");
        let dst = tmp.path().join("dst/etc/keyd");
        fs::create_dir_all(src.join("profiles")).unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(src.join("default.conf"), "new").unwrap();
        fs::write(src.join("profiles/deck.conf"), "deck").unwrap();
        symlink("default.conf", src.join("current.conf")).unwrap();
        fs::write(dst.join("default.conf"), "old").unwrap();
        fs::write(dst.join("local.conf"), "mine").unwrap();

        let mut report = DeployReport::default();
        sync_tree(&src, &dst, &mut report).unwrap();

        assert_eq!(fs::read_to_string(dst.join("default.conf")).unwrap(), "new");
        assert_eq!(fs::read_to_string(dst.join("local.conf")).unwrap(), "mine");
        assert_eq!(fs::read_to_string(dst.join("profiles/deck.conf")).unwrap(), "deck");
        assert_eq!(
            fs::read_link(dst.join("current.conf")).unwrap(),
            PathBuf::from("default.conf")
        );
        assert!(!backup_path(&dst.join("default.conf")).exists());

        let mut again = DeployReport::default();
        sync_tree(&src, &dst, &mut again).unwrap();
        assert!(again.written.is_empty());
        assert_eq!(again.unchanged.len(), 3);
    }

    #[test]
    fn test_sync_tree_replaces_file_with_directory() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src/etc/keyd");
        let dst = tmp.path().join("dst/etc/keyd");
        fs::create_dir_all(src.join("profiles")).unwrap();
        fs::write(src.join("profiles/a.conf"), "a").unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("profiles"), "was a file").unwrap();

        let mut report = DeployReport::default();
        sync_tree(&src, &dst, &mut report).unwrap();

        assert!(dst.join("profiles").is_dir());
        assert_eq!(fs::read_to_string(dst.join("profiles/a.conf")).unwrap(), "a");
    }

    #[test]
    fn test_sync_tree_replaces_directory_with_file() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src/etc/keyd");
        let dst = tmp.path().join("dst/etc/keyd");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("default.conf"), "flat").unwrap();
        fs::create_dir_all(dst.join("default.conf/nested")).unwrap();
        fs::write(dst.join("default.conf/nested/x"), "x").unwrap();
        fs::write(dst.join("local.conf"), "mine").unwrap();

        let mut report = DeployReport::default();
        sync_tree(&src, &dst, &mut report).unwrap();

        assert_eq!(fs::read_to_string(dst.join("default.conf")).unwrap(), "flat");
        assert_eq!(fs::read_to_string(dst.join("local.conf")).unwrap(), "mine");
        assert_eq!(report.written, vec![dst.join("default.conf")]);
    }
}
