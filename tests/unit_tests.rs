//! Unit tests for upgrade-kit.
//!
//! These exercise pure functions and single stages in isolation, without
//! running the whole pipeline.

mod helpers;

use helpers::{assert_file_content, mode_of, TestEnv, DEPLOYMENT};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use upgrade_kit::error::{Stage, UpgradeError};
use upgrade_kit::host::fake::FakeHost;
use upgrade_kit::kit::{Kit, KitManifest};
use upgrade_kit::network::nmcli;
use upgrade_kit::pipeline::files::{backup_and_replace, backup_path, FileDeploymentEntry};
use upgrade_kit::pipeline::DeployReport;
use upgrade_kit::target;

// =============================================================================
// target.rs tests
// =============================================================================

#[test]
fn test_locate_first_root_wins() {
    let env = TestEnv::new();
    let second = env._temp_dir.path().join("media");
    fs::create_dir_all(second.join("kazeta-9.9")).unwrap();
    let pattern = Regex::new("^kazeta(-.+)?$").unwrap();

    let found = target::locate(&[env.mount_root.clone(), second], &pattern, None).unwrap();

    assert_eq!(found.root, env.mount_root.join(DEPLOYMENT));
    assert_eq!(found.home, found.root.join("home"));
}

#[test]
fn test_locate_sorted_by_name() {
    let env = TestEnv::new();
    fs::create_dir_all(env.mount_root.join("kazeta-0.9")).unwrap();
    let pattern = Regex::new("^kazeta(-.+)?$").unwrap();

    let found = target::locate(&[env.mount_root.clone()], &pattern, None).unwrap();
    assert_eq!(found.root, env.mount_root.join("kazeta-0.9"));
}

#[test]
fn test_locate_ignores_files_and_missing_roots() {
    let env = TestEnv::without_deployment();
    fs::write(env.mount_root.join("kazeta-file"), "not a dir").unwrap();
    let pattern = Regex::new("^kazeta(-.+)?$").unwrap();

    let err = target::locate(
        &[PathBuf::from("/nonexistent/root-4242"), env.mount_root.clone()],
        &pattern,
        None,
    )
    .unwrap_err();

    assert_eq!(err.stage(), Stage::Target);
    assert!(err.to_string().contains("/nonexistent/root-4242"));
}

#[test]
fn test_home_root_override() {
    let env = TestEnv::new();
    let pattern = Regex::new("^kazeta").unwrap();
    let found = target::locate(
        &[env.mount_root.clone()],
        &pattern,
        Some(Path::new("/home")),
    )
    .unwrap();
    assert_eq!(found.user_home("gamer"), PathBuf::from("/home/gamer"));
}

// =============================================================================
// kit.rs tests
// =============================================================================

#[test]
fn test_kit_layout() {
    let env = TestEnv::new();
    let kit = Kit::open(&env.kit_dir).unwrap();
    assert_eq!(kit.staging, env.kit_dir.join("rootfs"));
    assert_eq!(kit.packages_dir, env.kit_dir.join("packages"));
    assert_eq!(kit.module_dir, env.kit_dir.join("module"));
    assert_eq!(kit.assets_dir, env.kit_dir.join("assets"));
    assert_eq!(kit.manifest, KitManifest::default());
}

#[test]
fn test_kit_invalid_manifest_names_file() {
    let env = TestEnv::new();
    env.kit_file("kit.json", "{ not json");
    let err = Kit::open(&env.kit_dir).unwrap_err();
    assert!(format!("{:#}", err).contains("kit.json"));
}

// =============================================================================
// files.rs tests
// =============================================================================

#[test]
fn test_backup_path_appends_suffix() {
    assert_eq!(
        backup_path(Path::new("/d/usr/bin/kazeta")),
        PathBuf::from("/d/usr/bin/kazeta.bak")
    );
    assert_eq!(
        backup_path(Path::new("/d/etc/sudoers")),
        PathBuf::from("/d/etc/sudoers.bak")
    );
}

#[test]
fn test_backup_and_replace_sets_mode_and_owner() {
    let env = TestEnv::new();
    let source = env.stage("usr/bin/kazeta", "new");
    let dest = env.deployed("usr/bin/kazeta", "old");
    let fake = FakeHost::new();
    let entry = FileDeploymentEntry {
        source,
        dest: dest.clone(),
        mode: 0o755,
        owner: "root".into(),
    };
    let mut report = DeployReport::default();

    backup_and_replace(&entry, fake.host().ownership.as_ref(), &mut report).unwrap();

    assert_file_content(&dest, "new");
    assert_file_content(&backup_path(&dest), "old");
    assert_eq!(mode_of(&dest), 0o755);
    assert_eq!(report.backups, vec![backup_path(&dest)]);
    assert_eq!(fake.journal(), vec![format!("chown root:root {}", dest.display())]);
}

#[test]
fn test_backup_and_replace_missing_source() {
    let env = TestEnv::new();
    let entry = FileDeploymentEntry {
        source: env.kit_dir.join("rootfs/usr/bin/absent"),
        dest: env.target("usr/bin/absent"),
        mode: 0o755,
        owner: "root".into(),
    };
    let mut report = DeployReport::default();
    let result = backup_and_replace(&entry, FakeHost::new().host().ownership.as_ref(), &mut report);
    assert!(result.is_err());
    assert!(report.written.is_empty());
}

// =============================================================================
// nmcli.rs tests
// =============================================================================

#[test]
fn test_scan_output_with_escaped_ssid() {
    let out = "Cafe\\:Guest:70:WPA2\nHome:90:WPA1 WPA2\n";
    let aps = nmcli::parse_scan(out);
    assert_eq!(aps[0].ssid, "Home");
    assert_eq!(aps[1].ssid, "Cafe:Guest");
    assert_eq!(aps[1].security, "WPA2");
}

// =============================================================================
// error.rs tests
// =============================================================================

#[test]
fn test_only_service_failures_are_non_fatal() {
    let service = UpgradeError::ServiceActivationFailed {
        service: "keyd.service".into(),
        cause: anyhow::anyhow!("Unit keyd.service not found"),
    };
    let network = UpgradeError::NetworkUnavailable {
        attempted: vec!["wireless".into()],
    };
    assert!(!service.is_fatal());
    assert!(network.is_fatal());
    assert!(network.to_string().starts_with("network:"));
}
