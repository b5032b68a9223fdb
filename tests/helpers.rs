//! Shared test utilities for upgrade-kit tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use upgrade_kit::config::Config;
use upgrade_kit::kit::{Kit, KitManifest};
use upgrade_kit::pipeline::UpgradeContext;

/// Name of the deployment directory created under the mount root.
pub const DEPLOYMENT: &str = "kazeta-1.2";

/// Test environment: a kit directory and a mount root holding one deployment.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Kit root (`rootfs/`, `packages/`, `module/`, `assets/` live here)
    pub kit_dir: PathBuf,
    /// Mount root scanned for deployments
    pub mount_root: PathBuf,
    /// The deployment the pipeline should find
    pub deployment: PathBuf,
}

impl TestEnv {
    /// Create a kit with an empty staging tree and one matching deployment.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let kit_dir = base.join("kit");
        let mount_root = base.join("mnt");
        let deployment = mount_root.join(DEPLOYMENT);

        fs::create_dir_all(kit_dir.join("rootfs")).expect("Failed to create staging dir");
        fs::create_dir_all(&deployment).expect("Failed to create deployment dir");

        Self {
            _temp_dir: temp_dir,
            kit_dir,
            mount_root,
            deployment,
        }
    }

    /// Create an environment without any deployment under the mount root.
    pub fn without_deployment() -> Self {
        let env = Self::new();
        fs::remove_dir_all(&env.deployment).expect("Failed to remove deployment dir");
        env
    }

    /// Configuration pointing at this environment's mount root.
    pub fn config(&self) -> Config {
        let mut vars = HashMap::new();
        vars.insert(
            "UPKIT_MOUNT_ROOTS".to_string(),
            self.mount_root.display().to_string(),
        );
        Config::from_vars(&vars).expect("Failed to build config")
    }

    pub fn kit(&self, manifest: KitManifest) -> Kit {
        Kit::with_manifest(&self.kit_dir, manifest)
    }

    pub fn context(&self, manifest: KitManifest) -> UpgradeContext {
        UpgradeContext::new(self.kit(manifest), self.config())
    }

    /// Write a file into the kit's staging tree.
    pub fn stage(&self, rel: &str, contents: &str) -> PathBuf {
        write_file(&self.kit_dir.join("rootfs").join(rel), contents)
    }

    /// Write a file into the kit outside the staging tree.
    pub fn kit_file(&self, rel: &str, contents: &str) -> PathBuf {
        write_file(&self.kit_dir.join(rel), contents)
    }

    /// Write a file into the deployment.
    pub fn deployed(&self, rel: &str, contents: &str) -> PathBuf {
        write_file(&self.deployment.join(rel), contents)
    }

    /// Path inside the deployment.
    pub fn target(&self, rel: &str) -> PathBuf {
        self.deployment.join(rel)
    }
}

/// Manifest with a single package, service, config tree and executable.
pub fn small_manifest() -> KitManifest {
    KitManifest {
        packages: vec!["P".to_string()],
        services: vec!["S.service".to_string()],
        network_services: vec!["NetworkManager.service".to_string()],
        config_trees: vec!["etc/kazeta".to_string()],
        executables: vec!["usr/bin/E".to_string()],
        policy_files: Vec::new(),
    }
}

fn write_file(path: &Path, contents: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(path, contents).expect("Failed to write file");
    path.to_path_buf()
}

/// Permission bits of a file.
pub fn mode_of(path: &Path) -> u32 {
    fs::metadata(path)
        .unwrap_or_else(|e| panic!("Failed to stat {}: {}", path.display(), e))
        .permissions()
        .mode()
        & 0o777
}

/// Set permission bits on a file.
pub fn set_mode(path: &Path, mode: u32) {
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("Failed to chmod");
}

/// Assert that a file contains exactly the expected content.
pub fn assert_file_content(path: &Path, expected: &str) {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    assert_eq!(
        content,
        expected,
        "Unexpected content in {}",
        path.display()
    );
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "File should exist: {}", path.display());
}

/// Assert that nothing exists at a path.
pub fn assert_absent(path: &Path) {
    assert!(
        path.symlink_metadata().is_err(),
        "Path should not exist: {}",
        path.display()
    );
}
