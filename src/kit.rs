//! The upgrade kit: staging tree, optional inputs and declarations.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::definitions;

/// Declarations applied by the pipeline.
///
/// Read from `kit.json` when present; every omitted field keeps the built-in
/// default from [`definitions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KitManifest {
    pub packages: Vec<String>,
    pub services: Vec<String>,
    pub network_services: Vec<String>,
    pub config_trees: Vec<String>,
    pub executables: Vec<String>,
    pub policy_files: Vec<String>,
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for KitManifest {
    fn default() -> Self {
        Self {
            packages: owned(definitions::PACKAGES),
            services: owned(definitions::SERVICES),
            network_services: owned(definitions::NETWORK_SERVICES),
            config_trees: owned(definitions::CONFIG_TREES),
            executables: owned(definitions::EXECUTABLES),
            policy_files: owned(definitions::POLICY_FILES),
        }
    }
}

impl KitManifest {
    /// Parse a manifest from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(text).context("Invalid kit manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Paths must stay relative so they resolve inside the staging tree and
    /// the deployment.
    fn validate(&self) -> Result<()> {
        let paths = self
            .config_trees
            .iter()
            .chain(&self.executables)
            .chain(&self.policy_files);
        for path in paths {
            let p = Path::new(path);
            if p.is_absolute() || p.components().any(|c| c.as_os_str() == "..") {
                anyhow::bail!("Manifest path '{}' must be relative and stay inside the kit", path);
            }
        }
        Ok(())
    }
}

/// Resolved kit directory layout.
#[derive(Debug, Clone)]
pub struct Kit {
    pub root: PathBuf,
    /// Staging tree mirroring the deployment root.
    pub staging: PathBuf,
    /// Local package cache for offline network bring-up.
    pub packages_dir: PathBuf,
    /// Kernel-module source directory.
    pub module_dir: PathBuf,
    /// User asset templates.
    pub assets_dir: PathBuf,
    pub manifest: KitManifest,
}

impl Kit {
    pub const MANIFEST_FILE: &'static str = "kit.json";

    /// Open a kit directory, reading `kit.json` if it exists.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            anyhow::bail!("Kit directory {} does not exist", root.display());
        }

        let manifest_path = root.join(Self::MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            let text = fs::read_to_string(&manifest_path)
                .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
            KitManifest::from_json(&text)
                .with_context(|| format!("In {}", manifest_path.display()))?
        } else {
            KitManifest::default()
        };

        Ok(Self::with_manifest(root, manifest))
    }

    /// Lay out a kit at `root` with explicit declarations.
    pub fn with_manifest(root: &Path, manifest: KitManifest) -> Self {
        Self {
            root: root.to_path_buf(),
            staging: root.join("rootfs"),
            packages_dir: root.join("packages"),
            module_dir: root.join("module"),
            assets_dir: root.join("assets"),
            manifest,
        }
    }

    /// Print the declarations for `show plan`.
    pub fn print_plan(&self) {
        let m = &self.manifest;
        println!("Kit: {}", self.root.display());
        print_list("Packages", &m.packages);
        print_list("Config trees", &m.config_trees);
        print_list("Executables", &m.executables);
        print_list("Policy files", &m.policy_files);
        print_list("Services", &m.services);
        print_list("Network services", &m.network_services);
        println!(
            "Module source: {}",
            if self.module_dir.is_dir() { "present" } else { "absent" }
        );
        println!(
            "Assets: {}",
            if self.assets_dir.is_dir() { "present" } else { "absent" }
        );
    }
}

fn print_list(title: &str, items: &[String]) {
    println!("{} ({}):", title, items.len());
    for item in items {
        println!("  {}", item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_manifest_matches_definitions() {
        let m = KitManifest::default();
        assert_eq!(m.packages.len(), definitions::PACKAGES.len());
        assert!(m.services.contains(&"NetworkManager.service".to_string()));
        assert_eq!(m.policy_files, vec!["etc/sudoers".to_string()]);
    }

    #[test]
    fn test_partial_manifest_keeps_defaults() {
        let m = KitManifest::from_json(r#"{ "packages": ["keyd"] }"#).unwrap();
        assert_eq!(m.packages, vec!["keyd".to_string()]);
        assert_eq!(m.services, KitManifest::default().services);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = KitManifest::from_json(r#"{ "pakages": ["keyd"] }"#).unwrap_err();
        assert!(format!("{:#}", err).contains("pakages"));
    }

    #[test]
    fn test_escaping_paths_rejected() {
        assert!(KitManifest::from_json(r#"{ "executables": ["/usr/bin/x"] }"#).is_err());
        assert!(KitManifest::from_json(r#"{ "config_trees": ["etc/../../x"] }"#).is_err());
    }

    #[test]
    fn test_open_reads_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("kit.json"),
            r#"{ "services": ["keyd.service"] }"#,
        )
        .unwrap();
        let kit = Kit::open(dir.path()).unwrap();
        assert_eq!(kit.manifest.services, vec!["keyd.service".to_string()]);
        assert_eq!(kit.staging, dir.path().join("rootfs"));
    }

    #[test]
    fn test_open_missing_dir_fails() {
        assert!(Kit::open(Path::new("/nonexistent/kit-12345")).is_err());
    }
}
