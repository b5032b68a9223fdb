//! Deployment discovery.
//!
//! The writable deployment root is found by scanning the immediate children
//! of each configured mount root for a directory whose name matches the
//! deployment pattern. The first match wins; roots are searched in order and
//! children in name order so repeated runs pick the same deployment.

use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::UpgradeError;

/// One installed OS instance. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentTarget {
    pub root: PathBuf,
    pub etc: PathBuf,
    pub usr_bin: PathBuf,
    pub usr_share: PathBuf,
    pub home: PathBuf,
}

impl DeploymentTarget {
    /// Describe a deployment rooted at `root`. `home_root` overrides the
    /// default `<root>/home`.
    pub fn new(root: &Path, home_root: Option<&Path>) -> Self {
        Self {
            root: root.to_path_buf(),
            etc: root.join("etc"),
            usr_bin: root.join("usr/bin"),
            usr_share: root.join("usr/share"),
            home: home_root
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.join("home")),
        }
    }

    /// Resolve a deployment-relative path.
    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    /// Home directory of `user` inside the deployment's home tree.
    pub fn user_home(&self, user: &str) -> PathBuf {
        self.home.join(user)
    }
}

/// Find the first directory matching `pattern` directly under any of `roots`.
pub fn locate(
    roots: &[PathBuf],
    pattern: &Regex,
    home_root: Option<&Path>,
) -> Result<DeploymentTarget, UpgradeError> {
    for root in roots {
        let mut children: Vec<PathBuf> = match fs::read_dir(root) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect(),
            Err(e) => {
                debug!(root = %root.display(), error = %e, "mount root not readable");
                continue;
            }
        };
        children.sort();

        let found = children.into_iter().find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| pattern.is_match(n))
                .unwrap_or(false)
        });

        if let Some(path) = found {
            return Ok(DeploymentTarget::new(&path, home_root));
        }
    }

    Err(UpgradeError::TargetNotFound {
        pattern: pattern.as_str().to_string(),
        searched: roots.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pattern() -> Regex {
        Regex::new("^kazeta(-.+)?$").unwrap()
    }

    #[test]
    fn test_finds_first_match_in_root_order() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::create_dir_all(a.join("other")).unwrap();
        fs::create_dir_all(b.join("kazeta-2")).unwrap();
        fs::create_dir_all(b.join("kazeta-1")).unwrap();

        let target = locate(&[a, b.clone()], &pattern(), None).unwrap();
        assert_eq!(target.root, b.join("kazeta-1"));
        assert_eq!(target.usr_bin, b.join("kazeta-1/usr/bin"));
        assert_eq!(target.home, b.join("kazeta-1/home"));
    }

    #[test]
    fn test_files_are_not_deployments() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("kazeta-1"), "not a dir").unwrap();
        let err = locate(&[tmp.path().to_path_buf()], &pattern(), None).unwrap_err();
        assert!(matches!(err, UpgradeError::TargetNotFound { .. }));
    }

    #[test]
    fn test_missing_roots_are_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("kazeta")).unwrap();
        let roots = vec![PathBuf::from("/nonexistent-root-123"), tmp.path().to_path_buf()];
        let target = locate(&roots, &pattern(), None).unwrap();
        assert_eq!(target.root, tmp.path().join("kazeta"));
    }

    #[test]
    fn test_not_found_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = locate(&[tmp.path().to_path_buf()], &pattern(), None).unwrap_err();
        assert_eq!(err.stage(), crate::error::Stage::Target);
    }

    #[test]
    fn test_home_override() {
        let target = DeploymentTarget::new(Path::new("/d/kazeta"), Some(Path::new("/home")));
        assert_eq!(target.user_home("gamer"), PathBuf::from("/home/gamer"));
        assert_eq!(target.etc, PathBuf::from("/d/kazeta/etc"));
    }
}
