//! Kernel-module stage.
//!
//! Lifecycle of a build job: stale artifacts removed, source tree handed to
//! the builder account, package built as that account, the single produced
//! artifact located, then installed with the orchestrator's rights.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::definitions;
use crate::error::UpgradeError;
use crate::host::Host;

/// Out-of-tree module build request.
#[derive(Debug, Clone)]
pub struct ModuleBuildJob {
    pub source_dir: PathBuf,
    pub descriptor: String,
    pub artifact_suffix: String,
}

impl ModuleBuildJob {
    pub fn new(source_dir: &Path) -> Self {
        Self {
            source_dir: source_dir.to_path_buf(),
            descriptor: definitions::MODULE_DESCRIPTOR.to_string(),
            artifact_suffix: definitions::MODULE_ARTIFACT_SUFFIX.to_string(),
        }
    }

    /// Artifacts directly inside the source directory, sorted.
    pub fn artifacts(&self) -> Result<Vec<PathBuf>> {
        let mut found: Vec<PathBuf> = fs::read_dir(&self.source_dir)
            .with_context(|| format!("Failed to read {}", self.source_dir.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.ends_with(&self.artifact_suffix))
                        .unwrap_or(false)
            })
            .collect();
        found.sort();
        Ok(found)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status", content = "detail")]
pub enum ModuleOutcome {
    /// No module source in the kit.
    NotRequested,
    /// Source present without a build descriptor.
    SkippedNoDescriptor,
    Installed(PathBuf),
    /// Build failed but the module is configured as optional.
    FailedOptional(String),
}

/// Run the module stage. With `optional`, failures become
/// [`ModuleOutcome::FailedOptional`] instead of stopping the pipeline.
pub fn build_and_install(
    host: &Host,
    job: &ModuleBuildJob,
    optional: bool,
) -> Result<ModuleOutcome, UpgradeError> {
    if !job.source_dir.is_dir() {
        info!("No module source in kit, skipping");
        return Ok(ModuleOutcome::NotRequested);
    }
    if !job.source_dir.join(&job.descriptor).is_file() {
        warn!(
            dir = %job.source_dir.display(),
            "{} missing, skipping module build",
            job.descriptor
        );
        return Ok(ModuleOutcome::SkippedNoDescriptor);
    }

    match run_job(host, job) {
        Ok(artifact) => Ok(ModuleOutcome::Installed(artifact)),
        Err(e) if optional => {
            warn!("Optional module not installed: {}", e);
            Ok(ModuleOutcome::FailedOptional(e.to_string()))
        }
        Err(e) => Err(e),
    }
}

fn run_job(host: &Host, job: &ModuleBuildJob) -> Result<PathBuf, UpgradeError> {
    let failed = |cause: anyhow::Error| UpgradeError::ModuleBuildFailed { cause };

    for stale in job.artifacts().map_err(failed)? {
        info!(path = %stale.display(), "Removing stale artifact");
        fs::remove_file(&stale)
            .with_context(|| format!("Failed to remove {}", stale.display()))
            .map_err(failed)?;
    }

    let identity = host.builder.identity().to_string();
    host.ownership
        .chown_recursive(&job.source_dir, &identity, &identity)
        .with_context(|| format!("Failed to hand {} to '{}'", job.source_dir.display(), identity))
        .map_err(failed)?;

    info!(user = %identity, dir = %job.source_dir.display(), "Building module");
    host.builder.build(&job.source_dir).map_err(failed)?;

    let mut artifacts = job.artifacts().map_err(failed)?;
    let artifact = match artifacts.len() {
        0 => {
            return Err(UpgradeError::BuildArtifactMissing {
                dir: job.source_dir.clone(),
                suffix: job.artifact_suffix.clone(),
            })
        }
        1 => artifacts.remove(0),
        _ => return Err(UpgradeError::AmbiguousBuildArtifact { found: artifacts }),
    };

    info!(artifact = %artifact.display(), "Installing module package");
    host.packages
        .install_files(std::slice::from_ref(&artifact))
        .map_err(failed)?;
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use tempfile::TempDir;

    fn module_dir(tmp: &TempDir) -> PathBuf {
        let dir = tmp.path().join("module");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("PKGBUILD"), "pkgname=gcadapter-oc-dkms\n").unwrap();
        dir
    }

    #[test]
    fn test_absent_source_is_not_requested() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeHost::new();
        let job = ModuleBuildJob::new(&tmp.path().join("module"));
        let outcome = build_and_install(&fake.host(), &job, false).unwrap();
        assert_eq!(outcome, ModuleOutcome::NotRequested);
        assert!(fake.journal().is_empty());
    }

    #[test]
    fn test_missing_descriptor_skips_with_warning() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("module")).unwrap();
        let fake = FakeHost::new();
        let job = ModuleBuildJob::new(&tmp.path().join("module"));
        let outcome = build_and_install(&fake.host(), &job, false).unwrap();
        assert_eq!(outcome, ModuleOutcome::SkippedNoDescriptor);
        assert_eq!(fake.count("build"), 0);
    }

    #[test]
    fn test_build_then_install_order() {
        let tmp = TempDir::new().unwrap();
        let dir = module_dir(&tmp);
        fs::write(dir.join("old-1.0-1-x86_64.pkg.tar.zst"), "stale").unwrap();
        let fake = FakeHost::new().with(|s| {
            s.build_outputs = vec!["gcadapter-oc-dkms-1.1-1-x86_64.pkg.tar.zst".into()];
        });

        let outcome = build_and_install(&fake.host(), &ModuleBuildJob::new(&dir), false).unwrap();

        let artifact = dir.join("gcadapter-oc-dkms-1.1-1-x86_64.pkg.tar.zst");
        assert_eq!(outcome, ModuleOutcome::Installed(artifact));
        assert!(!dir.join("old-1.0-1-x86_64.pkg.tar.zst").exists());

        let chown = fake.position("chown builder:builder").unwrap();
        let build = fake.position("build ").unwrap();
        let install = fake.position("install-files gcadapter").unwrap();
        assert!(chown < build && build < install);
    }

    #[test]
    fn test_no_artifact_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let dir = module_dir(&tmp);
        let fake = FakeHost::new();
        let err = build_and_install(&fake.host(), &ModuleBuildJob::new(&dir), false).unwrap_err();
        assert!(matches!(err, UpgradeError::BuildArtifactMissing { .. }));
        assert_eq!(fake.count("install-files"), 0);
    }

    #[test]
    fn test_multiple_artifacts_are_ambiguous() {
        let tmp = TempDir::new().unwrap();
        let dir = module_dir(&tmp);
        let fake = FakeHost::new().with(|s| {
            s.build_outputs = vec!["a.pkg.tar.zst".into(), "a-debug.pkg.tar.zst".into()];
        });
        let err = build_and_install(&fake.host(), &ModuleBuildJob::new(&dir), false).unwrap_err();
        match err {
            UpgradeError::AmbiguousBuildArtifact { found } => assert_eq!(found.len(), 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_optional_module_failure_continues() {
        let tmp = TempDir::new().unwrap();
        let dir = module_dir(&tmp);
        let fake = FakeHost::new().with(|s| s.build_fails = true);
        let outcome = build_and_install(&fake.host(), &ModuleBuildJob::new(&dir), true).unwrap();
        assert!(matches!(outcome, ModuleOutcome::FailedOptional(ref msg) if msg.contains("makepkg")));
    }
}
