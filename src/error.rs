//! Pipeline error taxonomy.
//!
//! Every variant belongs to exactly one [`Stage`], and the rendered message
//! starts with that stage so the operator knows where the run stopped.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Preconditions,
    Target,
    Network,
    Packages,
    Module,
    Files,
    Permissions,
    Services,
    Assets,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Preconditions => "preconditions",
            Stage::Target => "target",
            Stage::Network => "network",
            Stage::Packages => "packages",
            Stage::Module => "module",
            Stage::Files => "files",
            Stage::Permissions => "permissions",
            Stage::Services => "services",
            Stage::Assets => "assets",
        };
        f.write_str(name)
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that stop (or, for services, are reported by) the upgrade pipeline.
///
/// `cause` fields hold the underlying `anyhow` chain; they are rendered with
/// the alternate formatter so the whole chain reaches the operator.
#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("preconditions: {0}")]
    PreconditionFailed(String),

    #[error(
        "target: no deployment matching '{pattern}' under {}",
        join_paths(.searched)
    )]
    TargetNotFound {
        pattern: String,
        searched: Vec<PathBuf>,
    },

    #[error("network: no connectivity after trying {}", .attempted.join(", "))]
    NetworkUnavailable { attempted: Vec<String> },

    #[error("packages: failed to install '{package}': {cause:#}")]
    PackageInstallFailed {
        package: String,
        cause: anyhow::Error,
    },

    #[error("module: no '*{suffix}' artifact produced in {}", .dir.display())]
    BuildArtifactMissing { dir: PathBuf, suffix: String },

    #[error("module: expected one build artifact, found {}", join_paths(.found))]
    AmbiguousBuildArtifact { found: Vec<PathBuf> },

    #[error("module: {cause:#}")]
    ModuleBuildFailed { cause: anyhow::Error },

    #[error("{stage}: {} could not be deployed: {cause:#}", .path.display())]
    DeployFailed {
        stage: Stage,
        path: PathBuf,
        cause: anyhow::Error,
    },

    #[error("services: '{service}' could not be activated: {cause:#}")]
    ServiceActivationFailed {
        service: String,
        cause: anyhow::Error,
    },
}

impl UpgradeError {
    /// Stage the error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            UpgradeError::PreconditionFailed(_) => Stage::Preconditions,
            UpgradeError::TargetNotFound { .. } => Stage::Target,
            UpgradeError::NetworkUnavailable { .. } => Stage::Network,
            UpgradeError::PackageInstallFailed { .. } => Stage::Packages,
            UpgradeError::BuildArtifactMissing { .. }
            | UpgradeError::AmbiguousBuildArtifact { .. }
            | UpgradeError::ModuleBuildFailed { .. } => Stage::Module,
            UpgradeError::DeployFailed { stage, .. } => *stage,
            UpgradeError::ServiceActivationFailed { .. } => Stage::Services,
        }
    }

    /// Whether the pipeline must stop on this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, UpgradeError::ServiceActivationFailed { .. })
    }
}
