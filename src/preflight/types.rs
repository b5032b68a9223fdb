//! Preflight results, grouped by the pipeline stage each check guards.

use std::collections::BTreeMap;

use crate::error::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    /// The guarded stage would fail.
    Fail,
    /// The stage would run in a degraded way (skipped tree, no fallback).
    Warn,
    /// The stage has nothing to do for this kit.
    Skip,
}

impl CheckStatus {
    fn label(self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Warn => "WARN",
            CheckStatus::Skip => "SKIP",
        }
    }
}

/// One check, tagged with the stage that depends on it.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub stage: Stage,
    pub name: String,
    pub status: CheckStatus,
    pub details: Option<String>,
}

impl CheckResult {
    fn new(stage: Stage, name: &str, status: CheckStatus, details: Option<&str>) -> Self {
        Self {
            stage,
            name: name.to_string(),
            status,
            details: details.map(str::to_string),
        }
    }

    pub fn pass(stage: Stage, name: &str) -> Self {
        Self::new(stage, name, CheckStatus::Pass, None)
    }

    pub fn fail(stage: Stage, name: &str, details: &str) -> Self {
        Self::new(stage, name, CheckStatus::Fail, Some(details))
    }

    pub fn warn(stage: Stage, name: &str, details: &str) -> Self {
        Self::new(stage, name, CheckStatus::Warn, Some(details))
    }

    pub fn skip(stage: Stage, name: &str, details: &str) -> Self {
        Self::new(stage, name, CheckStatus::Skip, Some(details))
    }

    /// Attach what was found (a tool path, the deployment root).
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    pub fn all_passed(&self) -> bool {
        self.first_blocked_stage().is_none()
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    pub fn fail_count(&self) -> usize {
        self.count(CheckStatus::Fail)
    }

    /// Earliest stage an upgrade would stop at.
    pub fn first_blocked_stage(&self) -> Option<Stage> {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .map(|c| c.stage)
            .min()
    }

    /// Checks keyed by stage, in pipeline order.
    pub fn by_stage(&self) -> BTreeMap<Stage, Vec<&CheckResult>> {
        let mut groups: BTreeMap<Stage, Vec<&CheckResult>> = BTreeMap::new();
        for check in &self.checks {
            groups.entry(check.stage).or_default().push(check);
        }
        groups
    }

    pub fn print(&self) {
        println!("=== Preflight ===");

        for (stage, checks) in self.by_stage() {
            println!("\n[{}]", stage);
            for check in checks {
                match &check.details {
                    Some(details) => {
                        println!("  {} {}: {}", check.status.label(), check.name, details)
                    }
                    None => println!("  {} {}", check.status.label(), check.name),
                }
            }
        }

        println!();
        println!(
            "Summary: {}/{} passed, {} warnings",
            self.count(CheckStatus::Pass),
            self.checks.len(),
            self.count(CheckStatus::Warn)
        );
        if let Some(stage) = self.first_blocked_stage() {
            println!("         upgrade would stop at the {} stage", stage);
        }
    }
}
