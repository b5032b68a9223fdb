//! In-memory host for tests.
//!
//! All fake collaborators share one [`FakeState`]; every call is appended to
//! its journal so tests can assert on ordering.

#![doc(hidden)]

use anyhow::{anyhow, bail, Result};
use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{
    Connectivity, DeviceRules, Host, Ownership, PackageManager, Prompter, ServiceManager,
    UnprivilegedBuilder,
};
use crate::network::AccessPoint;

#[derive(Debug, Default)]
pub struct FakeState {
    pub installed: BTreeSet<String>,
    pub failing_packages: BTreeSet<String>,
    pub enabled: BTreeSet<String>,
    pub active: BTreeSet<String>,
    pub failing_services: BTreeSet<String>,
    pub reachable: bool,
    /// Installing local package files restores reachability.
    pub local_install_connects: bool,
    /// Associating with a wireless network restores reachability.
    pub associate_connects: bool,
    pub interfaces: Vec<String>,
    pub networks: Vec<AccessPoint>,
    pub answers: VecDeque<String>,
    /// File names the fake build drops into the source directory.
    pub build_outputs: Vec<String>,
    pub build_fails: bool,
    pub journal: Vec<String>,
}

/// Handle on the shared fake state.
#[derive(Clone, Default)]
pub struct FakeHost {
    state: Rc<RefCell<FakeState>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate the state before a run.
    pub fn with(self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(&mut self.state.borrow_mut());
        self
    }

    pub fn state(&self) -> std::cell::Ref<'_, FakeState> {
        self.state.borrow()
    }

    pub fn journal(&self) -> Vec<String> {
        self.state.borrow().journal.clone()
    }

    /// Position of the first journal entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.state
            .borrow()
            .journal
            .iter()
            .position(|e| e.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.state
            .borrow()
            .journal
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    /// Build a [`Host`] whose collaborators all share this state.
    pub fn host(&self) -> Host {
        Host {
            packages: Box::new(Part(self.state.clone())),
            services: Box::new(Part(self.state.clone())),
            device_rules: Box::new(Part(self.state.clone())),
            builder: Box::new(Part(self.state.clone())),
            ownership: Box::new(Part(self.state.clone())),
            network: Box::new(Part(self.state.clone())),
            prompt: Box::new(Part(self.state.clone())),
        }
    }
}

struct Part(Rc<RefCell<FakeState>>);

impl Part {
    fn log(&self, entry: String) {
        self.0.borrow_mut().journal.push(entry);
    }
}

impl PackageManager for Part {
    fn is_installed(&self, name: &str) -> Result<bool> {
        self.log(format!("query {}", name));
        Ok(self.0.borrow().installed.contains(name))
    }

    fn install(&self, name: &str) -> Result<()> {
        self.log(format!("install {}", name));
        let mut state = self.0.borrow_mut();
        if state.failing_packages.contains(name) {
            bail!("target not found: {}", name);
        }
        state.installed.insert(name.to_string());
        Ok(())
    }

    fn install_files(&self, files: &[PathBuf]) -> Result<()> {
        let names: Vec<String> = files
            .iter()
            .map(|f| f.file_name().unwrap_or_default().to_string_lossy().into_owned())
            .collect();
        self.log(format!("install-files {}", names.join(" ")));
        let mut state = self.0.borrow_mut();
        if state.local_install_connects {
            state.reachable = true;
        }
        Ok(())
    }
}

impl ServiceManager for Part {
    fn is_enabled(&self, unit: &str) -> Result<bool> {
        Ok(self.0.borrow().enabled.contains(unit))
    }

    fn is_active(&self, unit: &str) -> Result<bool> {
        Ok(self.0.borrow().active.contains(unit))
    }

    fn enable(&self, unit: &str) -> Result<()> {
        self.log(format!("enable {}", unit));
        let mut state = self.0.borrow_mut();
        if state.failing_services.contains(unit) {
            bail!("Unit {} not found", unit);
        }
        state.enabled.insert(unit.to_string());
        Ok(())
    }

    fn start(&self, unit: &str) -> Result<()> {
        self.log(format!("start {}", unit));
        let mut state = self.0.borrow_mut();
        if state.failing_services.contains(unit) {
            bail!("Unit {} not found", unit);
        }
        state.active.insert(unit.to_string());
        Ok(())
    }
}

impl DeviceRules for Part {
    fn reload(&self) -> Result<()> {
        self.log("udev reload".to_string());
        Ok(())
    }

    fn trigger(&self) -> Result<()> {
        self.log("udev trigger".to_string());
        Ok(())
    }
}

impl UnprivilegedBuilder for Part {
    fn identity(&self) -> &str {
        "builder"
    }

    fn build(&self, source_dir: &Path) -> Result<()> {
        self.log(format!("build {}", source_dir.display()));
        let state = self.0.borrow();
        if state.build_fails {
            bail!("makepkg failed as 'builder' (exit code 4)");
        }
        for name in &state.build_outputs {
            fs::write(source_dir.join(name), "package")?;
        }
        Ok(())
    }
}

impl Ownership for Part {
    fn chown_recursive(&self, path: &Path, user: &str, group: &str) -> Result<()> {
        self.log(format!("chown {}:{} {}", user, group, path.display()));
        Ok(())
    }
}

impl Connectivity for Part {
    fn probe(&self) -> bool {
        self.log("probe".to_string());
        self.0.borrow().reachable
    }

    fn wireless_interfaces(&self) -> Result<Vec<String>> {
        Ok(self.0.borrow().interfaces.clone())
    }

    fn enable_radio(&self) -> Result<()> {
        self.log("radio on".to_string());
        Ok(())
    }

    fn scan(&self, iface: &str) -> Result<Vec<AccessPoint>> {
        self.log(format!("scan {}", iface));
        Ok(self.0.borrow().networks.clone())
    }

    fn associate(&self, iface: &str, ssid: &str, secret: Option<&str>) -> Result<()> {
        self.log(format!(
            "associate {} {} {}",
            iface,
            ssid,
            if secret.is_some() { "secured" } else { "open" }
        ));
        let mut state = self.0.borrow_mut();
        if state.associate_connects {
            state.reachable = true;
        }
        Ok(())
    }
}

impl Prompter for Part {
    fn ask(&self, question: &str) -> Result<String> {
        self.log(format!("prompt {}", question));
        self.0
            .borrow_mut()
            .answers
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted answer for '{}'", question))
    }

    fn ask_secret(&self, question: &str) -> Result<String> {
        self.ask(question)
    }
}
