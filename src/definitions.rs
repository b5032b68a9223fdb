//! Built-in kit declarations.
//!
//! These are the Plus variant's defaults. A kit's `kit.json` may replace any
//! of the lists; whatever it leaves out falls back to the values here.

/// Packages that must be present after the run.
pub const PACKAGES: &[&str] = &[
    "brightnessctl",
    "keyd",
    "openssh",
    "networkmanager",
    "bluez",
    "bluez-utils",
    "linux-headers",
];

/// Configuration trees merged additively into the deployment.
pub const CONFIG_TREES: &[&str] = &[
    "etc/keyd",
    "etc/sudoers.d",
    "etc/udev/rules.d",
    "usr/share/inputplumber/profiles",
    "usr/share/kazeta-plus",
];

/// Executables superseded wholesale (backup-and-replace, mode 0755).
pub const EXECUTABLES: &[&str] = &[
    "usr/bin/kazeta",
    "usr/bin/kazeta-bios",
    "usr/bin/kazeta-session",
    "usr/bin/kazeta-mount",
    "usr/bin/kazeta-wifi-setup",
];

/// Security policy files superseded wholesale (backup-and-replace, mode 0440).
pub const POLICY_FILES: &[&str] = &["etc/sudoers"];

/// Services enabled and started at the end of the run, in order.
pub const SERVICES: &[&str] = &[
    "NetworkManager.service",
    "bluetooth.service",
    "keyd.service",
    "sshd.service",
    "inputplumber.service",
];

/// Services brought up after installing the local package cache.
pub const NETWORK_SERVICES: &[&str] = &["NetworkManager.service"];

/// Privilege-escalation policy directory.
pub const POLICY_DIR: &str = "etc/sudoers.d";

/// Device-rule directory.
pub const DEVICE_RULES_DIR: &str = "etc/udev/rules.d";

/// Build descriptor expected in the module source directory.
pub const MODULE_DESCRIPTOR: &str = "PKGBUILD";

/// Package archive suffix, for bundled packages and build output.
pub const PACKAGE_SUFFIX: &str = ".pkg.tar.zst";

/// Suffix of the package file the module build produces.
pub const MODULE_ARTIFACT_SUFFIX: &str = PACKAGE_SUFFIX;

/// Suffix appended to superseded files.
pub const BACKUP_SUFFIX: &str = ".bak";

pub const EXECUTABLE_MODE: u32 = 0o755;
pub const POLICY_FILE_MODE: u32 = 0o440;
pub const DEVICE_RULE_MODE: u32 = 0o644;
pub const SENSITIVE_DIR_MODE: u32 = 0o755;

/// Owner of deployed system files.
pub const SYSTEM_OWNER: &str = "root";
