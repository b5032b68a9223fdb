//! Network bootstrap.
//!
//! ```text
//! Unknown ──probe──▶ Probing ──reachable──────────────────────▶ Connected
//!                       │
//!                       └─▶ strategy A ─▶ probe ─▶ strategy B ─▶ probe ─▶ Failed
//! ```
//!
//! A strategy only counts as successful when the reachability probe passes
//! afterwards; what the strategy's own tools report is not trusted.

pub mod nmcli;
pub mod strategy;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::UpgradeError;
use crate::host::Host;

pub use strategy::{ConnectionStrategy, LocalPackages, WirelessAssociation};

/// Visible wireless network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessPoint {
    pub ssid: String,
    pub signal: u8,
    /// Empty for open networks.
    pub security: String,
}

impl AccessPoint {
    pub fn is_open(&self) -> bool {
        self.security.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkState {
    Unknown,
    Probing,
    Connected,
    Failed,
}

/// Result of the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkOutcome {
    pub state: NetworkState,
    /// Strategy that restored reachability; `None` when already online.
    pub via: Option<String>,
    /// Strategies attempted, in order.
    pub attempted: Vec<String>,
}

impl NetworkOutcome {
    /// Outcome for runs that bypass the bootstrapper.
    pub fn skipped() -> Self {
        Self {
            state: NetworkState::Unknown,
            via: None,
            attempted: Vec::new(),
        }
    }
}

/// Ordered strategy chain.
pub struct Bootstrapper {
    strategies: Vec<Box<dyn ConnectionStrategy>>,
    state: NetworkState,
}

impl Bootstrapper {
    pub fn new(strategies: Vec<Box<dyn ConnectionStrategy>>) -> Self {
        Self {
            strategies,
            state: NetworkState::Unknown,
        }
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    /// Probe, then walk the strategies until one restores reachability.
    pub fn run(&mut self, host: &Host) -> Result<NetworkOutcome, UpgradeError> {
        self.state = NetworkState::Probing;
        if host.network.probe() {
            info!("Network reachable");
            self.state = NetworkState::Connected;
            return Ok(NetworkOutcome {
                state: self.state,
                via: None,
                attempted: Vec::new(),
            });
        }

        info!("Network unreachable, trying connection strategies");
        let mut attempted = Vec::new();

        for strategy in &self.strategies {
            if !strategy.applicable(host) {
                debug!(strategy = strategy.name(), "not applicable");
                continue;
            }

            info!(strategy = strategy.name(), "attempting");
            attempted.push(strategy.name().to_string());
            if let Err(e) = strategy.attempt(host) {
                warn!(strategy = strategy.name(), "{:#}", e);
            }

            if host.network.probe() {
                info!(strategy = strategy.name(), "Network reachable");
                self.state = NetworkState::Connected;
                return Ok(NetworkOutcome {
                    state: self.state,
                    via: Some(strategy.name().to_string()),
                    attempted,
                });
            }
            warn!(strategy = strategy.name(), "still unreachable");
        }

        self.state = NetworkState::Failed;
        Err(UpgradeError::NetworkUnavailable { attempted })
    }
}
