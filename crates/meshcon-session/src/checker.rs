//! Edge-triggered checks over node on/off state.
//!
//! A [`Detector`] watches one named node for transitions into a target
//! state. The first known reading only primes it; after that it fires once
//! for every change into the target. Unknown readings are ignored.

use meshcon_telemetry::{NodeTable, OnOffStatus};
use tracing::{debug, info};

use crate::config::CheckConfig;

/// A message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub text: String,
}

/// Watches one node for transitions into one on/off state.
#[derive(Debug, Clone)]
pub struct Detector {
    node_name: String,
    target: OnOffStatus,
    last: OnOffStatus,
    action: Notification,
}

impl Detector {
    pub fn new(node_name: impl Into<String>, target: OnOffStatus, action: Notification) -> Self {
        Detector {
            node_name: node_name.into(),
            target,
            last: OnOffStatus::Unknown,
            action,
        }
    }

    /// Name of the watched node.
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// State this detector fires on.
    pub fn target(&self) -> OnOffStatus {
        self.target
    }

    /// Evaluate against the table. Returns `true` when the node has just
    /// changed into the target state.
    pub fn observe(&mut self, table: &NodeTable) -> bool {
        let Some(current) = self.current(table) else {
            return false;
        };
        if current == self.last {
            return false;
        }
        let previous = std::mem::replace(&mut self.last, current);
        previous != OnOffStatus::Unknown && current == self.target
    }

    /// Adopt the table's current state without firing.
    pub fn prime(&mut self, table: &NodeTable) {
        if let Some(current) = self.current(table) {
            self.last = current;
        }
    }

    fn current(&self, table: &NodeTable) -> Option<OnOffStatus> {
        table
            .find_by_name(&self.node_name)
            .map(|node| node.onoff_status)
            .filter(|status| *status != OnOffStatus::Unknown)
    }
}

/// Open/close detector pair for one configured check.
pub fn open_close_detectors(check: &CheckConfig) -> [Detector; 2] {
    let notify = |text: String| Notification {
        recipient: check.recipient.clone(),
        text,
    };
    [
        Detector::new(
            check.node.clone(),
            OnOffStatus::On,
            notify(format!("{} is opened.", check.thing)),
        ),
        Detector::new(
            check.node.clone(),
            OnOffStatus::Off,
            notify(format!("{} is closed.", check.thing)),
        ),
    ]
}

/// All configured detectors.
#[derive(Debug, Clone, Default)]
pub struct ChangeChecker {
    detectors: Vec<Detector>,
}

impl ChangeChecker {
    pub fn new(detectors: Vec<Detector>) -> Self {
        ChangeChecker { detectors }
    }

    /// Build open/close detectors for every check.
    pub fn from_checks(checks: &[CheckConfig]) -> Self {
        Self::new(checks.iter().flat_map(open_close_detectors).collect())
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Evaluate every detector and collect the actions that fired.
    pub fn check(&mut self, table: &NodeTable) -> Vec<Notification> {
        let mut fired = Vec::new();
        for detector in &mut self.detectors {
            if detector.observe(table) {
                info!(node = %detector.node_name, target = %detector.target, "check fired");
                fired.push(detector.action.clone());
            }
        }
        fired
    }

    /// Prime every detector from the table, e.g. after replay.
    pub fn prime(&mut self, table: &NodeTable) {
        for detector in &mut self.detectors {
            detector.prime(table);
        }
        debug!(detectors = self.detectors.len(), "checks primed");
    }
}
