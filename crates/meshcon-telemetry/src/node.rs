//! Per-node telemetry state.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use meshcon_protocol::{NodeAddress, PacketMeta, Timestamp, FAULT_FRIENDLESS};
use serde::Serialize;

use crate::ema::Ema;

/// Tri-state of a generic on/off server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnOffStatus {
    /// No on/off status received yet.
    #[default]
    Unknown,
    Off,
    On,
}

impl From<bool> for OnOffStatus {
    fn from(on: bool) -> Self {
        if on {
            OnOffStatus::On
        } else {
            OnOffStatus::Off
        }
    }
}

impl fmt::Display for OnOffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnOffStatus::Unknown => write!(f, "unknown"),
            OnOffStatus::Off => write!(f, "off"),
            OnOffStatus::On => write!(f, "on"),
        }
    }
}

/// Human-readable name of a health fault code.
pub fn fault_name(code: u8) -> String {
    match code {
        FAULT_FRIENDLESS => "Friendless".to_string(),
        other => format!("Fault 0x{other:02X}"),
    }
}

/// Everything known about one mesh node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    /// Unicast address; the table key.
    pub address: NodeAddress,
    /// Display name, `Node 0x%04X` unless renamed.
    pub name: String,
    /// Timestamp of the latest message from this node.
    pub last_seen: Timestamp,
    /// Fault codes from the latest health report.
    pub faults: BTreeSet<u8>,
    /// Average RSSI over all packets.
    pub avg_rssi: Ema,
    /// Average TTL over all packets.
    pub avg_ttl: Ema,
    /// Average battery voltage.
    pub battery: Ema,
    /// Average RSSI bucketed by TTL.
    pub avg_rssi_by_ttl: BTreeMap<u8, Ema>,
    /// Packets received from this node.
    pub msg_count: u64,
    /// Packets received, bucketed by TTL.
    pub msg_count_by_ttl: BTreeMap<u8, u64>,
    /// Latest on/off state.
    pub onoff_status: OnOffStatus,
    /// Timestamp of the latest health report this session.
    pub last_health_status_seen: Option<Timestamp>,
    /// Health reports received this session.
    pub health_status_count: u64,
    /// Estimated health reports missed this session.
    pub health_status_loss_count: u64,
}

impl Node {
    /// Default display name for an address.
    pub fn default_name(address: NodeAddress) -> String {
        format!("Node {address}")
    }

    /// Create a node first seen at `timestamp`.
    pub fn new(address: NodeAddress, name: String, timestamp: Timestamp) -> Self {
        Node {
            address,
            name,
            last_seen: timestamp,
            faults: BTreeSet::new(),
            avg_rssi: Ema::new(),
            avg_ttl: Ema::new(),
            battery: Ema::new(),
            avg_rssi_by_ttl: BTreeMap::new(),
            msg_count: 0,
            msg_count_by_ttl: BTreeMap::new(),
            onoff_status: OnOffStatus::Unknown,
            last_health_status_seen: None,
            health_status_count: 0,
            health_status_loss_count: 0,
        }
    }

    /// Record that the node was heard at `timestamp`.
    pub fn touch(&mut self, timestamp: Timestamp) {
        self.last_seen = timestamp;
    }

    /// Fold the metadata of one received packet into the averages and counters.
    pub fn record_packet(&mut self, meta: PacketMeta, alpha: f64, timestamp: Timestamp) {
        self.avg_ttl.update(f64::from(meta.ttl), alpha);
        self.avg_rssi.update(meta.rssi, alpha);
        self.avg_rssi_by_ttl
            .entry(meta.ttl)
            .or_default()
            .update(meta.rssi, alpha);

        self.msg_count += 1;
        *self.msg_count_by_ttl.entry(meta.ttl).or_insert(0) += 1;

        self.touch(timestamp);
    }

    /// Account for one health report, estimating how many were missed.
    ///
    /// Reports are expected every `period_secs`; the gap since the previous
    /// report is rounded to whole periods so jitter does not count as loss.
    pub fn record_health(&mut self, timestamp: Timestamp, period_secs: f64) {
        if let Some(previous) = self.last_health_status_seen {
            let periods = (timestamp.secs_since(previous) / period_secs).round();
            let missed = (periods - 1.0).max(0.0);
            self.health_status_loss_count += missed as u64;
        }
        self.last_health_status_seen = Some(timestamp);
        self.health_status_count += 1;
    }

    /// Share of this node's packets that arrived with the given TTL.
    pub fn ttl_share(&self, ttl: u8) -> Option<f64> {
        let count = *self.msg_count_by_ttl.get(&ttl)?;
        if self.msg_count == 0 {
            return None;
        }
        Some(count as f64 / self.msg_count as f64)
    }

    /// Comma-separated fault names, or `Healthy`.
    pub fn describe_faults(&self) -> String {
        if self.faults.is_empty() {
            return "Healthy".to_string();
        }
        self.faults
            .iter()
            .map(|&code| fault_name(code))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
