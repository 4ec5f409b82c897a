//! The node table and its administrative operations.

use std::collections::BTreeMap;

use meshcon_protocol::{NodeAddress, Timestamp};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{TelemetryError, TelemetryResult};
use crate::gateway::GatewayState;
use crate::node::Node;

/// Every node heard through the gateway, plus the gateway's own state.
///
/// Ordered by address so snapshots and comparisons are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeTable {
    nodes: BTreeMap<NodeAddress, Node>,
    gateway: GatewayState,
}

impl NodeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a node by address.
    pub fn get(&self, address: NodeAddress) -> Option<&Node> {
        self.nodes.get(&address)
    }

    /// Look up a node by address, mutably.
    pub fn get_mut(&mut self, address: NodeAddress) -> Option<&mut Node> {
        self.nodes.get_mut(&address)
    }

    /// First node carrying the given display name.
    pub fn find_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.values().find(|node| node.name == name)
    }

    /// Fetch a node, creating it if this is its first sighting.
    pub fn get_or_insert_with(
        &mut self,
        address: NodeAddress,
        timestamp: Timestamp,
        name: impl FnOnce() -> String,
    ) -> &mut Node {
        self.nodes.entry(address).or_insert_with(|| {
            let name = name();
            info!(%address, %name, "new node");
            Node::new(address, name, timestamp)
        })
    }

    /// Iterate nodes in address order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node has been seen.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Gateway diagnostics.
    pub fn gateway(&self) -> &GatewayState {
        &self.gateway
    }

    /// Gateway diagnostics, mutably.
    pub fn gateway_mut(&mut self) -> &mut GatewayState {
        &mut self.gateway
    }

    // ========================================================================
    // Administrative operations
    // ========================================================================

    /// Rename a node.
    pub fn rename(&mut self, address: NodeAddress, name: &str) -> TelemetryResult<()> {
        let node = self
            .nodes
            .get_mut(&address)
            .ok_or(TelemetryError::UnknownAddress(address))?;
        debug!(%address, from = %node.name, to = %name, "rename");
        node.name = name.to_string();
        Ok(())
    }

    /// Remove every node not heard from within `timeout_secs` of `now`.
    ///
    /// Returns the removed addresses in ascending order.
    pub fn prune(&mut self, now: Timestamp, timeout_secs: f64) -> Vec<NodeAddress> {
        let cutoff = now.minus_secs(timeout_secs);
        let stale: Vec<NodeAddress> = self
            .nodes
            .values()
            .filter(|node| node.last_seen <= cutoff)
            .map(|node| node.address)
            .collect();
        for address in &stale {
            self.nodes.remove(address);
        }
        stale
    }

    /// Forget per-session health accounting on every node.
    pub fn session_reset(&mut self) {
        for node in self.nodes.values_mut() {
            node.last_health_status_seen = None;
            node.health_status_count = 0;
            node.health_status_loss_count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshcon_protocol::PacketMeta;

    fn table_with(addresses: &[(u16, f64)]) -> NodeTable {
        let mut table = NodeTable::new();
        for &(address, seen) in addresses {
            let address = NodeAddress(address);
            table.get_or_insert_with(address, Timestamp::from_secs(seen), || {
                Node::default_name(address)
            });
        }
        table
    }

    #[test]
    fn test_rename() {
        let mut table = table_with(&[(0x0005, 0.0)]);
        table.rename(NodeAddress(0x0005), "Front door").unwrap();
        assert_eq!(table.get(NodeAddress(0x0005)).unwrap().name, "Front door");
        assert!(table.find_by_name("Front door").is_some());
    }

    #[test]
    fn test_rename_unknown_address() {
        let mut table = table_with(&[(0x0005, 0.0)]);
        assert_eq!(
            table.rename(NodeAddress(0x0006), "x"),
            Err(TelemetryError::UnknownAddress(NodeAddress(0x0006)))
        );
    }

    #[test]
    fn test_prune_removes_only_stale_nodes() {
        let mut table = table_with(&[(0x0001, 0.0), (0x0002, 70.0), (0x0003, 100.0)]);
        let pruned = table.prune(Timestamp::from_secs(100.0), 30.0);
        assert_eq!(pruned, vec![NodeAddress(0x0001), NodeAddress(0x0002)]);
        assert_eq!(table.len(), 1);
        assert!(table.get(NodeAddress(0x0003)).is_some());
    }

    #[test]
    fn test_session_reset_clears_health_accounting() {
        let mut table = table_with(&[(0x0001, 0.0)]);
        let node = table.get_mut(NodeAddress(0x0001)).unwrap();
        node.record_packet(PacketMeta { ttl: 1, rssi: -40.0 }, 0.95, Timestamp::from_secs(0.0));
        node.record_health(Timestamp::from_secs(0.0), 10.0);
        node.record_health(Timestamp::from_secs(30.0), 10.0);

        table.session_reset();

        let node = table.get(NodeAddress(0x0001)).unwrap();
        assert_eq!(node.last_health_status_seen, None);
        assert_eq!(node.health_status_count, 0);
        assert_eq!(node.health_status_loss_count, 0);
        assert_eq!(node.msg_count, 1);
    }
}
