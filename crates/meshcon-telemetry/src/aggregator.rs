//! Applies status messages to the node table.

use std::collections::BTreeMap;

use meshcon_metrics::{metric_defs, metrics, node_labels};
use meshcon_protocol::{NodeAddress, ProtocolResult, StatusMessage, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ema::DEFAULT_EMA_ALPHA;
use crate::error::{TelemetryError, TelemetryResult};
use crate::node::{Node, OnOffStatus};
use crate::table::NodeTable;

/// Nominal interval between health reports, in seconds.
pub const DEFAULT_HEALTH_PERIOD_SECS: f64 = 10.0;

/// Battery ADC conversion: input gain of 1/6, 0.6 V reference, 14-bit result.
const ADC_GAIN_INVERSE: f64 = 6.0;
const ADC_REFERENCE_VOLTS: f64 = 0.6;
const ADC_FULL_SCALE: f64 = (1u32 << 14) as f64;

/// Convert a raw battery ADC reading to volts.
pub fn adc_to_voltage(raw: f64) -> f64 {
    raw * ADC_GAIN_INVERSE * ADC_REFERENCE_VOLTS / ADC_FULL_SCALE
}

/// Configuration for the telemetry aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Smoothing factor of every moving average.
    pub ema_alpha: f64,
    /// Expected interval between health reports.
    pub health_period_secs: f64,
    /// Gateway log lines containing any of these are dropped as noise.
    pub log_noise_markers: Vec<String>,
    /// Names given to nodes when they are first seen.
    pub node_names: BTreeMap<NodeAddress, String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            ema_alpha: DEFAULT_EMA_ALPHA,
            health_period_secs: DEFAULT_HEALTH_PERIOD_SECS,
            log_noise_markers: vec!["Received raw".to_string()],
            node_names: BTreeMap::new(),
        }
    }
}

impl TelemetryConfig {
    /// Check that the numeric settings are usable.
    pub fn validate(&self) -> TelemetryResult<()> {
        if !(0.0..1.0).contains(&self.ema_alpha) {
            return Err(TelemetryError::InvalidConfig(format!(
                "ema_alpha must be in [0, 1), got {}",
                self.ema_alpha
            )));
        }
        if !(self.health_period_secs > 0.0) {
            return Err(TelemetryError::InvalidConfig(format!(
                "health_period_secs must be positive, got {}",
                self.health_period_secs
            )));
        }
        Ok(())
    }
}

/// What a status message changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEffect {
    /// A node's telemetry was updated.
    Node(NodeAddress),
    /// A line was appended to the gateway log.
    GatewayLog,
    /// A gateway log line was recognised as a raw packet dump and dropped.
    FilteredLog,
    /// The gateway address book capacity was updated.
    AddressBook,
}

/// Folds status messages into a [`NodeTable`].
#[derive(Debug, Clone, Default)]
pub struct TelemetryAggregator {
    config: TelemetryConfig,
}

impl TelemetryAggregator {
    /// Create an aggregator.
    pub fn new(config: TelemetryConfig) -> Self {
        TelemetryAggregator { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Decode a status body and apply it.
    pub fn process_status_line(
        &self,
        table: &mut NodeTable,
        timestamp: Timestamp,
        body: &str,
    ) -> ProtocolResult<StatusEffect> {
        let status = StatusMessage::parse(body)?;
        Ok(self.process_status(table, timestamp, &status))
    }

    /// Apply one decoded status message.
    ///
    /// Node-scoped messages create the node on first sight, update the shared
    /// packet metadata, then the op-specific field.
    pub fn process_status(
        &self,
        table: &mut NodeTable,
        timestamp: Timestamp,
        status: &StatusMessage,
    ) -> StatusEffect {
        let alpha = self.config.ema_alpha;

        let effect = match status {
            StatusMessage::Health { address, meta, faults } => {
                let node = self.node(table, *address, timestamp);
                node.record_packet(*meta, alpha, timestamp);
                node.faults = faults.clone();
                node.record_health(timestamp, self.config.health_period_secs);
                StatusEffect::Node(*address)
            }
            StatusMessage::Battery { address, meta, raw_adc } => {
                let node = self.node(table, *address, timestamp);
                node.record_packet(*meta, alpha, timestamp);
                node.battery.update(adc_to_voltage(*raw_adc), alpha);
                StatusEffect::Node(*address)
            }
            StatusMessage::OnOff { address, meta, on } => {
                let node = self.node(table, *address, timestamp);
                node.record_packet(*meta, alpha, timestamp);
                node.onoff_status = OnOffStatus::from(*on);
                StatusEffect::Node(*address)
            }
            StatusMessage::Log { text } => {
                if self.is_noise(text) {
                    trace!(%text, "dropping raw packet dump");
                    return StatusEffect::FilteredLog;
                }
                table.gateway_mut().logs.push(text.clone());
                StatusEffect::GatewayLog
            }
            StatusMessage::AddressBookCapacity { free, total } => {
                let gateway = table.gateway_mut();
                gateway.address_book_free_slots = Some(*free);
                gateway.address_book_total_slots = Some(*total);
                StatusEffect::AddressBook
            }
        };

        if let StatusEffect::Node(address) = effect {
            metrics::counter!(
                metric_defs::STATUS_PROCESSED.name,
                &node_labels(address.value(), status.op())
            )
            .increment(1);
            metrics::gauge!(metric_defs::NODES_TRACKED.name).set(table.len() as f64);
        }

        effect
    }

    fn node<'t>(&self, table: &'t mut NodeTable, address: NodeAddress, timestamp: Timestamp) -> &'t mut Node {
        table.get_or_insert_with(address, timestamp, || {
            self.config
                .node_names
                .get(&address)
                .cloned()
                .unwrap_or_else(|| Node::default_name(address))
        })
    }

    fn is_noise(&self, text: &str) -> bool {
        self.config
            .log_noise_markers
            .iter()
            .any(|marker| !marker.is_empty() && text.contains(marker.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshcon_protocol::ProtocolError;

    fn ts(secs: f64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    fn apply(aggregator: &TelemetryAggregator, table: &mut NodeTable, t: f64, body: &str) -> StatusEffect {
        aggregator.process_status_line(table, ts(t), body).unwrap()
    }

    #[test]
    fn test_adc_conversion() {
        assert!((adc_to_voltage(8192.0) - 1.8).abs() < 1e-12);
        assert_eq!(adc_to_voltage(0.0), 0.0);
    }

    #[test]
    fn test_health_then_battery() {
        let aggregator = TelemetryAggregator::default();
        let mut table = NodeTable::new();

        apply(&aggregator, &mut table, 1.0, "health 00AB 2 -55.0 [0000]");
        apply(&aggregator, &mut table, 2.0, "battery 00AB 2 -54.0 8192");

        let node = table.get(NodeAddress(0x00AB)).unwrap();
        assert_eq!(node.avg_ttl.value(), Some(2.0));
        assert!((node.battery.value().unwrap() - 1.8).abs() < 1e-9);
        assert!(node.faults.is_empty());
        assert_eq!(node.msg_count, 2);
        assert_eq!(node.last_seen, ts(2.0));
        assert!((node.avg_rssi.value().unwrap() - (0.95 * -55.0 + 0.05 * -54.0)).abs() < 1e-9);
    }

    #[test]
    fn test_msg_count_matches_ttl_buckets() {
        let aggregator = TelemetryAggregator::default();
        let mut table = NodeTable::new();
        let bodies = [
            "health 0001 1 -40 [00]",
            "onoff 0001 2 -45 1",
            "battery 0001 3 -50 9000",
            "onoff 0001 2 -47 0",
            "health 0001 1 -41 [01]",
        ];
        for (i, body) in bodies.iter().enumerate() {
            apply(&aggregator, &mut table, i as f64, body);
        }

        let node = table.get(NodeAddress(0x0001)).unwrap();
        assert_eq!(node.msg_count, bodies.len() as u64);
        assert_eq!(node.msg_count_by_ttl.values().sum::<u64>(), node.msg_count);
        assert_eq!(node.avg_rssi_by_ttl.len(), 3);
        assert_eq!(node.onoff_status, OnOffStatus::Off);
        assert_eq!(node.describe_faults(), "Friendless");
    }

    #[test]
    fn test_faults_replace_previous_report() {
        let aggregator = TelemetryAggregator::default();
        let mut table = NodeTable::new();
        apply(&aggregator, &mut table, 0.0, "health 0002 1 -40 [01]");
        apply(&aggregator, &mut table, 10.0, "health 0002 1 -40 [00]");
        assert!(table.get(NodeAddress(0x0002)).unwrap().faults.is_empty());
    }

    #[test]
    fn test_health_loss_accounting() {
        let aggregator = TelemetryAggregator::default();
        let mut table = NodeTable::new();
        for t in [0.0, 10.0, 31.0] {
            apply(&aggregator, &mut table, t, "health 0003 1 -40 [00]");
        }
        let node = table.get(NodeAddress(0x0003)).unwrap();
        assert_eq!(node.health_status_count, 3);
        assert_eq!(node.health_status_loss_count, 1);
    }

    #[test]
    fn test_gateway_log_and_noise_filter() {
        let aggregator = TelemetryAggregator::default();
        let mut table = NodeTable::new();

        assert_eq!(
            apply(&aggregator, &mut table, 0.0, "log [ 1.000] [ INFO ] Mesh stack started."),
            StatusEffect::GatewayLog
        );
        assert_eq!(
            apply(&aggregator, &mut table, 0.0, "log Received raw 0a 1b 2c"),
            StatusEffect::FilteredLog
        );
        assert_eq!(table.gateway().logs, vec!["[ 1.000] [ INFO ] Mesh stack started.".to_string()]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_address_book_capacity_last_write_wins() {
        let aggregator = TelemetryAggregator::default();
        let mut table = NodeTable::new();
        apply(&aggregator, &mut table, 0.0, "address_book_capacity 10 16");
        apply(&aggregator, &mut table, 1.0, "address_book_capacity 9 16");
        assert_eq!(table.gateway().address_book_free_slots, Some(9));
        assert_eq!(table.gateway().address_book_total_slots, Some(16));
    }

    #[test]
    fn test_configured_names_apply_on_first_sight() {
        let mut config = TelemetryConfig::default();
        config.node_names.insert(NodeAddress(0x000D), "LPN PCB".to_string());
        let aggregator = TelemetryAggregator::new(config);
        let mut table = NodeTable::new();

        apply(&aggregator, &mut table, 0.0, "onoff 000D 1 -40 1");
        apply(&aggregator, &mut table, 0.0, "onoff 0010 1 -40 1");

        assert_eq!(table.get(NodeAddress(0x000D)).unwrap().name, "LPN PCB");
        assert_eq!(table.get(NodeAddress(0x0010)).unwrap().name, "Node 0x0010");
    }

    #[test]
    fn test_malformed_line_leaves_table_untouched() {
        let aggregator = TelemetryAggregator::default();
        let mut table = NodeTable::new();
        let result = aggregator.process_status_line(&mut table, ts(0.0), "battery 00AB 2 loud 8192");
        assert!(matches!(result, Err(ProtocolError::InvalidField { field: "rssi", .. })));
        assert!(table.is_empty());
    }

    #[test]
    fn test_non_finite_battery_keeps_average_real() {
        let aggregator = TelemetryAggregator::default();
        let mut table = NodeTable::new();
        apply(&aggregator, &mut table, 0.0, "battery 00AB 2 -54.0 8000");

        for payload in ["NaN", "inf"] {
            let result = aggregator.process_status_line(&mut table, ts(1.0), &format!("battery 00AB 2 -54.0 {payload}"));
            assert!(matches!(result, Err(ProtocolError::InvalidField { field: "raw_adc", .. })));
        }

        let node = table.get(NodeAddress(0x00AB)).unwrap();
        assert_eq!(node.battery.value(), Some(1.7578125));
        assert_eq!(node.msg_count, 1);
        assert_eq!(table, table.clone());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = "ema_alpha: 0.9\nnode_names:\n  \"000D\": LPN PCB\n";
        let config: TelemetryConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.ema_alpha, 0.9);
        assert_eq!(config.health_period_secs, DEFAULT_HEALTH_PERIOD_SECS);
        assert_eq!(config.node_names.get(&NodeAddress(0x000D)).map(String::as_str), Some("LPN PCB"));
        config.validate().unwrap();
    }

    #[test]
    fn test_config_validation() {
        let config = TelemetryConfig {
            ema_alpha: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = TelemetryConfig {
            health_period_secs: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
