//! Metrics infrastructure for the mesh gateway console.
//!
//! This crate re-exports the `metrics` facade and declares every metric the
//! session engine emits as a structured [`Metric`] constant, so call sites
//! never spell a metric name by hand.
//!
//! Without an installed recorder every emission is a no-op. Enable the
//! `prometheus` feature and call [`install_prometheus`] to expose them.
//!
//! # Example
//!
//! ```rust
//! use meshcon_metrics::{metric_defs, metrics, node_labels};
//!
//! metrics::counter!(metric_defs::STATUS_PROCESSED.name, &node_labels(0x00AB, "battery"))
//!     .increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, Unit};

/// The kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
}

/// A metric declaration with its metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "meshcon.status.processed").
    pub name: &'static str,
    /// Counter or gauge.
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Declare a counter.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            labels: &[],
        }
    }

    /// Declare a gauge.
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            description: "",
            labels: &[],
        }
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the metrics recorder.
    pub fn describe(&self) {
        match self.kind {
            MetricKind::Counter => describe_counter!(self.name, Unit::Count, self.description),
            MetricKind::Gauge => describe_gauge!(self.name, Unit::Count, self.description),
        }
    }
}

/// All metric definitions for the console.
pub mod metric_defs {
    use super::Metric;

    // ========================================================================
    // Transport
    // ========================================================================

    /// Lines read from the gateway.
    pub const TRANSPORT_LINES: Metric = Metric::counter("meshcon.transport.lines")
        .with_description("Lines received from the gateway");

    /// Gateway lines dropped as unclassifiable or malformed.
    ///
    /// Labels: reason
    pub const TRANSPORT_REJECTED: Metric = Metric::counter("meshcon.transport.rejected")
        .with_description("Gateway lines rejected during classification")
        .with_labels(&["reason"]);

    // ========================================================================
    // Telemetry
    // ========================================================================

    /// Status messages applied to the node table.
    ///
    /// Labels: node, op
    pub const STATUS_PROCESSED: Metric = Metric::counter("meshcon.status.processed")
        .with_description("Status messages applied to the node table")
        .with_labels(&["node", "op"]);

    /// Number of nodes currently tracked.
    pub const NODES_TRACKED: Metric = Metric::gauge("meshcon.nodes.tracked")
        .with_description("Nodes currently in the node table");

    // ========================================================================
    // Requests
    // ========================================================================

    /// Requests written to the gateway.
    pub const REQUESTS_SENT: Metric = Metric::counter("meshcon.request.sent")
        .with_description("Requests forwarded to the gateway");

    /// Requests refused because another one was outstanding.
    pub const REQUESTS_BUSY: Metric = Metric::counter("meshcon.request.busy")
        .with_description("Requests refused while another was pending");

    /// Requests that expired without a reply.
    pub const REQUESTS_TIMED_OUT: Metric = Metric::counter("meshcon.request.timed_out")
        .with_description("Requests that received no reply in time");

    /// Replies that arrived with no request pending.
    pub const REPLIES_ORPHANED: Metric = Metric::counter("meshcon.reply.orphaned")
        .with_description("Replies received with no pending request");

    // ========================================================================
    // Notifications & replay
    // ========================================================================

    /// Notifications handed to the delivery worker.
    ///
    /// Labels: outcome
    pub const NOTIFICATIONS: Metric = Metric::counter("meshcon.notify.notifications")
        .with_description("Change notifications by delivery outcome")
        .with_labels(&["outcome"]);

    /// Transcript entries re-driven at startup.
    ///
    /// Labels: origin
    pub const REPLAYED_ENTRIES: Metric = Metric::counter("meshcon.replay.entries")
        .with_description("Transcript entries replayed at startup")
        .with_labels(&["origin"]);

    /// All metrics, for bulk description.
    pub const ALL: &[Metric] = &[
        TRANSPORT_LINES,
        TRANSPORT_REJECTED,
        STATUS_PROCESSED,
        NODES_TRACKED,
        REQUESTS_SENT,
        REQUESTS_BUSY,
        REQUESTS_TIMED_OUT,
        REPLIES_ORPHANED,
        NOTIFICATIONS,
        REPLAYED_ENTRIES,
    ];
}

/// Labels for a node-scoped status metric.
///
/// Keys come from the declaration of [`metric_defs::STATUS_PROCESSED`].
pub fn node_labels(address: u16, op: &'static str) -> Vec<(&'static str, String)> {
    metric_defs::STATUS_PROCESSED
        .labels
        .iter()
        .copied()
        .zip([format!("{address:04X}"), op.to_string()])
        .collect()
}

/// Describes all metrics used by the console.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Install a Prometheus recorder with an HTTP scrape endpoint.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}
