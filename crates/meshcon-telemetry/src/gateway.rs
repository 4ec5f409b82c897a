//! State of the gateway itself.

use serde::Serialize;

/// Diagnostics and capacity counters reported by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatewayState {
    /// Firmware log lines, oldest first.
    pub logs: Vec<String>,
    /// Free address book slots, from the latest capacity report.
    pub address_book_free_slots: Option<u32>,
    /// Total address book slots, from the latest capacity report.
    pub address_book_total_slots: Option<u32>,
}

impl GatewayState {
    /// The most recent `count` log lines, oldest first.
    pub fn recent_logs(&self, count: usize) -> &[String] {
        let start = self.logs.len().saturating_sub(count);
        &self.logs[start..]
    }
}
