//! Text dashboard of the node table.

use std::fmt::Write;

use meshcon_protocol::Timestamp;
use meshcon_telemetry::{Ema, Node, NodeTable, OnOffStatus};

const RULE_WIDTH: usize = 110;
/// Nodes heard from within this many seconds show no "last seen" text.
const FRESH_SECS: i64 = 11;
/// Gateway log lines shown under the table.
const LOG_LINES: usize = 10;

fn format_battery(battery: &Ema) -> String {
    battery.value().map_or_else(|| "N/A".into(), |v| format!("{v:.5} V"))
}

fn format_ttl(ttl: Option<f64>) -> String {
    ttl.map_or_else(|| "N/A".into(), |v| format!("{v:.1} hops"))
}

fn format_rssi(rssi: &Ema) -> String {
    rssi.value().map_or_else(|| "N/A".into(), |v| format!("{v:.1} dB"))
}

fn format_onoff(status: OnOffStatus) -> &'static str {
    match status {
        OnOffStatus::Unknown => "N/A",
        OnOffStatus::On => "On",
        OnOffStatus::Off => "",
    }
}

fn format_last_seen(node: &Node, now: Timestamp) -> String {
    let seconds = now.secs_since(node.last_seen) as i64;
    if seconds < FRESH_SECS {
        String::new()
    } else {
        format!("{seconds} seconds ago")
    }
}

#[allow(clippy::too_many_arguments)]
fn row(
    out: &mut String,
    name: &str,
    faults: &str,
    battery: &str,
    ttl: &str,
    rssi: &str,
    share: &str,
    onoff: &str,
    seen: &str,
) {
    let _ = writeln!(
        out,
        "{name:<15} | {faults:<30} {battery:>9} {ttl:>10} {rssi:>10} {share:>7} | {onoff:<3} | {seen:<20}"
    );
}

fn rule(out: &mut String) {
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');
}

/// Render one block per node, followed by gateway state.
///
/// Each node gets a summary row and one row per TTL seen, highest first,
/// with that TTL's RSSI average and share of the node's messages.
pub fn render_dashboard(table: &NodeTable, now: Timestamp) -> String {
    let mut out = String::new();

    for node in table.nodes() {
        rule(&mut out);
        row(
            &mut out,
            &node.name,
            &node.describe_faults(),
            &format_battery(&node.battery),
            &format_ttl(node.avg_ttl.value()),
            &format_rssi(&node.avg_rssi),
            "",
            format_onoff(node.onoff_status),
            &format_last_seen(node, now),
        );

        for (&ttl, rssi) in node.avg_rssi_by_ttl.iter().rev() {
            let share = node
                .ttl_share(ttl)
                .map_or_else(String::new, |share| format!("{:.1} %", share * 100.0));
            row(
                &mut out,
                "",
                "",
                "",
                &format_ttl(Some(f64::from(ttl))),
                &format_rssi(rssi),
                &share,
                "",
                "",
            );
        }
    }
    rule(&mut out);

    let gateway = table.gateway();
    if let (Some(free), Some(total)) = (gateway.address_book_free_slots, gateway.address_book_total_slots) {
        let _ = writeln!(out, "Address book: {free} of {total} slots free");
    }
    for line in gateway.recent_logs(LOG_LINES) {
        let _ = writeln!(out, "{line}");
    }

    out
}
