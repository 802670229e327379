//! Plain-text tables for snapshots.
//!
//! Stateless: each function takes records and returns the rendered text.

use std::fmt::Write;

use tgen_common::MetricsSnapshot;
use tgen_common::models::{Bgpv4Metric, FlowMetric, LearnedPrefix, PortMetric};

pub const COLUMN_WIDTH: usize = 15;
const PREFIX_COLUMN_WIDTH: usize = 20;

/// Render a bordered table with left-aligned fixed-width columns.
/// Rows shorter than the header are padded with `_`.
pub fn format_table(
    title: &str,
    headers: &[&str],
    rows: &[Vec<String>],
    col_width: usize,
) -> String {
    let border = "-".repeat(headers.len() * col_width);
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(out, "{border}");
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{border}");

    for h in headers {
        let _ = write!(out, "{h:<col_width$}");
    }
    let _ = writeln!(out);

    for row in rows {
        for i in 0..headers.len() {
            let cell = row.get(i).map(String::as_str).unwrap_or("_");
            let _ = write!(out, "{cell:<col_width$}");
        }
        let _ = writeln!(out);
    }
    let _ = write!(out, "{border}");
    out
}

pub fn format_port_metrics(ports: &[PortMetric]) -> String {
    let rows: Vec<Vec<String>> = ports
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                p.frames_tx.to_string(),
                p.frames_rx.to_string(),
                format!("{:.0}", p.frames_tx_rate),
                format!("{:.0}", p.frames_rx_rate),
            ]
        })
        .collect();
    format_table(
        "Port Metrics",
        &["Name", "Frames Tx", "Frames Rx", "Tx FPS", "Rx FPS"],
        &rows,
        COLUMN_WIDTH,
    )
}

/// Flow table, followed by a tagged-metrics table when any flow carries
/// per-tag counters.
pub fn format_flow_metrics(flows: &[FlowMetric]) -> String {
    let rows: Vec<Vec<String>> = flows
        .iter()
        .map(|f| {
            vec![
                f.name.clone(),
                f.transmit.to_string(),
                f.frames_tx.to_string(),
                f.frames_rx.to_string(),
                format!("{:.0}", f.frames_rx_rate),
            ]
        })
        .collect();
    let mut out = format_table(
        "Flow Metrics",
        &["Name", "State", "Frames Tx", "Frames Rx", "Rx FPS"],
        &rows,
        COLUMN_WIDTH,
    );

    let tagged: Vec<Vec<String>> = flows
        .iter()
        .flat_map(|f| {
            f.tagged_metrics.iter().map(move |t| {
                vec![
                    f.name.clone(),
                    t.label(),
                    t.frames_tx.to_string(),
                    t.frames_rx.to_string(),
                ]
            })
        })
        .collect();
    if !tagged.is_empty() {
        out.push('\n');
        out.push_str(&format_table(
            "Tagged Flow Metrics",
            &["Flow", "Tags", "Frames Tx", "Frames Rx"],
            &tagged,
            COLUMN_WIDTH,
        ));
    }
    out
}

pub fn format_bgpv4_metrics(peers: &[Bgpv4Metric]) -> String {
    let rows: Vec<Vec<String>> = peers
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                p.session_state.to_string(),
                p.routes_advertised.to_string(),
                p.routes_received.to_string(),
                p.session_flap_count.to_string(),
            ]
        })
        .collect();
    format_table(
        "BGPv4 Metrics",
        &["Name", "State", "Routes Tx", "Routes Rx", "Flaps"],
        &rows,
        COLUMN_WIDTH,
    )
}

pub fn format_learned_prefixes(prefixes: &[LearnedPrefix]) -> String {
    let rows: Vec<Vec<String>> = prefixes
        .iter()
        .map(|p| {
            vec![
                p.peer_name.clone(),
                format!("{}/{}", p.address, p.prefix_length),
                p.next_hop.map(|h| h.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    format_table(
        "BGP Prefixes",
        &["Peer", "Prefix", "Next Hop"],
        &rows,
        PREFIX_COLUMN_WIDTH,
    )
}

/// Every non-empty object class in the snapshot, one table each.
pub fn format_snapshot(snapshot: &MetricsSnapshot) -> String {
    let mut sections = Vec::new();
    if !snapshot.ports().is_empty() {
        sections.push(format_port_metrics(snapshot.ports()));
    }
    if !snapshot.flows().is_empty() {
        sections.push(format_flow_metrics(snapshot.flows()));
    }
    if !snapshot.bgpv4_peers().is_empty() {
        sections.push(format_bgpv4_metrics(snapshot.bgpv4_peers()));
    }
    let learned = snapshot.learned_prefixes();
    if !learned.is_empty() {
        sections.push(format_learned_prefixes(&learned));
    }
    sections.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgen_common::models::{FlowTransmit, SessionState};

    #[test]
    fn table_layout() {
        let out = format_table("T", &["a", "b"], &[vec!["x".into(), "y".into()]], 4);
        assert_eq!(out, "\n--------\nT\n--------\na   b   \nx   y   \n--------");
    }

    #[test]
    fn short_rows_are_padded() {
        let out = format_table("T", &["a", "b", "c"], &[vec!["x".into()]], 3);
        assert!(out.contains("x  _  _  \n"));
    }

    #[test]
    fn flow_table_lists_state_and_counts() {
        let out = format_flow_metrics(&[FlowMetric::new("f1", FlowTransmit::Stopped, 2000, 1999)]);
        assert!(out.contains("Flow Metrics"));
        assert!(out.contains("stopped"));
        assert!(out.contains("1999"));
        assert!(!out.contains("Tagged"));
    }

    #[test]
    fn snapshot_skips_empty_classes() {
        let snap = MetricsSnapshot::builder()
            .bgpv4(vec![Bgpv4Metric::new("peer", SessionState::Up, 5, 5)])
            .build();
        let out = format_snapshot(&snap);
        assert!(out.contains("BGPv4 Metrics"));
        assert!(!out.contains("Port Metrics"));
        assert!(!out.contains("Flow Metrics"));
    }

    #[test]
    fn formatting_is_repeatable() {
        let ports = vec![PortMetric::new("p1", 1, 1)];
        assert_eq!(format_port_metrics(&ports), format_port_metrics(&ports));
    }
}
