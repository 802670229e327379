//! Readiness predicates.
//!
//! Every predicate re-derives its verdict from one fresh snapshot and the
//! run's expectation. None of them keeps state between calls, so they can
//! be re-evaluated at any polling cadence.
//!
//! An object class with no records in the snapshot is never ready: an
//! empty answer means the controller has not reported those objects yet.

use tgen_client::SnapshotQuery;
use tgen_common::models::{Bgpv4Metric, FlowMetric, LearnedPrefix, PortMetric, SessionState};
use tgen_common::{ExpectedPrefix, MetricsSnapshot, RouteExpectation, TestExpectation};

/// Every peer is not down and has advertised and received the expected
/// number of routes.
pub fn protocol_peering_ready(peers: &[Bgpv4Metric], routes: &RouteExpectation) -> bool {
    !peers.is_empty()
        && peers.iter().all(|p| {
            p.session_state != SessionState::Down
                && routes.mode.accepts(p.routes_advertised, routes.advertised)
                && routes.mode.accepts(p.routes_received, routes.received)
        })
}

/// Every flow has stopped transmitting and both sent and delivered exactly
/// the expected packet count.
pub fn flow_completion_ready(flows: &[FlowMetric], expected_packets: u64) -> bool {
    !flows.is_empty()
        && flows.iter().all(|f| {
            f.is_stopped() && f.frames_tx == expected_packets && f.frames_rx == expected_packets
        })
}

/// Every flow has stopped transmitting. Delivery is not checked: this
/// detects the transmit engine reaching its end, lossy or not.
pub fn traffic_ceased(flows: &[FlowMetric]) -> bool {
    !flows.is_empty() && flows.iter().all(FlowMetric::is_stopped)
}

/// Ports transmitted exactly the expected total and received at least it.
///
/// The receive side may transiently exceed the transmit side at
/// aggregation boundaries, so only the transmit total must match exactly.
pub fn port_frame_totals_ready(ports: &[PortMetric], total_expected: u64) -> bool {
    if ports.is_empty() {
        return false;
    }
    let tx: u64 = ports.iter().map(|p| p.frames_tx).sum();
    let rx: u64 = ports.iter().map(|p| p.frames_rx).sum();
    tx == total_expected && rx >= total_expected
}

/// Every expected `(address, next hop)` pair appears in learned-prefix
/// state. The same pair learned from several peers counts once; extra
/// learned prefixes are ignored.
pub fn learned_prefixes_ready(learned: &[LearnedPrefix], expected: &[ExpectedPrefix]) -> bool {
    !expected.is_empty()
        && expected.iter().all(|e| {
            learned
                .iter()
                .any(|l| l.address == e.address && l.next_hop == Some(e.next_hop))
        })
}

/// The closed set of conditions a run can wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    ProtocolPeering,
    LearnedPrefixes,
    FlowCompletion,
    TrafficCeased,
    PortFrameTotals,
}

impl Readiness {
    /// Human-readable description used in logs and failures.
    pub fn describe(self) -> &'static str {
        match self {
            Readiness::ProtocolPeering => "correct bgp peering",
            Readiness::LearnedPrefixes => "correct bgp prefixes",
            Readiness::FlowCompletion => "flow completion",
            Readiness::TrafficCeased => "traffic stopped",
            Readiness::PortFrameTotals => "port frame totals",
        }
    }

    /// Object classes the predicate needs in a snapshot.
    pub fn query(self) -> SnapshotQuery {
        match self {
            Readiness::ProtocolPeering => SnapshotQuery::bgpv4(),
            Readiness::LearnedPrefixes => SnapshotQuery::prefixes(),
            Readiness::FlowCompletion | Readiness::TrafficCeased => SnapshotQuery::flows(),
            Readiness::PortFrameTotals => SnapshotQuery::ports(),
        }
    }

    pub fn evaluate(self, snapshot: &MetricsSnapshot, expectation: &TestExpectation) -> bool {
        match self {
            Readiness::ProtocolPeering => {
                let routes = expectation
                    .routes()
                    .copied()
                    .unwrap_or_else(|| RouteExpectation::symmetric(0));
                protocol_peering_ready(snapshot.bgpv4_peers(), &routes)
            }
            Readiness::LearnedPrefixes => {
                learned_prefixes_ready(&snapshot.learned_prefixes(), expectation.prefixes())
            }
            Readiness::FlowCompletion => {
                flow_completion_ready(snapshot.flows(), expectation.packet_count())
            }
            Readiness::TrafficCeased => traffic_ceased(snapshot.flows()),
            Readiness::PortFrameTotals => {
                port_frame_totals_ready(snapshot.ports(), expectation.total_port_frames())
            }
        }
    }
}

impl std::fmt::Display for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}
