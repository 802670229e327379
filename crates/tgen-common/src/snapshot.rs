//! Immutable point-in-time metric snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Bgpv4Metric, BgpPrefixesState, FlowMetric, LearnedPrefix, PortMetric};

/// One read of controller-reported counters and states.
///
/// A snapshot is assembled once through [`SnapshotBuilder`] and never
/// changes afterwards; every poll produces a new one. Object classes that
/// were not queried are simply empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    taken_at: DateTime<Utc>,
    ports: Vec<PortMetric>,
    flows: Vec<FlowMetric>,
    bgpv4: Vec<Bgpv4Metric>,
    prefixes: Vec<BgpPrefixesState>,
}

impl MetricsSnapshot {
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn ports(&self) -> &[PortMetric] {
        &self.ports
    }

    pub fn flows(&self) -> &[FlowMetric] {
        &self.flows
    }

    pub fn bgpv4_peers(&self) -> &[Bgpv4Metric] {
        &self.bgpv4
    }

    pub fn prefix_states(&self) -> &[BgpPrefixesState] {
        &self.prefixes
    }

    pub fn port(&self, name: &str) -> Option<&PortMetric> {
        self.ports.iter().find(|p| p.name == name)
    }

    pub fn flow(&self, name: &str) -> Option<&FlowMetric> {
        self.flows.iter().find(|f| f.name == name)
    }

    pub fn peer(&self, name: &str) -> Option<&Bgpv4Metric> {
        self.bgpv4.iter().find(|p| p.name == name)
    }

    /// All learned prefixes across peers, both address families.
    pub fn learned_prefixes(&self) -> Vec<LearnedPrefix> {
        self.prefixes
            .iter()
            .flat_map(BgpPrefixesState::learned_prefixes)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
            && self.flows.is_empty()
            && self.bgpv4.is_empty()
            && self.prefixes.is_empty()
    }
}

/// Collects records before freezing them into a [`MetricsSnapshot`].
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    taken_at: Option<DateTime<Utc>>,
    ports: Vec<PortMetric>,
    flows: Vec<FlowMetric>,
    bgpv4: Vec<Bgpv4Metric>,
    prefixes: Vec<BgpPrefixesState>,
}

impl SnapshotBuilder {
    pub fn taken_at(mut self, ts: DateTime<Utc>) -> Self {
        self.taken_at = Some(ts);
        self
    }

    pub fn ports(mut self, ports: Vec<PortMetric>) -> Self {
        self.ports = ports;
        self
    }

    pub fn flows(mut self, flows: Vec<FlowMetric>) -> Self {
        self.flows = flows;
        self
    }

    pub fn bgpv4(mut self, peers: Vec<Bgpv4Metric>) -> Self {
        self.bgpv4 = peers;
        self
    }

    pub fn prefixes(mut self, prefixes: Vec<BgpPrefixesState>) -> Self {
        self.prefixes = prefixes;
        self
    }

    pub fn build(self) -> MetricsSnapshot {
        MetricsSnapshot {
            taken_at: self.taken_at.unwrap_or_else(Utc::now),
            ports: self.ports,
            flows: self.flows,
            bgpv4: self.bgpv4,
            prefixes: self.prefixes,
        }
    }
}
