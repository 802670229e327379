//! Snapshot sampling: one or more queries folded into a single snapshot.

use tgen_common::MetricsSnapshot;
use tgen_common::protocol::{MetricsRequest, StatesRequest};

use crate::{ClientError, Controller};

/// Which object classes to read for a snapshot.
///
/// `None` skips the class; `Some(vec![])` reads every object of it;
/// `Some(names)` filters by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotQuery {
    pub ports: Option<Vec<String>>,
    pub flows: Option<Vec<String>>,
    pub bgpv4: Option<Vec<String>>,
    pub prefixes: Option<Vec<String>>,
}

impl SnapshotQuery {
    pub fn ports() -> Self {
        Self {
            ports: Some(Vec::new()),
            ..Default::default()
        }
    }

    pub fn flows() -> Self {
        Self {
            flows: Some(Vec::new()),
            ..Default::default()
        }
    }

    pub fn flow(name: impl Into<String>) -> Self {
        Self {
            flows: Some(vec![name.into()]),
            ..Default::default()
        }
    }

    pub fn bgpv4() -> Self {
        Self {
            bgpv4: Some(Vec::new()),
            ..Default::default()
        }
    }

    pub fn prefixes() -> Self {
        Self {
            prefixes: Some(Vec::new()),
            ..Default::default()
        }
    }

    /// Union of two queries. A class read in full on either side is read
    /// in full; otherwise the name filters are merged.
    pub fn with(mut self, other: SnapshotQuery) -> Self {
        self.ports = merge(self.ports, other.ports);
        self.flows = merge(self.flows, other.flows);
        self.bgpv4 = merge(self.bgpv4, other.bgpv4);
        self.prefixes = merge(self.prefixes, other.prefixes);
        self
    }
}

fn merge(a: Option<Vec<String>>, b: Option<Vec<String>>) -> Option<Vec<String>> {
    match (a, b) {
        (None, x) | (x, None) => x,
        (Some(a), Some(b)) if a.is_empty() || b.is_empty() => Some(Vec::new()),
        (Some(mut a), Some(b)) => {
            for name in b {
                if !a.contains(&name) {
                    a.push(name);
                }
            }
            Some(a)
        }
    }
}

/// Read the requested classes, one query after another, into a snapshot.
///
/// The first failing query aborts the sample; a partial snapshot is never
/// returned.
pub async fn sample<C: Controller>(
    controller: &C,
    query: &SnapshotQuery,
) -> Result<MetricsSnapshot, ClientError> {
    let mut builder = MetricsSnapshot::builder();

    if let Some(names) = &query.ports {
        let resp = controller
            .get_metrics(&MetricsRequest::Port {
                port_names: names.clone(),
            })
            .await?;
        builder = builder.ports(resp.port_metrics);
    }
    if let Some(names) = &query.flows {
        let resp = controller
            .get_metrics(&MetricsRequest::Flow {
                flow_names: names.clone(),
            })
            .await?;
        builder = builder.flows(resp.flow_metrics);
    }
    if let Some(names) = &query.bgpv4 {
        let resp = controller
            .get_metrics(&MetricsRequest::Bgpv4 {
                peer_names: names.clone(),
            })
            .await?;
        builder = builder.bgpv4(resp.bgpv4_metrics);
    }
    if let Some(names) = &query.prefixes {
        let resp = controller
            .get_states(&StatesRequest::BgpPrefixes {
                peer_names: names.clone(),
            })
            .await?;
        builder = builder.prefixes(resp.bgp_prefixes);
    }

    let snapshot = builder.build();
    tracing::trace!(
        ports = snapshot.ports().len(),
        flows = snapshot.flows().len(),
        peers = snapshot.bgpv4_peers().len(),
        "sampled snapshot"
    );
    Ok(snapshot)
}
