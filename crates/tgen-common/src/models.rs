//! Metric and state records reported by the traffic-generator controller.
//!
//! These mirror the controller's JSON shapes closely so they decode
//! straight off the wire, and carry a few helpers for the fields the
//! verification core actually reasons about.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::wire;

// ── Ports ───────────────────────────────────────────────────────────

/// Per-port counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortMetric {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub link: LinkState,
    #[serde(default)]
    pub transmit: PortTransmit,
    #[serde(default, deserialize_with = "wire::counter")]
    pub frames_tx: u64,
    #[serde(default, deserialize_with = "wire::counter")]
    pub frames_rx: u64,
    #[serde(default, deserialize_with = "wire::counter")]
    pub bytes_tx: u64,
    #[serde(default, deserialize_with = "wire::counter")]
    pub bytes_rx: u64,
    #[serde(default, deserialize_with = "wire::rate")]
    pub frames_tx_rate: f64,
    #[serde(default, deserialize_with = "wire::rate")]
    pub frames_rx_rate: f64,
    #[serde(default, deserialize_with = "wire::rate")]
    pub bytes_tx_rate: f64,
    #[serde(default, deserialize_with = "wire::rate")]
    pub bytes_rx_rate: f64,
}

impl PortMetric {
    pub fn new(name: impl Into<String>, frames_tx: u64, frames_rx: u64) -> Self {
        Self {
            name: name.into(),
            location: None,
            link: LinkState::Up,
            transmit: PortTransmit::Unknown,
            frames_tx,
            frames_rx,
            bytes_tx: 0,
            bytes_rx: 0,
            frames_tx_rate: 0.0,
            frames_rx_rate: 0.0,
            bytes_tx_rate: 0.0,
            bytes_rx_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Up,
    Down,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortTransmit {
    Started,
    Stopped,
    #[default]
    #[serde(other)]
    Unknown,
}

// ── Flows ───────────────────────────────────────────────────────────

/// Per-flow counters, optionally broken down by packet-field tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMetric {
    pub name: String,
    #[serde(default)]
    pub transmit: FlowTransmit,
    #[serde(default, deserialize_with = "wire::counter")]
    pub frames_tx: u64,
    #[serde(default, deserialize_with = "wire::counter")]
    pub frames_rx: u64,
    #[serde(default, deserialize_with = "wire::rate")]
    pub frames_tx_rate: f64,
    #[serde(default, deserialize_with = "wire::rate")]
    pub frames_rx_rate: f64,
    #[serde(default, deserialize_with = "wire::counter")]
    pub bytes_tx: u64,
    #[serde(default, deserialize_with = "wire::counter")]
    pub bytes_rx: u64,
    #[serde(default, deserialize_with = "wire::list")]
    pub tagged_metrics: Vec<TaggedMetric>,
}

impl FlowMetric {
    pub fn new(
        name: impl Into<String>,
        transmit: FlowTransmit,
        frames_tx: u64,
        frames_rx: u64,
    ) -> Self {
        Self {
            name: name.into(),
            transmit,
            frames_tx,
            frames_rx,
            frames_tx_rate: 0.0,
            frames_rx_rate: 0.0,
            bytes_tx: 0,
            bytes_rx: 0,
            tagged_metrics: Vec::new(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.transmit == FlowTransmit::Stopped
    }
}

/// Transmit state of a flow. Anything the controller reports that is
/// neither started, stopped nor paused decodes as `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowTransmit {
    Started,
    Stopped,
    Paused,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for FlowTransmit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowTransmit::Started => write!(f, "started"),
            FlowTransmit::Stopped => write!(f, "stopped"),
            FlowTransmit::Paused => write!(f, "paused"),
            FlowTransmit::Unknown => write!(f, "unknown"),
        }
    }
}

/// Sub-counters for packets carrying a particular tag value
/// (e.g. a DSCP or VLAN priority marking).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedMetric {
    #[serde(default, deserialize_with = "wire::list")]
    pub tags: Vec<FlowTag>,
    #[serde(default, deserialize_with = "wire::counter")]
    pub frames_tx: u64,
    #[serde(default, deserialize_with = "wire::counter")]
    pub frames_rx: u64,
    #[serde(default, deserialize_with = "wire::rate")]
    pub frames_rx_rate: f64,
    #[serde(default, deserialize_with = "wire::counter")]
    pub bytes_tx: u64,
    #[serde(default, deserialize_with = "wire::counter")]
    pub bytes_rx: u64,
}

impl TaggedMetric {
    /// Render the tag set as `name=value` pairs joined by commas.
    pub fn label(&self) -> String {
        self.tags
            .iter()
            .map(|t| format!("{}={}", t.tag.name, t.tag.value.display()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowTag {
    pub tag: TagField,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagField {
    pub name: String,
    pub value: TagValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagValue {
    #[serde(default)]
    pub choice: Option<String>,
    #[serde(default)]
    pub hex: Option<String>,
    #[serde(default)]
    pub str: Option<String>,
}

impl TagValue {
    pub fn display(&self) -> &str {
        self.hex
            .as_deref()
            .or(self.str.as_deref())
            .unwrap_or("?")
    }
}

// ── BGP ─────────────────────────────────────────────────────────────

/// Per-peer BGPv4 session counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bgpv4Metric {
    pub name: String,
    #[serde(default)]
    pub session_state: SessionState,
    #[serde(default, deserialize_with = "wire::counter")]
    pub session_flap_count: u64,
    #[serde(default, deserialize_with = "wire::counter")]
    pub routes_advertised: u64,
    #[serde(default, deserialize_with = "wire::counter")]
    pub routes_received: u64,
    #[serde(default, deserialize_with = "wire::counter")]
    pub route_withdraws_sent: u64,
    #[serde(default, deserialize_with = "wire::counter")]
    pub route_withdraws_received: u64,
}

impl Bgpv4Metric {
    pub fn new(
        name: impl Into<String>,
        session_state: SessionState,
        routes_advertised: u64,
        routes_received: u64,
    ) -> Self {
        Self {
            name: name.into(),
            session_state,
            session_flap_count: 0,
            routes_advertised,
            routes_received,
            route_withdraws_sent: 0,
            route_withdraws_received: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Up,
    Down,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Up => write!(f, "up"),
            SessionState::Down => write!(f, "down"),
            SessionState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Learned-prefix state for one BGP peer, as returned by a states query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpPrefixesState {
    pub bgp_peer_name: String,
    #[serde(default, deserialize_with = "wire::list")]
    pub ipv4_unicast_prefixes: Vec<Ipv4UnicastPrefix>,
    #[serde(default, deserialize_with = "wire::list")]
    pub ipv6_unicast_prefixes: Vec<Ipv6UnicastPrefix>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4UnicastPrefix {
    pub ipv4_address: String,
    #[serde(default)]
    pub prefix_length: u32,
    #[serde(default)]
    pub ipv4_next_hop: Option<String>,
    #[serde(default)]
    pub ipv6_next_hop: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv6UnicastPrefix {
    pub ipv6_address: String,
    #[serde(default)]
    pub prefix_length: u32,
    #[serde(default)]
    pub ipv4_next_hop: Option<String>,
    #[serde(default)]
    pub ipv6_next_hop: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

/// One learned route, flattened out of [`BgpPrefixesState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedPrefix {
    pub peer_name: String,
    pub family: AddressFamily,
    pub address: IpAddr,
    pub prefix_length: u32,
    pub next_hop: Option<IpAddr>,
}

impl BgpPrefixesState {
    /// Flatten both address families into [`LearnedPrefix`] records.
    ///
    /// The next hop is taken from the same family as the prefix, falling
    /// back to the other family. Entries whose address does not parse are
    /// skipped.
    pub fn learned_prefixes(&self) -> Vec<LearnedPrefix> {
        let v4 = self.ipv4_unicast_prefixes.iter().filter_map(|p| {
            Some(LearnedPrefix {
                peer_name: self.bgp_peer_name.clone(),
                family: AddressFamily::Ipv4,
                address: p.ipv4_address.parse().ok()?,
                prefix_length: p.prefix_length,
                next_hop: parse_hop(p.ipv4_next_hop.as_deref())
                    .or_else(|| parse_hop(p.ipv6_next_hop.as_deref())),
            })
        });
        let v6 = self.ipv6_unicast_prefixes.iter().filter_map(|p| {
            Some(LearnedPrefix {
                peer_name: self.bgp_peer_name.clone(),
                family: AddressFamily::Ipv6,
                address: p.ipv6_address.parse().ok()?,
                prefix_length: p.prefix_length,
                next_hop: parse_hop(p.ipv6_next_hop.as_deref())
                    .or_else(|| parse_hop(p.ipv4_next_hop.as_deref())),
            })
        });
        v4.chain(v6).collect()
    }
}

fn parse_hop(hop: Option<&str>) -> Option<IpAddr> {
    hop.and_then(|h| h.trim().parse().ok())
}
