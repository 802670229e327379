//! The fixed numbers a verification run is judged against.

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("packet rate must be a positive finite number, got {0}")]
    InvalidRate(f64),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("invalid address {value:?} for {field}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("{0}")]
    Invalid(String),
}

/// How observed route counts are compared with the expected count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMatch {
    /// Observed ≥ expected.
    #[default]
    AtLeast,
    /// Observed == expected.
    Exactly,
}

impl RouteMatch {
    pub fn accepts(self, observed: u64, expected: u64) -> bool {
        match self {
            RouteMatch::AtLeast => observed >= expected,
            RouteMatch::Exactly => observed == expected,
        }
    }
}

/// Expected per-peer route counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteExpectation {
    pub advertised: u64,
    pub received: u64,
    #[serde(default)]
    pub mode: RouteMatch,
}

impl RouteExpectation {
    /// Same count in both directions, compared with [`RouteMatch::AtLeast`].
    pub fn symmetric(count: u64) -> Self {
        Self {
            advertised: count,
            received: count,
            mode: RouteMatch::AtLeast,
        }
    }
}

/// A route that must show up in learned-prefix state with a given next hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedPrefix {
    pub address: IpAddr,
    pub next_hop: IpAddr,
}

impl ExpectedPrefix {
    pub fn parse(address: &str, next_hop: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            address: address.trim().parse().map_err(|_| ConfigError::InvalidAddress {
                field: "prefix address",
                value: address.to_string(),
            })?,
            next_hop: next_hop.trim().parse().map_err(|_| ConfigError::InvalidAddress {
                field: "prefix next hop",
                value: next_hop.to_string(),
            })?,
        })
    }
}

/// Scalar parameters of one test run. Built once before polling starts and
/// read-only afterwards; every predicate is a pure function of a snapshot
/// and this value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestExpectation {
    packet_count: u64,
    packet_rate: f64,
    #[serde(skip)]
    traffic_duration: Duration,
    total_port_frames: Option<u64>,
    routes: Option<RouteExpectation>,
    prefixes: Vec<ExpectedPrefix>,
}

impl TestExpectation {
    pub fn builder(packet_count: u64, packet_rate: f64) -> ExpectationBuilder {
        ExpectationBuilder {
            packet_count,
            packet_rate,
            total_port_frames: None,
            routes: None,
            prefixes: Vec::new(),
        }
    }

    /// Packets each flow is configured to send.
    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    /// Configured per-flow transmit rate in packets per second.
    pub fn packet_rate(&self) -> f64 {
        self.packet_rate
    }

    /// Frames expected across all ports; defaults to the per-flow packet count.
    pub fn total_port_frames(&self) -> u64 {
        self.total_port_frames.unwrap_or(self.packet_count)
    }

    pub fn routes(&self) -> Option<&RouteExpectation> {
        self.routes.as_ref()
    }

    pub fn prefixes(&self) -> &[ExpectedPrefix] {
        &self.prefixes
    }

    /// Nominal transmit duration of one flow at the configured rate.
    pub fn traffic_duration(&self) -> Duration {
        self.traffic_duration
    }
}

#[derive(Debug, Clone)]
pub struct ExpectationBuilder {
    packet_count: u64,
    packet_rate: f64,
    total_port_frames: Option<u64>,
    routes: Option<RouteExpectation>,
    prefixes: Vec<ExpectedPrefix>,
}

impl ExpectationBuilder {
    pub fn total_port_frames(mut self, total: u64) -> Self {
        self.total_port_frames = Some(total);
        self
    }

    pub fn routes(mut self, routes: RouteExpectation) -> Self {
        self.routes = Some(routes);
        self
    }

    pub fn prefix(mut self, prefix: ExpectedPrefix) -> Self {
        self.prefixes.push(prefix);
        self
    }

    pub fn build(self) -> Result<TestExpectation, ConfigError> {
        if !self.packet_rate.is_finite() || self.packet_rate <= 0.0 {
            return Err(ConfigError::InvalidRate(self.packet_rate));
        }
        let traffic_duration =
            Duration::try_from_secs_f64(self.packet_count as f64 / self.packet_rate).map_err(
                |_| {
                    ConfigError::Invalid(format!(
                        "{} packets at {} pps do not fit in a traffic duration",
                        self.packet_count, self.packet_rate
                    ))
                },
            )?;
        Ok(TestExpectation {
            packet_count: self.packet_count,
            packet_rate: self.packet_rate,
            traffic_duration,
            total_port_frames: self.total_port_frames,
            routes: self.routes,
            prefixes: self.prefixes,
        })
    }
}
