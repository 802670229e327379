//! Shared types for driving traffic-generator verification runs.
//!
//! This crate contains:
//! - **Metric records**: port, flow, BGPv4 and learned-prefix records as reported by the controller
//! - **Snapshots**: immutable point-in-time collections of those records
//! - **Expectations**: the numbers a run is judged against
//! - **Protocol messages**: metrics/state requests and control commands in controller wire form

pub mod expectation;
pub mod models;
pub mod protocol;
pub mod snapshot;

mod wire;

pub use expectation::{ConfigError, ExpectedPrefix, RouteExpectation, RouteMatch, TestExpectation};
pub use snapshot::MetricsSnapshot;
