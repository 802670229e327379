//! Client side of the traffic-generator controller.
//!
//! - [`Controller`] is the seam the verification core talks through:
//!   config apply, metrics and states queries, control commands.
//! - [`HttpController`] implements it over the controller's JSON REST API.
//! - [`sample`] turns a [`SnapshotQuery`] into one immutable
//!   [`tgen_common::MetricsSnapshot`].

pub mod controller;
pub mod error;
pub mod http;
pub mod sampler;

pub use controller::Controller;
pub use error::ClientError;
pub use http::{ControllerConfig, HttpController};
pub use sampler::{SnapshotQuery, sample};
