//! The controller seam.

use std::future::Future;

use serde_json::Value;
use tgen_common::protocol::{
    ControlCommand, MetricsRequest, MetricsResponse, StatesRequest, StatesResponse,
};

use crate::ClientError;

/// A stateful traffic-generator controller.
///
/// Calls on one controller are issued one at a time by a run; an
/// implementation does not need to support overlapping requests from the
/// same run. Every method is a remote round trip with no latency bound
/// other than the implementation's own request timeout.
pub trait Controller: Send + Sync {
    /// Push a full declarative topology. Returns controller warnings.
    fn set_config(&self, config: &Value)
    -> impl Future<Output = Result<Vec<String>, ClientError>> + Send;

    fn get_metrics(
        &self,
        request: &MetricsRequest,
    ) -> impl Future<Output = Result<MetricsResponse, ClientError>> + Send;

    fn get_states(
        &self,
        request: &StatesRequest,
    ) -> impl Future<Output = Result<StatesResponse, ClientError>> + Send;

    /// Issue one control command. Returns controller warnings.
    fn set_control_state(
        &self,
        command: &ControlCommand,
    ) -> impl Future<Output = Result<Vec<String>, ClientError>> + Send;
}
