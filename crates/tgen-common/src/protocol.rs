//! Request, response, and command messages exchanged with the controller.
//!
//! All bodies are JSON. Requests and commands are built from small closed
//! enums and rendered to the controller's `choice`-keyed wire shape by
//! `to_wire`, so a command can never carry the wrong sub-fields.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::models::{Bgpv4Metric, BgpPrefixesState, FlowMetric, PortMetric};
use crate::wire;

// ── Metrics / states queries ────────────────────────────────────────

/// Selects one object class for a metrics query. An empty name list
/// selects every object of that class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsRequest {
    Port { port_names: Vec<String> },
    Flow { flow_names: Vec<String> },
    Bgpv4 { peer_names: Vec<String> },
}

impl MetricsRequest {
    pub fn all_ports() -> Self {
        MetricsRequest::Port { port_names: Vec::new() }
    }

    pub fn all_flows() -> Self {
        MetricsRequest::Flow { flow_names: Vec::new() }
    }

    pub fn all_bgpv4() -> Self {
        MetricsRequest::Bgpv4 { peer_names: Vec::new() }
    }

    pub fn to_wire(&self) -> Value {
        match self {
            MetricsRequest::Port { port_names } => {
                json!({ "choice": "port", "port": { "port_names": port_names } })
            }
            MetricsRequest::Flow { flow_names } => {
                json!({ "choice": "flow", "flow": { "flow_names": flow_names } })
            }
            MetricsRequest::Bgpv4 { peer_names } => {
                json!({ "choice": "bgpv4", "bgpv4": { "peer_names": peer_names } })
            }
        }
    }
}

/// Metrics query response; only the list matching the request is populated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsResponse {
    #[serde(default, deserialize_with = "wire::list")]
    pub port_metrics: Vec<PortMetric>,
    #[serde(default, deserialize_with = "wire::list")]
    pub flow_metrics: Vec<FlowMetric>,
    #[serde(default, deserialize_with = "wire::list")]
    pub bgpv4_metrics: Vec<Bgpv4Metric>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatesRequest {
    BgpPrefixes { peer_names: Vec<String> },
}

impl StatesRequest {
    pub fn all_bgp_prefixes() -> Self {
        StatesRequest::BgpPrefixes { peer_names: Vec::new() }
    }

    pub fn to_wire(&self) -> Value {
        match self {
            StatesRequest::BgpPrefixes { peer_names } => json!({
                "choice": "bgp_prefixes",
                "bgp_prefixes": { "bgp_peer_names": peer_names }
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatesResponse {
    #[serde(default, deserialize_with = "wire::list")]
    pub bgp_prefixes: Vec<BgpPrefixesState>,
}

/// Body of a successful config apply or control call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarningsResponse {
    #[serde(default, deserialize_with = "wire::list")]
    pub warnings: Vec<String>,
}

/// Error body returned with a non-2xx status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "wire::list")]
    pub errors: Vec<String>,
}

// ── Control commands ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmitState {
    Start,
    Stop,
    Pause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAdminState {
    Up,
    Down,
}

/// Imperative controller operations. Each variant carries only what it
/// needs. Commands are fire-and-forget; their effect is observed later
/// through metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    StartAllProtocols,
    StopAllProtocols,
    SetFlowTransmit {
        #[serde(default)]
        flow_names: Vec<String>,
        state: TransmitState,
    },
    SetPortLink {
        port_names: Vec<String>,
        state: LinkAdminState,
    },
    WithdrawRoutes {
        names: Vec<String>,
    },
    AdvertiseRoutes {
        names: Vec<String>,
    },
}

impl ControlCommand {
    /// Start transmit on every configured flow.
    pub fn start_transmit() -> Self {
        ControlCommand::SetFlowTransmit {
            flow_names: Vec::new(),
            state: TransmitState::Start,
        }
    }

    pub fn stop_transmit() -> Self {
        ControlCommand::SetFlowTransmit {
            flow_names: Vec::new(),
            state: TransmitState::Stop,
        }
    }

    pub fn port_link(port: impl Into<String>, state: LinkAdminState) -> Self {
        ControlCommand::SetPortLink {
            port_names: vec![port.into()],
            state,
        }
    }

    /// The command that undoes this one, where such a command exists.
    pub fn inverse(&self) -> Option<ControlCommand> {
        match self {
            ControlCommand::StartAllProtocols => Some(ControlCommand::StopAllProtocols),
            ControlCommand::StopAllProtocols => Some(ControlCommand::StartAllProtocols),
            ControlCommand::SetFlowTransmit { flow_names, state } => {
                let state = match state {
                    TransmitState::Start => TransmitState::Stop,
                    TransmitState::Stop | TransmitState::Pause => TransmitState::Start,
                };
                Some(ControlCommand::SetFlowTransmit {
                    flow_names: flow_names.clone(),
                    state,
                })
            }
            ControlCommand::SetPortLink { port_names, state } => {
                let state = match state {
                    LinkAdminState::Up => LinkAdminState::Down,
                    LinkAdminState::Down => LinkAdminState::Up,
                };
                Some(ControlCommand::SetPortLink {
                    port_names: port_names.clone(),
                    state,
                })
            }
            ControlCommand::WithdrawRoutes { names } => {
                Some(ControlCommand::AdvertiseRoutes { names: names.clone() })
            }
            ControlCommand::AdvertiseRoutes { names } => {
                Some(ControlCommand::WithdrawRoutes { names: names.clone() })
            }
        }
    }

    pub fn to_wire(&self) -> Value {
        match self {
            ControlCommand::StartAllProtocols => protocol_all("start"),
            ControlCommand::StopAllProtocols => protocol_all("stop"),
            ControlCommand::SetFlowTransmit { flow_names, state } => json!({
                "choice": "traffic",
                "traffic": {
                    "choice": "flow_transmit",
                    "flow_transmit": { "flow_names": flow_names, "state": state }
                }
            }),
            ControlCommand::SetPortLink { port_names, state } => json!({
                "choice": "port",
                "port": {
                    "choice": "link",
                    "link": { "port_names": port_names, "state": state }
                }
            }),
            ControlCommand::WithdrawRoutes { names } => protocol_route(names, "withdraw"),
            ControlCommand::AdvertiseRoutes { names } => protocol_route(names, "advertise"),
        }
    }
}

fn protocol_all(state: &str) -> Value {
    json!({
        "choice": "protocol",
        "protocol": { "choice": "all", "all": { "state": state } }
    })
}

fn protocol_route(names: &[String], state: &str) -> Value {
    json!({
        "choice": "protocol",
        "protocol": { "choice": "route", "route": { "names": names, "state": state } }
    })
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn names(list: &[String]) -> String {
            if list.is_empty() {
                "all".to_string()
            } else {
                list.join(",")
            }
        }
        match self {
            ControlCommand::StartAllProtocols => write!(f, "start all protocols"),
            ControlCommand::StopAllProtocols => write!(f, "stop all protocols"),
            ControlCommand::SetFlowTransmit { flow_names, state } => {
                write!(f, "{state:?} transmit on flows [{}]", names(flow_names))
            }
            ControlCommand::SetPortLink { port_names, state } => {
                write!(f, "set link {state:?} on ports [{}]", names(port_names))
            }
            ControlCommand::WithdrawRoutes { names: n } => {
                write!(f, "withdraw routes [{}]", names(n))
            }
            ControlCommand::AdvertiseRoutes { names: n } => {
                write!(f, "advertise routes [{}]", names(n))
            }
        }
    }
}
