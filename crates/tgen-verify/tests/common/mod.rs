//! Shared test helpers: an in-memory controller that replays scripted
//! metrics and records every command it receives.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::Value;
use tgen_client::{ClientError, Controller};
use tgen_common::models::{Bgpv4Metric, BgpPrefixesState, FlowMetric, PortMetric};
use tgen_common::protocol::{
    ControlCommand, MetricsRequest, MetricsResponse, StatesRequest, StatesResponse,
};

#[derive(Clone)]
enum Step<T> {
    Reply(Vec<T>),
    Disconnect,
}

/// Each query pops the next scripted reply; the last one repeats forever.
struct Track<T> {
    steps: VecDeque<Step<T>>,
}

impl<T: Clone> Track<T> {
    fn new() -> Self {
        Self {
            steps: VecDeque::new(),
        }
    }

    fn next(&mut self) -> Result<Vec<T>, ClientError> {
        let step = if self.steps.len() > 1 {
            self.steps.pop_front()
        } else {
            self.steps.front().cloned()
        };
        match step {
            Some(Step::Reply(records)) => Ok(records),
            Some(Step::Disconnect) => Err(ClientError::Disconnected("scripted disconnect".into())),
            None => Ok(Vec::new()),
        }
    }
}

struct Script {
    ports: Track<PortMetric>,
    flows: Track<FlowMetric>,
    bgpv4: Track<Bgpv4Metric>,
    prefixes: Track<BgpPrefixesState>,
    commands: Vec<ControlCommand>,
    configs: Vec<Value>,
    failing_command: Option<ControlCommand>,
}

pub struct ScriptedController {
    script: Mutex<Script>,
}

impl ScriptedController {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                ports: Track::new(),
                flows: Track::new(),
                bgpv4: Track::new(),
                prefixes: Track::new(),
                commands: Vec::new(),
                configs: Vec::new(),
                failing_command: None,
            }),
        }
    }

    pub fn ports(self, replies: Vec<Vec<PortMetric>>) -> Self {
        self.with(|s| s.ports.steps.extend(replies.into_iter().map(Step::Reply)))
    }

    pub fn flows(self, replies: Vec<Vec<FlowMetric>>) -> Self {
        self.with(|s| s.flows.steps.extend(replies.into_iter().map(Step::Reply)))
    }

    pub fn bgpv4(self, replies: Vec<Vec<Bgpv4Metric>>) -> Self {
        self.with(|s| s.bgpv4.steps.extend(replies.into_iter().map(Step::Reply)))
    }

    pub fn prefixes(self, replies: Vec<Vec<BgpPrefixesState>>) -> Self {
        self.with(|s| s.prefixes.steps.extend(replies.into_iter().map(Step::Reply)))
    }

    /// After the scripted flow replies, every flow query fails.
    pub fn then_disconnect_flows(self) -> Self {
        self.with(|s| s.flows.steps.push_back(Step::Disconnect))
    }

    /// Reject this exact command with an API error.
    pub fn fail_command(self, command: ControlCommand) -> Self {
        self.with(|s| s.failing_command = Some(command))
    }

    pub fn commands(&self) -> Vec<ControlCommand> {
        self.lock().commands.clone()
    }

    pub fn configs(&self) -> Vec<Value> {
        self.lock().configs.clone()
    }

    fn with(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut self.lock());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }
}

impl Controller for ScriptedController {
    async fn set_config(&self, config: &Value) -> Result<Vec<String>, ClientError> {
        self.lock().configs.push(config.clone());
        Ok(Vec::new())
    }

    async fn get_metrics(&self, request: &MetricsRequest) -> Result<MetricsResponse, ClientError> {
        let mut s = self.lock();
        let mut resp = MetricsResponse::default();
        match request {
            MetricsRequest::Port { .. } => resp.port_metrics = s.ports.next()?,
            MetricsRequest::Flow { flow_names } => {
                resp.flow_metrics = s.flows.next()?;
                if !flow_names.is_empty() {
                    resp.flow_metrics.retain(|f| flow_names.contains(&f.name));
                }
            }
            MetricsRequest::Bgpv4 { .. } => resp.bgpv4_metrics = s.bgpv4.next()?,
        }
        Ok(resp)
    }

    async fn get_states(&self, request: &StatesRequest) -> Result<StatesResponse, ClientError> {
        let StatesRequest::BgpPrefixes { .. } = request;
        Ok(StatesResponse {
            bgp_prefixes: self.lock().prefixes.next()?,
        })
    }

    async fn set_control_state(
        &self,
        command: &ControlCommand,
    ) -> Result<Vec<String>, ClientError> {
        let mut s = self.lock();
        s.commands.push(command.clone());
        if s.failing_command.as_ref() == Some(command) {
            return Err(ClientError::Api {
                status: 500,
                kind: Some("internal".into()),
                errors: vec![format!("cannot {command}")],
            });
        }
        Ok(Vec::new())
    }
}
