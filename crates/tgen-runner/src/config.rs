use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tgen_client::ControllerConfig;
use tgen_common::protocol::{ControlCommand, LinkAdminState};
use tgen_common::{ConfigError, ExpectedPrefix, RouteExpectation, RouteMatch, TestExpectation};
use tgen_verify::{CompletionCheck, FaultPlan, RunPlan, WaitOptions, WaitPlan};

pub const RUN_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunFileInput {
    pub version: u32,
    pub controller: ControllerInput,
    pub topology: TopologyInput,
    pub protocols: ProtocolsInput,
    pub expect: ExpectInput,
    pub wait: WaitsInput,
    pub completion: CompletionInput,
    pub fault: Option<FaultInput>,
    pub convergence: ConvergenceInput,
    pub report: ReportInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ControllerInput {
    pub location: Option<String>,
    pub verify_tls: Option<bool>,
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TopologyInput {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProtocolsInput {
    pub start: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExpectInput {
    pub packet_count: u64,
    pub packet_rate: f64,
    pub total_port_frames: Option<u64>,
    pub routes_advertised: Option<u64>,
    pub routes_received: Option<u64>,
    pub route_match: RouteMatch,
    pub prefixes: Vec<PrefixInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrefixInput {
    pub address: String,
    pub next_hop: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WaitsInput {
    pub peering: WaitInput,
    pub prefixes: WaitInput,
    pub completion: WaitInput,
    pub ceased: WaitInput,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct WaitInput {
    pub interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    #[default]
    Flows,
    PortTotals,
    FlowsAndPorts,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompletionInput {
    pub check: CompletionKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FaultInput {
    pub lead_time_ms: Option<u64>,
    pub sample_interval_ms: Option<u64>,
    pub settle_ms: Option<u64>,
    pub link_down: Vec<String>,
    pub withdraw_routes: Vec<String>,
    pub restore: bool,
}

impl Default for FaultInput {
    fn default() -> Self {
        Self {
            lead_time_ms: None,
            sample_interval_ms: None,
            settle_ms: None,
            link_down: Vec::new(),
            withdraw_routes: Vec::new(),
            restore: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConvergenceInput {
    pub flow: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportInput {
    pub enabled: bool,
}

impl Default for ReportInput {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// A validated run file. The topology is still a path; the binary loads it.
#[derive(Debug, Clone)]
pub struct RunFile {
    pub controller: ControllerConfig,
    pub topology: Option<PathBuf>,
    pub expectation: TestExpectation,
    pub plan: RunPlan,
}

impl WaitInput {
    fn resolve(self) -> WaitOptions {
        let defaults = WaitOptions::default();
        WaitOptions::new(
            self.interval_ms
                .map(|ms| Duration::from_millis(ms.max(1)))
                .unwrap_or(defaults.interval),
            self.timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
        )
    }
}

impl FaultInput {
    fn resolve(self) -> Result<FaultPlan, ConfigError> {
        let mut inject: Vec<ControlCommand> = self
            .link_down
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| ControlCommand::port_link(p, LinkAdminState::Down))
            .collect();
        let routes: Vec<String> = self
            .withdraw_routes
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if !routes.is_empty() {
            inject.push(ControlCommand::WithdrawRoutes { names: routes });
        }
        if inject.is_empty() {
            return Err(ConfigError::Empty("fault.link_down / fault.withdraw_routes"));
        }

        let mut plan = FaultPlan::new(inject);
        plan.lead_time = self.lead_time_ms.map(Duration::from_millis);
        if let Some(ms) = self.sample_interval_ms {
            plan.sample_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = self.settle_ms {
            plan.settle = Duration::from_millis(ms);
        }
        if !self.restore {
            plan.restore.clear();
        }
        Ok(plan)
    }
}

impl RunFileInput {
    pub fn resolve(self) -> Result<RunFile, ConfigError> {
        let version = if self.version == 0 {
            RUN_FILE_VERSION
        } else {
            self.version
        };
        if version != RUN_FILE_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported run file version {version}"
            )));
        }

        let defaults = ControllerConfig::default();
        let controller = ControllerConfig {
            location: self
                .controller
                .location
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .unwrap_or(defaults.location),
            verify_tls: self.controller.verify_tls.unwrap_or(defaults.verify_tls),
            request_timeout: self
                .controller
                .request_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
        };

        let expect = self.expect;
        let mut builder = TestExpectation::builder(expect.packet_count, expect.packet_rate);
        if let Some(total) = expect.total_port_frames {
            builder = builder.total_port_frames(total);
        }
        match (expect.routes_advertised, expect.routes_received) {
            (None, None) => {}
            (adv, rcv) => {
                builder = builder.routes(RouteExpectation {
                    advertised: adv.or(rcv).unwrap_or_default(),
                    received: rcv.or(adv).unwrap_or_default(),
                    mode: expect.route_match,
                });
            }
        }
        for p in &expect.prefixes {
            builder = builder.prefix(ExpectedPrefix::parse(&p.address, &p.next_hop)?);
        }
        let expectation = builder.build()?;

        let fault = self.fault.map(FaultInput::resolve).transpose()?;
        let convergence_flow = self
            .convergence
            .flow
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());

        let plan = RunPlan {
            topology: None,
            start_protocols: self.protocols.start,
            completion: match self.completion.check {
                CompletionKind::Flows => CompletionCheck::Flows,
                CompletionKind::PortTotals => CompletionCheck::PortTotals,
                CompletionKind::FlowsAndPorts => CompletionCheck::FlowsAndPorts,
            },
            fault,
            convergence_flow,
            waits: WaitPlan {
                peering: self.wait.peering.resolve(),
                prefixes: self.wait.prefixes.resolve(),
                completion: self.wait.completion.resolve(),
                ceased: self.wait.ceased.resolve(),
            },
            report: self.report.enabled,
        };

        Ok(RunFile {
            controller,
            topology: self.topology.path,
            expectation,
            plan,
        })
    }
}

impl RunFile {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let parsed: RunFileInput = toml::from_str(input)
            .map_err(|e| ConfigError::Invalid(format!("invalid run file TOML: {e}")))?;
        parsed.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_link_flap_run_file() {
        let toml = r#"
            version = 1

            [controller]
            location = "clab-lab-04-ixia-c:8443"
            request_timeout_ms = 10000

            [topology]
            path = "lab-04-topology.json"

            [protocols]
            start = true

            [expect]
            packet_count = 15000
            packet_rate = 500
            routes_advertised = 5
            routes_received = 5

            [wait.peering]
            interval_ms = 2000
            timeout_ms = 60000

            [wait.ceased]
            interval_ms = 2000
            timeout_ms = 90000

            [fault]
            link_down = ["p2"]

            [convergence]
            flow = "bgpFlow"
        "#;

        let rf = RunFile::from_toml_str(toml).unwrap();
        assert_eq!(rf.controller.location, "clab-lab-04-ixia-c:8443");
        assert_eq!(rf.controller.request_timeout, Duration::from_secs(10));
        assert!(!rf.controller.verify_tls);
        assert_eq!(rf.topology, Some(PathBuf::from("lab-04-topology.json")));
        assert_eq!(rf.expectation.packet_count(), 15000);
        assert_eq!(rf.expectation.routes(), Some(&RouteExpectation::symmetric(5)));
        assert!(rf.plan.start_protocols);
        assert_eq!(rf.plan.waits.peering.interval, Duration::from_secs(2));
        assert_eq!(rf.plan.waits.ceased.timeout, Duration::from_secs(90));
        assert_eq!(rf.plan.waits.completion, WaitOptions::default());
        assert_eq!(rf.plan.convergence_flow.as_deref(), Some("bgpFlow"));
        assert!(rf.plan.report);

        let fault = rf.plan.fault.unwrap();
        assert_eq!(fault.inject, vec![ControlCommand::port_link("p2", LinkAdminState::Down)]);
        assert_eq!(fault.restore, vec![ControlCommand::port_link("p2", LinkAdminState::Up)]);
        assert_eq!(fault.lead_time, None);
    }

    #[test]
    fn minimal_run_file_uses_defaults() {
        let rf = RunFile::from_toml_str(
            r#"
            [expect]
            packet_count = 2000
            packet_rate = 100
            "#,
        )
        .unwrap();
        assert_eq!(rf.controller.location, ControllerConfig::default().location);
        assert!(rf.plan.fault.is_none());
        assert!(!rf.plan.start_protocols);
        assert_eq!(rf.plan.completion, CompletionCheck::Flows);
        assert!(rf.expectation.routes().is_none());
    }

    #[test]
    fn prefixes_and_exact_routes() {
        let rf = RunFile::from_toml_str(
            r#"
            [expect]
            packet_count = 1000
            packet_rate = 100
            routes_advertised = 2
            routes_received = 4
            route_match = "exactly"

            [[expect.prefixes]]
            address = "::20:20:20:1"
            next_hop = "::1:1:1:4"

            [completion]
            check = "flows_and_ports"
            "#,
        )
        .unwrap();
        let routes = rf.expectation.routes().unwrap();
        assert_eq!(routes.advertised, 2);
        assert_eq!(routes.received, 4);
        assert_eq!(routes.mode, RouteMatch::Exactly);
        assert_eq!(rf.expectation.prefixes().len(), 1);
        assert_eq!(rf.plan.completion, CompletionCheck::FlowsAndPorts);
    }

    #[test]
    fn zero_wait_interval_is_raised_to_one_millisecond() {
        let rf = RunFile::from_toml_str(
            "[expect]\npacket_count = 10\npacket_rate = 10\n[wait.completion]\ninterval_ms = 0\n",
        )
        .unwrap();
        assert_eq!(rf.plan.waits.completion.interval, Duration::from_millis(1));
    }

    #[test]
    fn unrepresentable_traffic_duration_is_rejected() {
        let err = RunFile::from_toml_str(
            "[expect]\npacket_count = 1000000000000\npacket_rate = 1e-9\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_rate_is_rejected() {
        let err = RunFile::from_toml_str("[expect]\npacket_count = 10\n").unwrap_err();
        assert_eq!(err, ConfigError::InvalidRate(0.0));
    }

    #[test]
    fn fault_without_commands_is_rejected() {
        let err = RunFile::from_toml_str(
            "[expect]\npacket_count = 10\npacket_rate = 10\n[fault]\nsettle_ms = 100\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Empty(_)));
    }

    #[test]
    fn withdraw_without_restore() {
        let rf = RunFile::from_toml_str(
            r#"
            [expect]
            packet_count = 10
            packet_rate = 10
            [fault]
            withdraw_routes = ["d2_bgpv4_peer_rrv4"]
            restore = false
            lead_time_ms = 500
            "#,
        )
        .unwrap();
        let fault = rf.plan.fault.unwrap();
        assert!(fault.restore.is_empty());
        assert_eq!(fault.lead_time, Some(Duration::from_millis(500)));
    }

    #[test]
    fn unsupported_version() {
        assert!(RunFile::from_toml_str("version = 7").is_err());
    }
}
