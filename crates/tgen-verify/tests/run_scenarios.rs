//! End-to-end runs against a scripted controller on a paused clock.

mod common;

use std::time::Duration;

use common::ScriptedController;
use serde_json::json;
use tgen_common::models::{
    Bgpv4Metric, BgpPrefixesState, FlowMetric, FlowTransmit, PortMetric, SessionState,
};
use tgen_common::protocol::{ControlCommand, LinkAdminState};
use tgen_common::{ExpectedPrefix, RouteExpectation, TestExpectation};
use tgen_verify::run::WaitVerdict;
use tgen_verify::{
    CompletionCheck, ConvergenceError, FaultPlan, Run, RunError, RunPlan, RunState, WaitOptions,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn flow(state: FlowTransmit, tx: u64, rx: u64) -> Vec<FlowMetric> {
    vec![FlowMetric::new("f1", state, tx, rx)]
}

fn peers(state: SessionState, adv: u64, rcv: u64) -> Vec<Bgpv4Metric> {
    vec![
        Bgpv4Metric::new("p1_bgp", state, adv, rcv),
        Bgpv4Metric::new("p2_bgp", state, adv, rcv),
    ]
}

fn states(report_states: &[tgen_verify::run::Transition]) -> Vec<RunState> {
    report_states.iter().map(|t| t.state).collect()
}

fn opts(interval_s: u64, timeout_s: u64) -> WaitOptions {
    WaitOptions::new(Duration::from_secs(interval_s), Duration::from_secs(timeout_s))
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn two_port_traffic_completes() {
    let controller = ScriptedController::new()
        .flows(vec![
            flow(FlowTransmit::Started, 500, 480),
            flow(FlowTransmit::Started, 1500, 1490),
            flow(FlowTransmit::Stopped, 2000, 2000),
        ])
        .ports(vec![
            vec![PortMetric::new("p1", 500, 0), PortMetric::new("p2", 0, 480)],
            vec![PortMetric::new("p1", 1500, 0), PortMetric::new("p2", 0, 1490)],
            vec![PortMetric::new("p1", 2000, 0), PortMetric::new("p2", 0, 2000)],
        ]);
    let expectation = TestExpectation::builder(2000, 100.0).build().unwrap();
    let plan = RunPlan {
        topology: Some(json!({"ports": [{"name": "p1"}, {"name": "p2"}]})),
        completion: CompletionCheck::FlowsAndPorts,
        ..Default::default()
    };

    let mut run = Run::new(&controller, plan, expectation);
    let report = run.execute().await.unwrap();

    assert_eq!(report.final_state, RunState::Done);
    assert_eq!(
        states(&report.transitions),
        vec![
            RunState::Configuring,
            RunState::TrafficStarting,
            RunState::AwaitingTrafficCompletion,
            RunState::Done,
        ]
    );
    assert_eq!(report.waits.len(), 1);
    assert_eq!(report.waits[0].verdict, WaitVerdict::Satisfied);
    assert_eq!(report.waits[0].attempts, 3);
    assert_eq!(report.waits[0].elapsed, Duration::from_secs(2));
    assert!(report.convergence.is_none());
    assert_eq!(controller.configs().len(), 1);
    assert_eq!(controller.commands(), vec![ControlCommand::start_transmit()]);
}

#[tokio::test(start_paused = true)]
async fn peering_then_prefixes_then_traffic() {
    let prefixes: BgpPrefixesState = serde_json::from_value(json!({
        "bgp_peer_name": "p1_bgp",
        "ipv4_unicast_prefixes": [
            {"ipv4_address": "20.20.20.1", "prefix_length": 32, "ipv4_next_hop": "1.1.1.4"}
        ]
    }))
    .unwrap();

    let controller = ScriptedController::new()
        .bgpv4(vec![
            peers(SessionState::Down, 0, 0),
            peers(SessionState::Up, 5, 4),
            peers(SessionState::Up, 5, 5),
        ])
        .prefixes(vec![Vec::new(), vec![prefixes]])
        .flows(vec![flow(FlowTransmit::Stopped, 1000, 1000)]);
    let expectation = TestExpectation::builder(1000, 100.0)
        .routes(RouteExpectation::symmetric(5))
        .prefix(ExpectedPrefix::parse("20.20.20.1", "1.1.1.4").unwrap())
        .build()
        .unwrap();
    let plan = RunPlan {
        start_protocols: true,
        ..Default::default()
    };

    let mut run = Run::new(&controller, plan, expectation);
    let report = run.execute().await.unwrap();

    assert_eq!(
        states(&report.transitions),
        vec![
            RunState::Configuring,
            RunState::ProtocolsStarting,
            RunState::AwaitingPeering,
            RunState::AwaitingPrefixes,
            RunState::TrafficStarting,
            RunState::AwaitingTrafficCompletion,
            RunState::Done,
        ]
    );
    assert_eq!(report.waits[0].attempts, 3);
    assert_eq!(report.waits[1].attempts, 2);
    assert_eq!(
        controller.commands(),
        vec![ControlCommand::StartAllProtocols, ControlCommand::start_transmit()]
    );
    // no topology supplied, nothing pushed
    assert!(controller.configs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn link_flap_measures_convergence_and_restores_link() {
    let controller = ScriptedController::new()
        .ports(vec![vec![PortMetric::new("p1", 100, 0), PortMetric::new("p2", 0, 100)]])
        .flows(vec![
            flow(FlowTransmit::Started, 100, 100),
            flow(FlowTransmit::Started, 300, 300),
            flow(FlowTransmit::Started, 500, 500),
            flow(FlowTransmit::Started, 600, 600),
            flow(FlowTransmit::Started, 1500, 1300),
            flow(FlowTransmit::Stopped, 2000, 1800),
        ]);
    let expectation = TestExpectation::builder(2000, 100.0).build().unwrap();
    let mut fault = FaultPlan::link_flap("p2");
    fault.lead_time = Some(Duration::from_secs(5));
    let plan = RunPlan {
        fault: Some(fault),
        convergence_flow: Some("f1".into()),
        ..Default::default()
    };

    let mut run = Run::new(&controller, plan, expectation);
    let report = run.execute().await.unwrap();

    let convergence = report.convergence.as_ref().unwrap();
    assert_eq!(convergence.flow_name, "f1");
    assert_eq!(convergence.seconds, 2.0);
    assert!(convergence.anomaly().is_none());

    let seen = states(&report.transitions);
    assert!(!seen.contains(&RunState::AwaitingTrafficCompletion));
    assert_eq!(
        &seen[seen.len() - 5..],
        &[
            RunState::TrafficRunning,
            RunState::FaultInjected,
            RunState::AwaitingTrafficCeased,
            RunState::MeasuringConvergence,
            RunState::Done,
        ]
    );
    assert_eq!(
        controller.commands(),
        vec![
            ControlCommand::start_transmit(),
            ControlCommand::port_link("p2", LinkAdminState::Down),
            ControlCommand::port_link("p2", LinkAdminState::Up),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn negative_convergence_is_reported_unclamped() {
    let controller = ScriptedController::new()
        .ports(vec![vec![PortMetric::new("p1", 1, 1)]])
        .flows(vec![flow(FlowTransmit::Stopped, 500, 600)]);
    let expectation = TestExpectation::builder(500, 50.0).build().unwrap();
    let mut fault = FaultPlan::link_flap("p2");
    fault.lead_time = Some(Duration::ZERO);
    fault.settle = Duration::ZERO;
    let plan = RunPlan {
        fault: Some(fault),
        convergence_flow: Some("f1".into()),
        ..Default::default()
    };

    let report = Run::new(&controller, plan, expectation).execute().await.unwrap();
    let convergence = report.convergence.unwrap();
    assert_eq!(convergence.seconds, -2.0);
    assert!(convergence.anomaly().is_some());
}

#[tokio::test(start_paused = true)]
async fn peering_timeout_fails_in_awaiting_peering() {
    let controller = ScriptedController::new().bgpv4(vec![peers(SessionState::Down, 0, 0)]);
    let expectation = TestExpectation::builder(1000, 100.0)
        .routes(RouteExpectation::symmetric(5))
        .build()
        .unwrap();
    let mut plan = RunPlan {
        start_protocols: true,
        ..Default::default()
    };
    plan.waits.peering = opts(1, 5);

    let mut run = Run::new(&controller, plan, expectation);
    let err = run.execute().await.unwrap_err();

    match &err {
        RunError::TimeoutExceeded {
            state,
            condition,
            elapsed,
            last_snapshot,
        } => {
            assert_eq!(*state, RunState::AwaitingPeering);
            assert_eq!(condition, "correct bgp peering");
            assert_eq!(*elapsed, Duration::from_secs(5));
            assert_eq!(last_snapshot.bgpv4_peers().len(), 2);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    // traffic never started
    assert_eq!(controller.commands(), vec![ControlCommand::StartAllProtocols]);
    assert_eq!(run.report().final_state, RunState::AwaitingPeering);
    assert_eq!(run.report().waits[0].verdict, WaitVerdict::TimedOut);
    assert_eq!(run.report().waits[0].attempts, 6);
}

#[tokio::test(start_paused = true)]
async fn lost_controller_is_a_communication_fault() {
    let controller = ScriptedController::new()
        .flows(vec![flow(FlowTransmit::Started, 100, 100)])
        .then_disconnect_flows();
    let expectation = TestExpectation::builder(2000, 100.0).build().unwrap();

    let mut run = Run::new(&controller, RunPlan::default(), expectation);
    let err = run.execute().await.unwrap_err();

    assert!(matches!(err, RunError::CommunicationFault { .. }));
    assert_eq!(err.state(), RunState::AwaitingTrafficCompletion);
    assert_eq!(err.elapsed(), Duration::from_secs(1));
    let last = err.last_snapshot().unwrap();
    assert_eq!(last.flow("f1").unwrap().frames_tx, 100);
    assert_eq!(run.report().waits[0].verdict, WaitVerdict::ProbeFailed);
}

#[tokio::test(start_paused = true)]
async fn rejected_command_stops_the_run() {
    let controller =
        ScriptedController::new().fail_command(ControlCommand::StartAllProtocols);
    let expectation = TestExpectation::builder(10, 10.0).build().unwrap();
    let plan = RunPlan {
        start_protocols: true,
        ..Default::default()
    };

    let err = Run::new(&controller, plan, expectation)
        .execute()
        .await
        .unwrap_err();
    assert_eq!(err.state(), RunState::ProtocolsStarting);
    assert!(err.to_string().contains("HTTP 500"));
}

#[tokio::test(start_paused = true)]
async fn link_is_restored_when_traffic_never_ceases() {
    let controller = ScriptedController::new()
        .ports(vec![vec![PortMetric::new("p1", 1, 1)]])
        .flows(vec![flow(FlowTransmit::Started, 100, 50)]);
    let expectation = TestExpectation::builder(2000, 100.0).build().unwrap();
    let mut fault = FaultPlan::link_flap("p2");
    fault.lead_time = Some(Duration::from_secs(1));
    let mut plan = RunPlan {
        fault: Some(fault),
        convergence_flow: Some("f1".into()),
        ..Default::default()
    };
    plan.waits.ceased = opts(1, 3);

    let mut run = Run::new(&controller, plan, expectation);
    let err = run.execute().await.unwrap_err();

    assert_eq!(err.state(), RunState::AwaitingTrafficCeased);
    assert_eq!(
        controller.commands().last(),
        Some(&ControlCommand::port_link("p2", LinkAdminState::Up))
    );
    assert!(run.report().convergence.is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_restore_is_kept_as_a_warning() {
    let restore = ControlCommand::port_link("p2", LinkAdminState::Up);
    let controller = ScriptedController::new()
        .ports(vec![vec![PortMetric::new("p1", 1, 1)]])
        .flows(vec![flow(FlowTransmit::Stopped, 100, 100)])
        .fail_command(restore);
    let expectation = TestExpectation::builder(100, 100.0).build().unwrap();
    let mut fault = FaultPlan::link_flap("p2");
    fault.lead_time = Some(Duration::ZERO);
    let plan = RunPlan {
        fault: Some(fault),
        ..Default::default()
    };

    let report = Run::new(&controller, plan, expectation).execute().await.unwrap();
    assert_eq!(report.final_state, RunState::Done);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("restore command"));
}

#[tokio::test(start_paused = true)]
async fn unknown_convergence_flow_is_a_configuration_error() {
    let controller = ScriptedController::new().flows(vec![flow(FlowTransmit::Stopped, 10, 10)]);
    let expectation = TestExpectation::builder(10, 10.0).build().unwrap();
    let plan = RunPlan {
        convergence_flow: Some("missing".into()),
        ..Default::default()
    };

    let mut run = Run::new(&controller, plan, expectation);
    let err = run.execute().await.unwrap_err();

    let snapshot = err.last_snapshot().expect("snapshot that lacked the flow");
    assert!(snapshot.flow("missing").is_none());
    assert!(snapshot.flows().is_empty());
    assert_eq!(run.report().last_snapshot.as_ref(), Some(snapshot));

    match err {
        RunError::Configuration { state, source, .. } => {
            assert_eq!(state, RunState::MeasuringConvergence);
            assert_eq!(source, ConvergenceError::FlowMissing("missing".into()));
        }
        other => panic!("expected configuration error, got {other:?}"),
    }
}
