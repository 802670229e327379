//! One verification run as a forward-only state machine.
//!
//! ```text
//! Configuring → ProtocolsStarting → AwaitingPeering → [AwaitingPrefixes]
//!   → TrafficStarting → AwaitingTrafficCompletion → [MeasuringConvergence] → Done
//!
//! with a fault plan, after TrafficStarting:
//!   → TrafficRunning → FaultInjected → AwaitingTrafficCeased → [MeasuringConvergence] → Done
//! ```
//!
//! Protocol states are skipped when the plan does not start protocols.
//! Every `Awaiting*` state is one [`wait_for`] call. A timeout or a
//! controller failure ends the run in the state it happened in; later
//! states never execute.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tgen_client::{ClientError, Controller, SnapshotQuery, sample};
use tgen_common::protocol::{ControlCommand, LinkAdminState};
use tgen_common::{MetricsSnapshot, TestExpectation};
use tokio::time::Instant;

use crate::convergence::{ConvergenceError, ConvergenceMeasurement};
use crate::predicates::Readiness;
use crate::report::format_snapshot;
use crate::wait::{Observation, ProbeFailed, WaitOptions, WaitOutcome, wait_for};

// ── States ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Configuring,
    ProtocolsStarting,
    AwaitingPeering,
    AwaitingPrefixes,
    TrafficStarting,
    TrafficRunning,
    AwaitingTrafficCompletion,
    FaultInjected,
    AwaitingTrafficCeased,
    MeasuringConvergence,
    Done,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Configuring => "configuring",
            RunState::ProtocolsStarting => "protocols_starting",
            RunState::AwaitingPeering => "awaiting_peering",
            RunState::AwaitingPrefixes => "awaiting_prefixes",
            RunState::TrafficStarting => "traffic_starting",
            RunState::TrafficRunning => "traffic_running",
            RunState::AwaitingTrafficCompletion => "awaiting_traffic_completion",
            RunState::FaultInjected => "fault_injected",
            RunState::AwaitingTrafficCeased => "awaiting_traffic_ceased",
            RunState::MeasuringConvergence => "measuring_convergence",
            RunState::Done => "done",
        };
        f.write_str(s)
    }
}

// ── Plan ────────────────────────────────────────────────────────────

/// Interval and timeout for each awaited phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitPlan {
    pub peering: WaitOptions,
    pub prefixes: WaitOptions,
    pub completion: WaitOptions,
    pub ceased: WaitOptions,
}

/// What "traffic completed" means for a run without a fault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompletionCheck {
    #[default]
    Flows,
    PortTotals,
    FlowsAndPorts,
}

impl CompletionCheck {
    pub fn checks(self) -> &'static [Readiness] {
        match self {
            CompletionCheck::Flows => &[Readiness::FlowCompletion],
            CompletionCheck::PortTotals => &[Readiness::PortFrameTotals],
            CompletionCheck::FlowsAndPorts => {
                &[Readiness::FlowCompletion, Readiness::PortFrameTotals]
            }
        }
    }
}

/// A disruption applied while traffic runs.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultPlan {
    /// How long traffic runs before injection. `None` means half the
    /// nominal traffic duration.
    pub lead_time: Option<Duration>,
    /// Metrics sampling cadence while waiting out the lead time.
    pub sample_interval: Duration,
    pub inject: Vec<ControlCommand>,
    /// Pause after injection before polling for traffic to cease.
    pub settle: Duration,
    /// Issued once the run is past the fault, whether it passed or not.
    pub restore: Vec<ControlCommand>,
}

impl FaultPlan {
    /// Inject `commands`; restore with their inverses in reverse order.
    pub fn new(inject: Vec<ControlCommand>) -> Self {
        let restore = inject.iter().rev().filter_map(ControlCommand::inverse).collect();
        Self {
            lead_time: None,
            sample_interval: Duration::from_secs(2),
            inject,
            settle: Duration::from_secs(2),
            restore,
        }
    }

    /// Take one port's link down, bring it back up afterwards.
    pub fn link_flap(port: impl Into<String>) -> Self {
        Self::new(vec![ControlCommand::port_link(port, LinkAdminState::Down)])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunPlan {
    /// Topology pushed in `Configuring`; `None` keeps the controller's
    /// current configuration.
    pub topology: Option<Value>,
    pub start_protocols: bool,
    pub completion: CompletionCheck,
    pub fault: Option<FaultPlan>,
    /// Flow whose counters give the convergence time.
    pub convergence_flow: Option<String>,
    pub waits: WaitPlan,
    /// Log a snapshot table on every poll.
    pub report: bool,
}

// ── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub state: RunState,
    /// Since the run started.
    pub at: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitVerdict {
    Satisfied,
    TimedOut,
    ProbeFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitRecord {
    pub state: RunState,
    pub condition: String,
    pub verdict: WaitVerdict,
    pub attempts: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub final_state: RunState,
    pub elapsed: Duration,
    pub transitions: Vec<Transition>,
    pub waits: Vec<WaitRecord>,
    pub warnings: Vec<String>,
    pub convergence: Option<ConvergenceMeasurement>,
    pub last_snapshot: Option<MetricsSnapshot>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            final_state: RunState::Configuring,
            elapsed: Duration::ZERO,
            transitions: Vec::new(),
            waits: Vec::new(),
            warnings: Vec::new(),
            convergence: None,
            last_snapshot: None,
        }
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "run ended in {} after {:.1?}", self.final_state, self.elapsed)?;
        for t in &self.transitions {
            writeln!(f, "  {:>10.1?}  {}", t.at, t.state)?;
        }
        for w in &self.waits {
            writeln!(
                f,
                "  wait {:?} in {}: {:?} after {} attempts, {:.1?}",
                w.condition, w.state, w.verdict, w.attempts, w.elapsed
            )?;
        }
        for warning in &self.warnings {
            writeln!(f, "  warning: {warning}")?;
        }
        if let Some(c) = &self.convergence {
            writeln!(f, "  {c}")?;
            if let Some(anomaly) = c.anomaly() {
                writeln!(f, "  anomaly: {anomaly}")?;
            }
            writeln!(f, "  note: {}", c.note)?;
        }
        Ok(())
    }
}

// ── Errors ──────────────────────────────────────────────────────────

/// Run-level failure. Each variant names the state the run stopped in
/// and how long it had been in that state.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("timed out in {state} waiting for {condition} after {elapsed:.1?}")]
    TimeoutExceeded {
        state: RunState,
        condition: String,
        elapsed: Duration,
        last_snapshot: Box<MetricsSnapshot>,
    },
    #[error("controller communication failed in {state} after {elapsed:.1?}: {source}")]
    CommunicationFault {
        state: RunState,
        elapsed: Duration,
        source: ClientError,
        last_snapshot: Option<Box<MetricsSnapshot>>,
    },
    #[error("configuration error in {state}: {source}")]
    Configuration {
        state: RunState,
        elapsed: Duration,
        source: ConvergenceError,
        last_snapshot: Option<Box<MetricsSnapshot>>,
    },
}

impl RunError {
    pub fn state(&self) -> RunState {
        match self {
            RunError::TimeoutExceeded { state, .. }
            | RunError::CommunicationFault { state, .. }
            | RunError::Configuration { state, .. } => *state,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            RunError::TimeoutExceeded { elapsed, .. }
            | RunError::CommunicationFault { elapsed, .. }
            | RunError::Configuration { elapsed, .. } => *elapsed,
        }
    }

    pub fn last_snapshot(&self) -> Option<&MetricsSnapshot> {
        match self {
            RunError::TimeoutExceeded { last_snapshot, .. } => Some(last_snapshot.as_ref()),
            RunError::CommunicationFault { last_snapshot, .. }
            | RunError::Configuration { last_snapshot, .. } => last_snapshot.as_deref(),
        }
    }
}

// ── Orchestrator ────────────────────────────────────────────────────

pub struct Run<'a, C> {
    controller: &'a C,
    plan: RunPlan,
    expectation: TestExpectation,
    state: RunState,
    started: Instant,
    state_entered: Instant,
    report: RunReport,
}

impl<'a, C: Controller> Run<'a, C> {
    pub fn new(controller: &'a C, plan: RunPlan, expectation: TestExpectation) -> Self {
        let now = Instant::now();
        Self {
            controller,
            plan,
            expectation,
            state: RunState::Configuring,
            started: now,
            state_entered: now,
            report: RunReport::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Everything recorded so far, including after a failed run.
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub async fn execute(&mut self) -> Result<RunReport, RunError> {
        self.started = Instant::now();
        self.state_entered = self.started;
        self.report = RunReport::new();

        let result = self.drive().await;
        self.report.final_state = self.state;
        self.report.elapsed = self.started.elapsed();

        match result {
            Ok(()) => {
                tracing::info!(
                    elapsed_ms = self.report.elapsed.as_millis() as u64,
                    "run passed"
                );
                Ok(self.report.clone())
            }
            Err(e) => {
                tracing::error!(state = %e.state(), error = %e, "run failed");
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<(), RunError> {
        self.enter(RunState::Configuring);
        self.apply_config().await?;

        if self.plan.start_protocols {
            self.enter(RunState::ProtocolsStarting);
            self.send(ControlCommand::StartAllProtocols).await?;
            let options = self.plan.waits.peering;
            self.await_condition(RunState::AwaitingPeering, &[Readiness::ProtocolPeering], options)
                .await?;
            if !self.expectation.prefixes().is_empty() {
                let options = self.plan.waits.prefixes;
                self.await_condition(
                    RunState::AwaitingPrefixes,
                    &[Readiness::LearnedPrefixes],
                    options,
                )
                .await?;
            }
        }

        self.enter(RunState::TrafficStarting);
        self.send(ControlCommand::start_transmit()).await?;

        match self.plan.fault.clone() {
            None => {
                let options = self.plan.waits.completion;
                let checks = self.plan.completion.checks();
                self.await_condition(RunState::AwaitingTrafficCompletion, checks, options)
                    .await?;
                self.measure_convergence().await?;
            }
            Some(fault) => {
                let lead = fault
                    .lead_time
                    .unwrap_or_else(|| self.expectation.traffic_duration() / 2);
                self.run_traffic_for(lead, fault.sample_interval).await?;
                let result = self.inject_and_measure(&fault).await;
                self.restore(&fault).await;
                result?;
            }
        }

        self.enter(RunState::Done);
        Ok(())
    }

    async fn apply_config(&mut self) -> Result<(), RunError> {
        let warnings = match &self.plan.topology {
            Some(topology) => {
                tracing::info!("applying topology");
                self.controller
                    .set_config(topology)
                    .await
                    .map_err(|e| self.fault(e))?
            }
            None => Vec::new(),
        };
        self.report.warnings.extend(warnings);
        Ok(())
    }

    async fn send(&mut self, command: ControlCommand) -> Result<(), RunError> {
        tracing::info!(%command, state = %self.state, "sending command");
        let warnings = self
            .controller
            .set_control_state(&command)
            .await
            .map_err(|e| self.fault(e))?;
        self.report.warnings.extend(warnings);
        Ok(())
    }

    /// Let traffic run for `lead`, sampling flows and ports as it goes.
    async fn run_traffic_for(
        &mut self,
        lead: Duration,
        interval: Duration,
    ) -> Result<(), RunError> {
        self.enter(RunState::TrafficRunning);
        let query = SnapshotQuery::flows().with(SnapshotQuery::ports());
        let start = Instant::now();
        loop {
            let snapshot = sample(self.controller, &query)
                .await
                .map_err(|e| self.fault(e))?;
            if self.plan.report {
                tracing::info!("{}", format_snapshot(&snapshot));
            }
            self.report.last_snapshot = Some(snapshot);

            let elapsed = start.elapsed();
            if elapsed >= lead {
                return Ok(());
            }
            tokio::time::sleep(interval.min(lead - elapsed)).await;
        }
    }

    async fn inject_and_measure(&mut self, fault: &FaultPlan) -> Result<(), RunError> {
        self.enter(RunState::FaultInjected);
        for command in &fault.inject {
            self.send(command.clone()).await?;
        }
        tokio::time::sleep(fault.settle).await;

        let options = self.plan.waits.ceased;
        self.await_condition(RunState::AwaitingTrafficCeased, &[Readiness::TrafficCeased], options)
            .await?;
        self.measure_convergence().await
    }

    /// Best effort: failures are logged and kept as warnings, never raised.
    async fn restore(&mut self, fault: &FaultPlan) {
        for command in &fault.restore {
            tracing::info!(%command, "restoring");
            match self.controller.set_control_state(command).await {
                Ok(warnings) => self.report.warnings.extend(warnings),
                Err(e) => {
                    tracing::warn!(%command, error = %e, "restore command failed");
                    self.report
                        .warnings
                        .push(format!("restore command '{command}' failed: {e}"));
                }
            }
        }
    }

    async fn measure_convergence(&mut self) -> Result<(), RunError> {
        let Some(flow_name) = self.plan.convergence_flow.clone() else {
            return Ok(());
        };
        self.enter(RunState::MeasuringConvergence);

        let snapshot = sample(self.controller, &SnapshotQuery::flow(flow_name.as_str()))
            .await
            .map_err(|e| self.fault(e))?;
        let measured = match snapshot.flow(&flow_name) {
            Some(flow) => ConvergenceMeasurement::from_flow(flow, self.expectation.packet_rate()),
            None => Err(ConvergenceError::FlowMissing(flow_name.clone())),
        };
        self.report.last_snapshot = Some(snapshot);
        let measurement = measured.map_err(|e| self.misconfigured(e))?;

        tracing::info!(
            flow = %measurement.flow_name,
            seconds = measurement.seconds,
            "convergence time measured"
        );
        self.report.convergence = Some(measurement);
        Ok(())
    }

    /// Enter `state` and poll until every check passes on one snapshot.
    async fn await_condition(
        &mut self,
        state: RunState,
        checks: &[Readiness],
        options: WaitOptions,
    ) -> Result<MetricsSnapshot, RunError> {
        self.enter(state);

        let query = checks
            .iter()
            .fold(SnapshotQuery::default(), |q, r| q.with(r.query()));
        let condition = checks
            .iter()
            .map(|r| r.describe())
            .collect::<Vec<_>>()
            .join(" and ");

        let controller = self.controller;
        let expectation = &self.expectation;
        let query = &query;
        let log_tables = self.plan.report;

        let result = wait_for(&condition, options, move || async move {
            let snapshot = sample(controller, query).await?;
            if log_tables {
                tracing::info!("{}", format_snapshot(&snapshot));
            }
            let ready = checks.iter().all(|r| r.evaluate(&snapshot, expectation));
            Ok::<_, ClientError>(Observation { ready, snapshot })
        })
        .await;

        match result {
            Ok(WaitOutcome::Satisfied {
                elapsed,
                attempts,
                snapshot,
            }) => {
                self.record_wait(&condition, WaitVerdict::Satisfied, attempts, elapsed);
                self.report.last_snapshot = Some(snapshot.clone());
                Ok(snapshot)
            }
            Ok(WaitOutcome::TimedOut {
                elapsed,
                attempts,
                snapshot,
            }) => {
                self.record_wait(&condition, WaitVerdict::TimedOut, attempts, elapsed);
                self.report.last_snapshot = Some(snapshot.clone());
                Err(RunError::TimeoutExceeded {
                    state,
                    condition,
                    elapsed,
                    last_snapshot: Box::new(snapshot),
                })
            }
            Err(ProbeFailed {
                source,
                last,
                elapsed,
                attempts,
            }) => {
                self.record_wait(&condition, WaitVerdict::ProbeFailed, attempts, elapsed);
                if last.is_some() {
                    self.report.last_snapshot = last;
                }
                Err(RunError::CommunicationFault {
                    state,
                    elapsed,
                    source,
                    last_snapshot: self.report.last_snapshot.clone().map(Box::new),
                })
            }
        }
    }

    fn enter(&mut self, state: RunState) {
        debug_assert!(state >= self.state, "run states only move forward");
        let at = self.started.elapsed();
        tracing::info!(
            from = %self.state,
            to = %state,
            at_ms = at.as_millis() as u64,
            "run state"
        );
        self.state = state;
        self.state_entered = Instant::now();
        self.report.transitions.push(Transition { state, at });
    }

    fn record_wait(
        &mut self,
        condition: &str,
        verdict: WaitVerdict,
        attempts: u32,
        elapsed: Duration,
    ) {
        self.report.waits.push(WaitRecord {
            state: self.state,
            condition: condition.to_string(),
            verdict,
            attempts,
            elapsed,
        });
    }

    fn fault(&self, source: ClientError) -> RunError {
        RunError::CommunicationFault {
            state: self.state,
            elapsed: self.state_entered.elapsed(),
            source,
            last_snapshot: self.report.last_snapshot.clone().map(Box::new),
        }
    }

    fn misconfigured(&self, source: ConvergenceError) -> RunError {
        RunError::Configuration {
            state: self.state,
            elapsed: self.state_entered.elapsed(),
            source,
            last_snapshot: self.report.last_snapshot.clone().map(Box::new),
        }
    }
}
