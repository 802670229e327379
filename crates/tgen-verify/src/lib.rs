//! Verification core for traffic-generator test runs.
//!
//! - [`wait`]: bounded retry of a probe until it reports ready
//! - [`predicates`]: pure readiness checks over a snapshot and expectation
//! - [`convergence`]: convergence time from in-flight frame counts
//! - [`run`]: the forward-only state machine that drives one test run
//! - [`report`]: plain-text tables for snapshots

pub mod convergence;
pub mod predicates;
pub mod report;
pub mod run;
pub mod wait;

pub use convergence::{ConvergenceError, ConvergenceMeasurement, MeasurementAnomaly};
pub use predicates::Readiness;
pub use run::{CompletionCheck, FaultPlan, Run, RunError, RunPlan, RunReport, RunState, WaitPlan};
pub use wait::{Observation, ProbeFailed, WaitOptions, WaitOutcome, wait_for, wait_until};
