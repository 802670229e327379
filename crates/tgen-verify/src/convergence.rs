//! Convergence time from in-flight frame counts.
//!
//! Frames sent but never delivered after a disruptive event, divided by
//! the configured transmit rate, give how long delivery was interrupted.
//! This assumes a constant rate up to the event and that frames in flight
//! at that moment are never delivered later.
//!
//! The measurement is taken once traffic has ceased, which only checks the
//! flow's transmit state. A receive counter that is still climbing, or a
//! stale one, is not detected and skews the result.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tgen_common::models::FlowMetric;

/// Carried on every measurement so reports show the limits of the number.
pub const APPROXIMATION_NOTE: &str = "traffic-ceased only checks transmit state; \
     a receive count still rising when sampled is not detected";

#[derive(Debug, Error, PartialEq)]
pub enum ConvergenceError {
    #[error("transmit rate must be a positive finite number, got {0}")]
    InvalidRate(f64),
    #[error("flow {0:?} not reported by the controller")]
    FlowMissing(String),
}

/// Suspicious but internally consistent result. Reported, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeasurementAnomaly {
    /// The controller reported more frames received than transmitted,
    /// which points at metrics being sampled out of order.
    ReceivedExceedsTransmitted { excess: u64 },
}

impl std::fmt::Display for MeasurementAnomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeasurementAnomaly::ReceivedExceedsTransmitted { excess } => {
                write!(f, "{excess} more frames received than transmitted")
            }
        }
    }
}

/// `(frames_tx - frames_rx) / rate`, unclamped.
///
/// Seconds when `rate` is in packets per second. Negative when more frames
/// were received than transmitted.
pub fn compute(frames_tx: u64, frames_rx: u64, rate: f64) -> Result<f64, ConvergenceError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(ConvergenceError::InvalidRate(rate));
    }
    let in_flight = i128::from(frames_tx) - i128::from(frames_rx);
    Ok(in_flight as f64 / rate)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceMeasurement {
    pub flow_name: String,
    pub frames_tx: u64,
    pub frames_rx: u64,
    pub rate_pps: f64,
    pub seconds: f64,
    pub note: &'static str,
}

impl ConvergenceMeasurement {
    pub fn from_flow(flow: &FlowMetric, rate: f64) -> Result<Self, ConvergenceError> {
        let seconds = compute(flow.frames_tx, flow.frames_rx, rate)?;
        let m = Self {
            flow_name: flow.name.clone(),
            frames_tx: flow.frames_tx,
            frames_rx: flow.frames_rx,
            rate_pps: rate,
            seconds,
            note: APPROXIMATION_NOTE,
        };
        if let Some(anomaly) = m.anomaly() {
            tracing::warn!(
                flow = %m.flow_name,
                seconds,
                %anomaly,
                "convergence measurement anomaly"
            );
        }
        Ok(m)
    }

    /// The value as a duration, or `None` when it is negative.
    pub fn duration(&self) -> Option<Duration> {
        (self.seconds >= 0.0).then(|| Duration::from_secs_f64(self.seconds))
    }

    pub fn anomaly(&self) -> Option<MeasurementAnomaly> {
        (self.frames_rx > self.frames_tx).then(|| MeasurementAnomaly::ReceivedExceedsTransmitted {
            excess: self.frames_rx - self.frames_tx,
        })
    }
}

impl std::fmt::Display for ConvergenceMeasurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "convergence time for {}: {:.3}s ({} tx, {} rx at {} pps)",
            self.flow_name, self.seconds, self.frames_tx, self.frames_rx, self.rate_pps
        )
    }
}
