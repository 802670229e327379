//! Bounded retry of a readiness probe.
//!
//! [`wait_for`] invokes a probe immediately, then once per interval, until
//! the probe reports ready or the timeout elapses. The outcome always
//! carries the last observation so a caller can tell "condition met" from
//! "gave up" and see what was last observed either way.
//!
//! A probe error is not "not ready yet": it aborts the wait at once and is
//! returned as [`ProbeFailed`].
//!
//! Probes for one wait run strictly one after another. The deadline is
//! checked between probes only, so a slow probe can push the observed
//! latency past the nominal timeout by up to one probe duration.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Shortest pause between probes; a zero interval is raised to this.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl WaitOptions {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            timeout,
        }
    }
}

/// What one probe saw.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<S> {
    pub ready: bool,
    pub snapshot: S,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<S> {
    Satisfied {
        elapsed: Duration,
        attempts: u32,
        snapshot: S,
    },
    TimedOut {
        elapsed: Duration,
        attempts: u32,
        snapshot: S,
    },
}

impl<S> WaitOutcome<S> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, WaitOutcome::Satisfied { .. })
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            WaitOutcome::Satisfied { elapsed, .. } | WaitOutcome::TimedOut { elapsed, .. } => {
                *elapsed
            }
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            WaitOutcome::Satisfied { attempts, .. } | WaitOutcome::TimedOut { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn snapshot(&self) -> &S {
        match self {
            WaitOutcome::Satisfied { snapshot, .. } | WaitOutcome::TimedOut { snapshot, .. } => {
                snapshot
            }
        }
    }

    pub fn into_snapshot(self) -> S {
        match self {
            WaitOutcome::Satisfied { snapshot, .. } | WaitOutcome::TimedOut { snapshot, .. } => {
                snapshot
            }
        }
    }
}

/// A probe returned an error; the wait was abandoned.
#[derive(Debug)]
pub struct ProbeFailed<S, E> {
    pub source: E,
    /// Observation from the last probe that did succeed, if any.
    pub last: Option<S>,
    pub elapsed: Duration,
    pub attempts: u32,
}

impl<S, E: std::fmt::Display> std::fmt::Display for ProbeFailed<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "probe failed on attempt {} after {:?}: {}",
            self.attempts, self.elapsed, self.source
        )
    }
}

impl<S, E> std::error::Error for ProbeFailed<S, E>
where
    S: std::fmt::Debug,
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Poll `probe` until it reports ready or `options.timeout` elapses.
///
/// Elapsed time is measured from the first probe invocation. After a
/// not-ready observation the engine sleeps for the interval, shortened so
/// that the last probe lands on the deadline rather than past it.
pub async fn wait_for<S, E, F, Fut>(
    condition: &str,
    options: WaitOptions,
    mut probe: F,
) -> Result<WaitOutcome<S>, ProbeFailed<S, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation<S>, E>>,
    E: std::fmt::Display,
{
    tracing::info!(
        condition,
        interval_ms = options.interval.as_millis() as u64,
        timeout_ms = options.timeout.as_millis() as u64,
        "waiting for condition"
    );

    let start = Instant::now();
    let mut attempts = 0u32;
    let mut last: Option<S> = None;

    loop {
        attempts += 1;
        let observation = match probe().await {
            Ok(o) => o,
            Err(source) => {
                let elapsed = start.elapsed();
                tracing::warn!(
                    condition,
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %source,
                    "probe failed, abandoning wait"
                );
                return Err(ProbeFailed {
                    source,
                    last,
                    elapsed,
                    attempts,
                });
            }
        };
        let elapsed = start.elapsed();

        if observation.ready {
            tracing::info!(
                condition,
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                "done waiting for condition"
            );
            return Ok(WaitOutcome::Satisfied {
                elapsed,
                attempts,
                snapshot: observation.snapshot,
            });
        }

        if elapsed >= options.timeout {
            tracing::warn!(
                condition,
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                "timed out waiting for condition"
            );
            return Ok(WaitOutcome::TimedOut {
                elapsed,
                attempts,
                snapshot: observation.snapshot,
            });
        }

        tracing::debug!(
            condition,
            attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "condition not yet satisfied"
        );
        last = Some(observation.snapshot);

        let remaining = options.timeout - elapsed;
        tokio::time::sleep(options.interval.max(MIN_INTERVAL).min(remaining)).await;
    }
}

/// [`wait_for`] for probes that only answer yes or no.
pub async fn wait_until<E, F, Fut>(
    condition: &str,
    options: WaitOptions,
    mut probe: F,
) -> Result<WaitOutcome<()>, ProbeFailed<(), E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::fmt::Display,
{
    wait_for(condition, options, || {
        let fut = probe();
        async move {
            fut.await.map(|ready| Observation {
                ready,
                snapshot: (),
            })
        }
    })
    .await
}
