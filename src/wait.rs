//! Condition polling with a bounded deadline
//!
//! Every wait in the harness goes through [`Condition`]: a probe is observed
//! repeatedly until it is accepted or the deadline passes. Observations are
//! exposed as a lazy stream that restarts from scratch each time it is built.

use crate::config::{HarnessConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS};
use crate::Result;
use futures::stream::{self, Stream, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Options for bounded waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl From<&HarnessConfig> for WaitOptions {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            timeout_ms: config.default_timeout_ms,
            poll_interval_ms: config.poll_interval_ms,
        }
    }
}

impl WaitOptions {
    #[must_use]
    pub const fn new(timeout_ms: u64, poll_interval_ms: u64) -> Self {
        Self {
            timeout_ms,
            poll_interval_ms,
        }
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Zero is treated as 1ms so a misconfigured interval cannot spin
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Result of a bounded wait
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<T> {
    /// An observation was accepted
    Satisfied(T),
    /// The deadline passed; carries the last observation, if any
    TimedOut(Option<T>),
}

impl<T> WaitOutcome<T> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, WaitOutcome::Satisfied(_))
    }
}

/// Polling state threaded through the observation stream
struct PollState {
    deadline: Option<Instant>,
    finished: bool,
}

/// A probe observed at a fixed interval until a deadline
pub struct Condition<F> {
    probe: F,
}

impl<F, Fut, T> Condition<F>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    pub fn new(probe: F) -> Self {
        Self { probe }
    }

    /// Lazy stream of observations
    ///
    /// Nothing runs until the stream is polled. The deadline starts at the first
    /// observation, there is always at least one observation, and the stream
    /// ends after the first observation made at or past the deadline. A probe
    /// error is yielded once and ends the stream.
    pub fn observations(&self, options: WaitOptions) -> impl Stream<Item = Result<T>> + '_ {
        let initial = PollState {
            deadline: None,
            finished: false,
        };

        stream::unfold(initial, move |mut state| async move {
            if state.finished {
                return None;
            }

            let deadline = match state.deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        state.finished = true;
                    } else {
                        let remaining = deadline - now;
                        tokio::time::sleep(options.poll_interval().min(remaining)).await;
                    }
                    deadline
                }
                None => Instant::now() + options.timeout(),
            };
            state.deadline = Some(deadline);

            let observation = (self.probe)().await;
            if observation.is_err() || Instant::now() >= deadline {
                state.finished = true;
            }
            Some((observation, state))
        })
    }

    /// Observe until `accept` returns true or the deadline passes
    pub async fn wait<P>(&self, options: WaitOptions, accept: P) -> Result<WaitOutcome<T>>
    where
        P: Fn(&T) -> bool,
    {
        let observations = self.observations(options);
        futures::pin_mut!(observations);

        let mut last = None;
        while let Some(observation) = observations.next().await {
            let value = observation?;
            if accept(&value) {
                return Ok(WaitOutcome::Satisfied(value));
            }
            last = Some(value);
        }
        Ok(WaitOutcome::TimedOut(last))
    }
}

/// Poll `probe` until `accept` holds or `options.timeout()` elapses
pub async fn wait_until<F, Fut, T, P>(options: WaitOptions, probe: F, accept: P) -> Result<WaitOutcome<T>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&T) -> bool,
{
    Condition::new(probe).wait(options, accept).await
}
